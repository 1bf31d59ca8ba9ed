use axum::Json;
use axum::body::Bytes;
use axum::extract::{MatchedPath, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::RelayError;
use crate::relay::request::NotificationOutcome;

use super::state::AppState;

pub const SIGNATURE_HEADER: &str = "monday-signature";

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn monday_webhook(
    State(state): State<AppState>,
    path: MatchedPath,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotificationOutcome>, RelayError> {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("webhook", %request_id, route = path.as_str());

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state
        .relay
        .handle_event(&body, signature)
        .instrument(span)
        .await?;
    Ok(Json(outcome))
}

pub async fn delivery_report(body: Bytes) -> Json<Value> {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    tracing::info!(event = "delivery_report", payload = %payload, "delivery report received");
    Json(json!({ "status": "received", "payload": payload }))
}

pub async fn list_senders(State(state): State<AppState>, body: Bytes) -> Response {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(_) => return RelayError::BadRequest("invalid JSON".to_string()).into_response(),
        }
    };
    match state.relay.list_senders(&body).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => err.into_response(),
    }
}
