use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use smsbridge::board::client::{BoardWriter, WriteResult};
use smsbridge::config::ServerConfig;
use smsbridge::error::UpstreamError;
use smsbridge::notifications::channel::{NotificationProvider, ProviderFactory, ProviderResponse};
use smsbridge::relay::request::ProviderCredentials;
use smsbridge::relay::service::{RelayService, RelaySettings};
use smsbridge::relay::signature::sign;
use smsbridge::server::app::build_router;
use smsbridge::server::state::AppState;

#[derive(Debug, Clone, PartialEq)]
struct SentMessage {
    addressees: Vec<String>,
    message: String,
    sender_id: Option<String>,
}

#[derive(Default)]
struct RecordingProvider {
    sent: Mutex<Vec<SentMessage>>,
    listings: AtomicUsize,
    fail_with: Option<String>,
}

impl RecordingProvider {
    fn failing(detail: &str) -> Self {
        Self {
            fail_with: Some(detail.to_string()),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationProvider for RecordingProvider {
    fn provider_id(&self) -> &str {
        "recording"
    }

    async fn send(
        &self,
        addressees: &[String],
        message: &str,
        sender_id: Option<&str>,
    ) -> Result<ProviderResponse, UpstreamError> {
        self.sent.lock().unwrap().push(SentMessage {
            addressees: addressees.to_vec(),
            message: message.to_string(),
            sender_id: sender_id.map(str::to_string),
        });
        if let Some(detail) = &self.fail_with {
            return Err(UpstreamError::Transport(detail.clone()));
        }
        Ok(json!({"messageid": "abc123", "status": "queued"}))
    }

    async fn list_senders(&self) -> Result<ProviderResponse, UpstreamError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = &self.fail_with {
            return Err(UpstreamError::Transport(detail.clone()));
        }
        Ok(json!({"count": 2, "results": [{"name": "SHOP"}, {"name": "ALERTS"}]}))
    }
}

#[derive(Default)]
struct RecordingFactory {
    built: Mutex<Vec<ProviderCredentials>>,
    clients: Mutex<Vec<Arc<RecordingProvider>>>,
}

impl ProviderFactory for RecordingFactory {
    fn build(
        &self,
        credentials: ProviderCredentials,
    ) -> Result<Arc<dyn NotificationProvider>, UpstreamError> {
        self.built.lock().unwrap().push(credentials);
        let client = Arc::new(RecordingProvider::default());
        self.clients.lock().unwrap().push(client.clone());
        Ok(client as Arc<dyn NotificationProvider>)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum BoardCall {
    Update { item_id: i64, body: String },
    Column {
        board_id: i64,
        item_id: i64,
        column_id: String,
        value: Value,
    },
}

#[derive(Default)]
struct RecordingBoard {
    calls: Mutex<Vec<BoardCall>>,
}

impl RecordingBoard {
    fn calls(&self) -> Vec<BoardCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BoardWriter for RecordingBoard {
    async fn post_update(&self, item_id: i64, body: &str) -> WriteResult {
        self.calls.lock().unwrap().push(BoardCall::Update {
            item_id,
            body: body.to_string(),
        });
        Ok(json!({"create_update": {"id": "1"}}))
    }

    async fn set_column_value(
        &self,
        board_id: i64,
        item_id: i64,
        column_id: &str,
        value: Value,
    ) -> WriteResult {
        self.calls.lock().unwrap().push(BoardCall::Column {
            board_id,
            item_id,
            column_id: column_id.to_string(),
            value,
        });
        Ok(json!({"change_column_value": {"id": "1"}}))
    }
}

struct Harness {
    provider: Arc<RecordingProvider>,
    factory: Arc<RecordingFactory>,
    board: Arc<RecordingBoard>,
    app: Router,
}

struct HarnessOptions {
    provider: RecordingProvider,
    default_credentials: Option<ProviderCredentials>,
    signing_secret: Option<String>,
    sender_id: Option<String>,
    with_board: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            provider: RecordingProvider::default(),
            default_credentials: Some(ProviderCredentials::new("default-sid", "default-secret")),
            signing_secret: None,
            sender_id: None,
            with_board: true,
        }
    }
}

fn harness(options: HarnessOptions) -> Harness {
    let provider = Arc::new(options.provider);
    let factory = Arc::new(RecordingFactory::default());
    let board = Arc::new(RecordingBoard::default());
    let default_client = options
        .default_credentials
        .as_ref()
        .map(|_| provider.clone() as Arc<dyn NotificationProvider>);
    let relay = RelayService::new(
        RelaySettings {
            default_credentials: options.default_credentials,
            default_sender_id: options.sender_id,
            signing_secret: options.signing_secret,
        },
        default_client,
        factory.clone(),
        options
            .with_board
            .then(|| board.clone() as Arc<dyn BoardWriter>),
    );
    let app = build_router(AppState::new(relay, ServerConfig::default()));
    Harness {
        provider,
        factory,
        board,
        app,
    }
}

fn post_json(uri: &str, body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("monday-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness(HarnessOptions::default());
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn sends_and_posts_update_for_item() {
    let h = harness(HarnessOptions::default());
    let payload = json!({
        "phone_number": "+224600000000",
        "message": "hello",
        "item_id": 42,
        "update_body": "sent hello"
    });
    let (status, body) = call(
        &h.app,
        post_json("/monday/automation", &payload.to_string(), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert_eq!(body["nimba_response"]["messageid"], "abc123");
    assert!(body.get("error").is_none());
    assert_eq!(
        h.provider.sent(),
        vec![SentMessage {
            addressees: vec!["+224600000000".to_string()],
            message: "hello".to_string(),
            sender_id: None,
        }]
    );
    assert_eq!(
        h.board.calls(),
        vec![BoardCall::Update {
            item_id: 42,
            body: "sent hello".to_string()
        }]
    );
    assert!(h.factory.built.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_failure_is_reported_in_success_envelope() {
    let h = harness(HarnessOptions {
        provider: RecordingProvider::failing("connection refused"),
        ..HarnessOptions::default()
    });
    let payload = json!({
        "phone_number": "+224600000000",
        "message": "hello",
        "item_id": 42,
        "update_body": "sent hello"
    });
    let (status, body) = call(
        &h.app,
        post_json("/monday/action", &payload.to_string(), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );
    assert!(body.get("nimba_response").is_none());
    assert_eq!(
        h.board.calls(),
        vec![BoardCall::Update {
            item_id: 42,
            body: "sent hello".to_string()
        }]
    );
}

#[tokio::test]
async fn missing_number_and_message_is_bad_request() {
    let h = harness(HarnessOptions::default());
    for payload in [
        json!({}),
        json!({"payload": {"item_id": 1}}),
        json!({"phone_number": "", "phone": null, "to": [], "message": "x"}),
        json!({"to": "+1", "message": "", "body": null, "text": ""}),
    ] {
        let (status, body) =
            call(&h.app, post_json("/monday/action", &payload.to_string(), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body["error"], "missing number or message");
    }
    assert!(h.provider.sent().is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let h = harness(HarnessOptions::default());
    let (status, body) = call(&h.app, post_json("/monday/action", "{not json", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid JSON");
}

#[tokio::test]
async fn bad_signature_is_rejected_before_any_upstream_call() {
    let h = harness(HarnessOptions {
        signing_secret: Some("shared-secret".to_string()),
        ..HarnessOptions::default()
    });
    let payload = json!({
        "phone_number": "+224600000000",
        "message": "hello",
        "item_id": 42,
        "update_body": "sent hello"
    })
    .to_string();
    let wrong = sign(payload.as_bytes(), "other-secret").unwrap();

    for signature in [None, Some("deadbeef"), Some(wrong.as_str())] {
        let (status, _) = call(&h.app, post_json("/monday/automation", &payload, signature)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    assert!(h.provider.sent().is_empty());
    assert!(h.board.calls().is_empty());
    assert!(h.factory.built.lock().unwrap().is_empty());
}

#[tokio::test]
async fn valid_signature_is_accepted() {
    let h = harness(HarnessOptions {
        signing_secret: Some("shared-secret".to_string()),
        ..HarnessOptions::default()
    });
    let payload = json!({"payload": {"phone": "+224600000000", "text": "hi"}}).to_string();
    let signature = sign(payload.as_bytes(), "shared-secret").unwrap();
    let (status, body) = call(
        &h.app,
        post_json("/monday/automation", &payload, Some(&signature)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert_eq!(h.provider.sent().len(), 1);
}

#[tokio::test]
async fn dry_run_skips_provider_but_writes_back() {
    let h = harness(HarnessOptions::default());
    let payload = json!({
        "payload": {
            "phone_number": "+224600000000",
            "message": "hello",
            "dry_run": true,
            "status_column_id": "status",
            "status_label": "SMS envoyé",
            "update_body": "dry run ok"
        },
        "event": {"boardId": 7, "pulseId": "42"}
    });
    let (status, body) = call(
        &h.app,
        post_json("/monday/automation", &payload.to_string(), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "dry_run", "nimba_response": {"dry_run": true}}));
    assert!(h.provider.sent().is_empty());
    assert!(h.factory.built.lock().unwrap().is_empty());

    let calls = h.board.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&BoardCall::Update {
        item_id: 42,
        body: "dry run ok".to_string()
    }));
    assert!(calls.contains(&BoardCall::Column {
        board_id: 7,
        item_id: 42,
        column_id: "status".to_string(),
        value: json!({"label": "SMS envoyé"}),
    }));
}

#[tokio::test]
async fn dry_run_does_not_need_credentials() {
    let h = harness(HarnessOptions {
        default_credentials: None,
        ..HarnessOptions::default()
    });
    let payload = json!({"phone": "+1", "message": "m", "dry_run": 1});
    let (status, body) = call(&h.app, post_json("/monday/action", &payload.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "dry_run");
}

#[tokio::test]
async fn missing_credentials_is_bad_request() {
    let h = harness(HarnessOptions {
        default_credentials: None,
        ..HarnessOptions::default()
    });
    let payload = json!({"phone_number": "+1", "message": "m", "nimba_sid": "only-half"});
    let (status, body) = call(&h.app, post_json("/monday/action", &payload.to_string(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing provider credentials");
    assert!(h.factory.built.lock().unwrap().is_empty());
}

#[tokio::test]
async fn override_credentials_use_request_scoped_client() {
    let h = harness(HarnessOptions::default());
    let payload = json!({
        "phone_number": ["+1", "+2"],
        "message": "m",
        "nimba_sid": "tenant-sid",
        "nimba_secret": "tenant-secret"
    })
    .to_string();

    for _ in 0..2 {
        let (status, body) = call(&h.app, post_json("/monday/action", &payload, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "sent");
    }

    assert!(h.provider.sent().is_empty());
    let built = h.factory.built.lock().unwrap().clone();
    assert_eq!(
        built,
        vec![
            ProviderCredentials::new("tenant-sid", "tenant-secret"),
            ProviderCredentials::new("tenant-sid", "tenant-secret"),
        ]
    );
    let clients = h.factory.clients.lock().unwrap();
    assert_eq!(clients.len(), 2);
    for client in clients.iter() {
        assert_eq!(client.sent()[0].addressees, vec!["+1", "+2"]);
    }
}

#[tokio::test]
async fn override_matching_defaults_reuses_cached_client() {
    let h = harness(HarnessOptions::default());
    let payload = json!({
        "phone": "+1",
        "message": "m",
        "sid": "default-sid",
        "secret": "default-secret"
    });
    let (status, _) = call(&h.app, post_json("/monday/action", &payload.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.provider.sent().len(), 1);
    assert!(h.factory.built.lock().unwrap().is_empty());
}

#[tokio::test]
async fn default_sender_is_applied() {
    let h = harness(HarnessOptions {
        sender_id: Some("NIMBA".to_string()),
        ..HarnessOptions::default()
    });
    let payload = json!({"phone": "+1", "message": "m"});
    call(&h.app, post_json("/monday/action", &payload.to_string(), None)).await;
    assert_eq!(h.provider.sent()[0].sender_id.as_deref(), Some("NIMBA"));
}

#[tokio::test]
async fn no_board_client_makes_write_back_silent() {
    let h = harness(HarnessOptions {
        with_board: false,
        ..HarnessOptions::default()
    });
    let payload = json!({
        "phone": "+1",
        "message": "m",
        "item_id": 42,
        "board_id": 7,
        "status_column_id": "status",
        "status_label": "Sent",
        "update_body": "note"
    });
    let (status, body) = call(&h.app, post_json("/monday/action", &payload.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert!(h.board.calls().is_empty());
}

#[tokio::test]
async fn sender_listing_is_normalized_and_stable() {
    let h = harness(HarnessOptions::default());
    let first = call(&h.app, post_json("/nimba/senders", "{}", None)).await;
    let second = call(&h.app, post_json("/sendernames", "{}", None)).await;

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(first.1["status"], "ok");
    assert_eq!(first.1["senders"], json!(["SHOP", "ALERTS"]));
    assert_eq!(first.1["raw"]["count"], 2);
    assert_eq!(first, second);
    assert_eq!(h.provider.listings.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sender_listing_accepts_empty_body_and_overrides() {
    let h = harness(HarnessOptions::default());
    let (status, body) = call(&h.app, post_json("/sendernames", "", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let overrides = json!({"nimba_sid": "tenant-sid", "nimba_secret": "tenant-secret"});
    let (status, _) = call(&h.app, post_json("/sendernames", &overrides.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        *h.factory.built.lock().unwrap(),
        vec![ProviderCredentials::new("tenant-sid", "tenant-secret")]
    );
}

#[tokio::test]
async fn sender_listing_failure_is_error_status() {
    let h = harness(HarnessOptions {
        provider: RecordingProvider::failing("upstream returned 401: unauthorized"),
        ..HarnessOptions::default()
    });
    let (status, body) = call(&h.app, post_json("/nimba/senders", "{}", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("401"));
    assert!(body.get("senders").is_none());
}

#[tokio::test]
async fn sender_listing_without_credentials_is_bad_request() {
    let h = harness(HarnessOptions {
        default_credentials: None,
        ..HarnessOptions::default()
    });
    let (status, body) = call(&h.app, post_json("/nimba/senders", "{}", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing provider credentials");
}

#[tokio::test]
async fn delivery_report_is_echoed() {
    let h = harness(HarnessOptions::default());
    let report = json!({"messageid": "abc123", "status": "delivered"});
    let (status, body) = call(&h.app, post_json("/nimba/dlr", &report.to_string(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "received", "payload": report}));
}
