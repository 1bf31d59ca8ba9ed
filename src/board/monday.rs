use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::board::client::{BoardWriter, WriteResult};
use crate::config::MondayConfig;
use crate::error::UpstreamError;

const CREATE_UPDATE: &str = r#"
mutation ($itemId: ID!, $body: String!) {
    create_update(item_id: $itemId, body: $body) { id }
}
"#;

const CHANGE_COLUMN_VALUE: &str = r#"
mutation ($boardId: ID!, $itemId: ID!, $columnId: String!, $value: JSON!) {
    change_column_value(board_id: $boardId, item_id: $itemId, column_id: $columnId, value: $value) { id }
}
"#;

/// monday.com GraphQL client authenticated with an API token.
pub struct MondayClient {
    api_url: String,
    api_token: String,
    client: Client,
}

impl std::fmt::Debug for MondayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MondayClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl MondayClient {
    pub fn new(
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| UpstreamError::Setup(err.to_string()))?;
        Ok(Self {
            api_url: api_url.into(),
            api_token: api_token.into(),
            client,
        })
    }

    /// `None` when no API token is configured.
    pub fn from_config(
        config: &MondayConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, UpstreamError> {
        let Some(token) = config.api_token.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        Self::new(config.api_url(), token, timeout).map(Some)
    }

    async fn post(&self, query: &str, variables: Value) -> WriteResult {
        let response = self
            .client
            .post(&self.api_url)
            .header(reqwest::header::AUTHORIZATION, &self.api_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(UpstreamError::from_reqwest)?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let payload: Value = serde_json::from_str(&text)
            .map_err(|err| UpstreamError::InvalidResponse(err.to_string()))?;
        graphql_data(payload)
    }
}

fn graphql_data(mut payload: Value) -> WriteResult {
    if let Some(errors) = payload.get("errors")
        && has_entries(errors)
    {
        return Err(UpstreamError::Reported(errors.clone()));
    }
    match payload.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => Ok(json!({})),
        Some(data) => Ok(data),
    }
}

fn has_entries(errors: &Value) -> bool {
    match errors {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

#[async_trait]
impl BoardWriter for MondayClient {
    async fn post_update(&self, item_id: i64, body: &str) -> WriteResult {
        self.post(CREATE_UPDATE, json!({ "itemId": item_id, "body": body }))
            .await
    }

    async fn set_column_value(
        &self,
        board_id: i64,
        item_id: i64,
        column_id: &str,
        value: Value,
    ) -> WriteResult {
        // the API wants the column value as a JSON-encoded string
        let encoded = value.to_string();
        self.post(
            CHANGE_COLUMN_VALUE,
            json!({
                "boardId": board_id,
                "itemId": item_id,
                "columnId": column_id,
                "value": encoded,
            }),
        )
        .await
    }
}
