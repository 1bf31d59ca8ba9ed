use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Map, Value, json};

use crate::config::NimbaConfig;
use crate::error::UpstreamError;
use crate::notifications::channel::{NotificationProvider, ProviderFactory, ProviderResponse};
use crate::relay::request::ProviderCredentials;

pub const SMS_CHANNEL: &str = "sms";

/// Endpoint layout shared by every Nimba client in the process.
#[derive(Debug, Clone)]
pub struct NimbaEndpoint {
    pub base_url: String,
    pub send_path: String,
    pub senders_path: String,
    pub callback_url: Option<String>,
    pub timeout: Duration,
}

impl NimbaEndpoint {
    pub fn from_config(config: &NimbaConfig, timeout: Duration) -> Option<Self> {
        let base_url = config.base_url.as_deref()?.trim();
        if base_url.is_empty() {
            return None;
        }
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            send_path: config.send_path().to_string(),
            senders_path: config.senders_path().to_string(),
            callback_url: config.callback_url.clone(),
            timeout,
        })
    }

    fn send_url(&self) -> String {
        format!("{}{}", self.base_url, self.send_path)
    }

    fn senders_url(&self) -> String {
        format!("{}{}", self.base_url, self.senders_path)
    }
}

/// Nimba SMS client bound to one credential pair. Immutable after construction.
pub struct NimbaClient {
    endpoint: NimbaEndpoint,
    credentials: ProviderCredentials,
    client: Client,
}

impl std::fmt::Debug for NimbaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NimbaClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl NimbaClient {
    pub fn new(
        endpoint: NimbaEndpoint,
        credentials: ProviderCredentials,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|err| UpstreamError::Setup(err.to_string()))?;
        Ok(Self {
            endpoint,
            credentials,
            client,
        })
    }

    fn send_body(&self, addressees: &[String], message: &str, sender_id: Option<&str>) -> Value {
        let mut body = Map::new();
        body.insert("to".to_string(), json!(addressees));
        body.insert("message".to_string(), json!(message));
        if let Some(sender) = sender_id.filter(|sender| !sender.is_empty()) {
            body.insert("sender_name".to_string(), json!(sender));
        }
        body.insert("channel".to_string(), json!(SMS_CHANNEL));
        if let Some(callback) = self.endpoint.callback_url.as_deref() {
            body.insert("callback_url".to_string(), json!(callback));
        }
        Value::Object(body)
    }
}

#[async_trait]
impl NotificationProvider for NimbaClient {
    fn provider_id(&self) -> &str {
        "nimba"
    }

    async fn send(
        &self,
        addressees: &[String],
        message: &str,
        sender_id: Option<&str>,
    ) -> Result<ProviderResponse, UpstreamError> {
        let body = self.send_body(addressees, message, sender_id);
        let response = self
            .client
            .post(self.endpoint.send_url())
            .basic_auth(
                &self.credentials.account_id,
                Some(&self.credentials.account_secret),
            )
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        read_payload(response).await
    }

    async fn list_senders(&self) -> Result<ProviderResponse, UpstreamError> {
        let response = self
            .client
            .get(self.endpoint.senders_url())
            .basic_auth(
                &self.credentials.account_id,
                Some(&self.credentials.account_secret),
            )
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        read_payload(response).await
    }
}

async fn read_payload(response: Response) -> Result<ProviderResponse, UpstreamError> {
    let status = response.status();
    let text = response.text().await.map_err(UpstreamError::from_reqwest)?;
    if !status.is_success() {
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text })))
}

/// Builds fresh Nimba clients for per-request credentials.
#[derive(Debug, Clone)]
pub struct NimbaFactory {
    endpoint: Option<NimbaEndpoint>,
}

impl NimbaFactory {
    pub fn new(endpoint: Option<NimbaEndpoint>) -> Self {
        Self { endpoint }
    }
}

impl ProviderFactory for NimbaFactory {
    fn build(
        &self,
        credentials: ProviderCredentials,
    ) -> Result<Arc<dyn NotificationProvider>, UpstreamError> {
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| UpstreamError::Setup("NIMBA_BASE_URL is not configured".to_string()))?;
        let client = NimbaClient::new(endpoint, credentials)?;
        Ok(Arc::new(client) as Arc<dyn NotificationProvider>)
    }
}
