use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::UpstreamError;
use crate::relay::request::ProviderCredentials;

/// Raw JSON returned by the SMS provider.
pub type ProviderResponse = Value;

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    fn provider_id(&self) -> &str;
    async fn send(
        &self,
        addressees: &[String],
        message: &str,
        sender_id: Option<&str>,
    ) -> Result<ProviderResponse, UpstreamError>;
    async fn list_senders(&self) -> Result<ProviderResponse, UpstreamError>;
}

/// Builds request-scoped provider clients for overridden credentials.
pub trait ProviderFactory: Send + Sync {
    fn build(
        &self,
        credentials: ProviderCredentials,
    ) -> Result<Arc<dyn NotificationProvider>, UpstreamError>;
}
