use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::board::client::{BoardWriter, WriteResult};
use crate::error::{RelayError, RelayResult, UpstreamError};
use crate::notifications::channel::{NotificationProvider, ProviderFactory};
use crate::notifications::senders::normalize_senders;
use crate::relay::extract::{CandidateFields, extract, text_field};
use crate::relay::request::{
    DeliveryStatus, NotificationOutcome, NotificationRequest, ProviderCredentials,
    WriteBackIntent,
};
use crate::relay::signature::{self, SignatureCheck};

const MISSING_CREDENTIALS: &str = "missing provider credentials";

/// Process-wide settings the relay consults on every event.
#[derive(Clone, Default)]
pub struct RelaySettings {
    pub default_credentials: Option<ProviderCredentials>,
    pub default_sender_id: Option<String>,
    pub signing_secret: Option<String>,
}

impl std::fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySettings")
            .field("default_credentials", &self.default_credentials)
            .field("default_sender_id", &self.default_sender_id)
            .field("signing_configured", &self.signing_secret.is_some())
            .finish()
    }
}

/// Turns board automation events into SMS sends and reports back to the board.
///
/// Everything held here is built once at startup and only read afterwards,
/// so one instance is shared across all request handlers.
pub struct RelayService {
    settings: RelaySettings,
    default_client: Option<Arc<dyn NotificationProvider>>,
    factory: Arc<dyn ProviderFactory>,
    board: Option<Arc<dyn BoardWriter>>,
}

/// Result of each board write attempted for one event. `None` means skipped.
#[derive(Debug, Default)]
pub struct WriteBackReport {
    pub update: Option<WriteResult>,
    pub column: Option<WriteResult>,
}

impl WriteBackReport {
    pub fn is_noop(&self) -> bool {
        self.update.is_none() && self.column.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendersOutcome {
    Ok { senders: Vec<String>, raw: Value },
    Error { error: String },
}

impl RelayService {
    pub fn new(
        settings: RelaySettings,
        default_client: Option<Arc<dyn NotificationProvider>>,
        factory: Arc<dyn ProviderFactory>,
        board: Option<Arc<dyn BoardWriter>>,
    ) -> Self {
        Self {
            settings,
            default_client,
            factory,
            board,
        }
    }

    /// Full webhook pipeline: verify, parse, validate, send, write back.
    pub async fn handle_event(
        &self,
        raw_body: &[u8],
        provided_signature: Option<&str>,
    ) -> RelayResult<NotificationOutcome> {
        let check = signature::verify(
            raw_body,
            provided_signature,
            self.settings.signing_secret.as_deref(),
        );
        if check.is_rejected() {
            tracing::warn!(event = "webhook_rejected", reason = "signature", "invalid signature");
            return Err(RelayError::Auth);
        }
        if check == SignatureCheck::NotConfigured {
            tracing::debug!("signature verification not configured");
        }

        let body: Value = serde_json::from_slice(raw_body).map_err(|err| {
            tracing::warn!(event = "webhook_rejected", reason = "json", error = %err, "invalid JSON body");
            RelayError::BadRequest("invalid JSON".to_string())
        })?;

        let request = self.prepare(extract(&body))?;
        self.dispatch(request).await
    }

    fn prepare(&self, candidates: CandidateFields) -> RelayResult<NotificationRequest> {
        let mut request = candidates.into_request().inspect_err(|err| {
            tracing::warn!(event = "webhook_rejected", reason = %err, "invalid notification request");
        })?;
        if request.sender_id.is_none() {
            request.sender_id = self.settings.default_sender_id.clone();
        }
        Ok(request)
    }

    pub async fn dispatch(&self, request: NotificationRequest) -> RelayResult<NotificationOutcome> {
        if request.dry_run {
            tracing::info!(
                event = "dry_run",
                addressees = request.addressees.len(),
                item_id = ?request.item_id,
                "dry run, provider not contacted"
            );
            self.finish_write_back(&request, DeliveryStatus::DryRun).await;
            return Ok(NotificationOutcome::dry_run());
        }

        let credentials = ProviderCredentials::resolve(
            request.credentials.as_ref(),
            self.settings.default_credentials.as_ref(),
        )
        .ok_or_else(|| {
            tracing::warn!(event = "webhook_rejected", reason = MISSING_CREDENTIALS, "no provider credentials");
            RelayError::BadRequest(MISSING_CREDENTIALS.to_string())
        })?;

        let (provider, sent) = match self.select_client(&credentials) {
            Ok(client) => {
                let sent = client
                    .send(
                        &request.addressees,
                        &request.message,
                        request.sender_id.as_deref(),
                    )
                    .await;
                (client.provider_id().to_string(), sent)
            }
            Err(err) => (String::from("unavailable"), Err(err)),
        };

        match sent {
            Ok(response) => {
                tracing::info!(
                    event = "notification_sent",
                    %provider,
                    addressees = request.addressees.len(),
                    item_id = ?request.item_id,
                    "notification sent"
                );
                self.finish_write_back(&request, DeliveryStatus::Sent).await;
                Ok(NotificationOutcome::sent(response))
            }
            Err(err) => {
                tracing::warn!(
                    event = "notification_failed",
                    %provider,
                    error = %err,
                    item_id = ?request.item_id,
                    "notification delivery failed"
                );
                self.finish_write_back(&request, DeliveryStatus::Failed).await;
                Ok(NotificationOutcome::failed(err.to_string()))
            }
        }
    }

    /// Reuses the startup client for the default pair, otherwise builds a
    /// throwaway client bound to the override.
    pub fn select_client(
        &self,
        credentials: &ProviderCredentials,
    ) -> Result<Arc<dyn NotificationProvider>, UpstreamError> {
        let is_default = self.settings.default_credentials.as_ref() == Some(credentials);
        if is_default && let Some(client) = self.default_client.as_ref() {
            return Ok(Arc::clone(client));
        }
        self.factory.build(credentials.clone())
    }

    /// Failures are logged and dropped here; the caller never sees them.
    async fn finish_write_back(&self, request: &NotificationRequest, status: DeliveryStatus) {
        let report = self.write_back(request, status).await;
        for (kind, result) in [("update", &report.update), ("column", &report.column)] {
            if let Some(Err(err)) = result {
                tracing::warn!(
                    event = "write_back_failed",
                    kind,
                    status = status.as_str(),
                    item_id = ?request.item_id,
                    error = %err,
                    "board write-back failed"
                );
            }
        }
    }

    pub async fn write_back(
        &self,
        request: &NotificationRequest,
        status: DeliveryStatus,
    ) -> WriteBackReport {
        let Some(board) = self.board.as_ref() else {
            return WriteBackReport::default();
        };
        let Some(intent) = request.write_back_intent() else {
            return WriteBackReport::default();
        };
        write_back_intent(board.as_ref(), &intent, status).await
    }

    pub async fn list_senders(&self, body: &Value) -> RelayResult<SendersOutcome> {
        let requested = body.as_object().and_then(|object| {
            ProviderCredentials::from_parts(
                text_field(object, &["nimba_sid", "sid"]),
                text_field(object, &["nimba_secret", "secret"]),
            )
        });
        let credentials = ProviderCredentials::resolve(
            requested.as_ref(),
            self.settings.default_credentials.as_ref(),
        )
        .ok_or_else(|| RelayError::BadRequest(MISSING_CREDENTIALS.to_string()))?;

        let listed = match self.select_client(&credentials) {
            Ok(client) => client.list_senders().await,
            Err(err) => Err(err),
        };
        match listed {
            Ok(raw) => Ok(SendersOutcome::Ok {
                senders: normalize_senders(&raw),
                raw,
            }),
            Err(err) => {
                tracing::warn!(event = "senders_failed", error = %err, "sender listing failed");
                Ok(SendersOutcome::Error {
                    error: err.to_string(),
                })
            }
        }
    }
}

async fn write_back_intent(
    board: &dyn BoardWriter,
    intent: &WriteBackIntent,
    status: DeliveryStatus,
) -> WriteBackReport {
    let update = async {
        match intent.update_body.as_deref() {
            Some(body) => Some(board.post_update(intent.item_id, body).await),
            None => None,
        }
    };
    let column = async {
        match intent.column_change() {
            Some((board_id, column_id, label)) => {
                tracing::debug!(status = status.as_str(), label, "setting status column");
                let value = json!({ "label": label });
                Some(
                    board
                        .set_column_value(board_id, intent.item_id, column_id, value)
                        .await,
                )
            }
            None => None,
        }
    };
    let (update, column) = tokio::join!(update, column);
    WriteBackReport { update, column }
}
