use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub addressees: Vec<String>,
    pub message: String,
    pub sender_id: Option<String>,
    pub credentials: Option<ProviderCredentials>,
    pub board_id: Option<i64>,
    pub item_id: Option<i64>,
    pub status_column_id: Option<String>,
    pub status_label: Option<String>,
    pub update_body: Option<String>,
    pub dry_run: bool,
}

impl NotificationRequest {
    pub fn write_back_intent(&self) -> Option<WriteBackIntent> {
        Some(WriteBackIntent {
            item_id: self.item_id?,
            board_id: self.board_id,
            status_column_id: self.status_column_id.clone(),
            status_label: self.status_label.clone(),
            update_body: self.update_body.clone(),
        })
    }
}

/// Account id and secret for the SMS provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub account_id: String,
    pub account_secret: String,
}

impl ProviderCredentials {
    pub fn new(account_id: impl Into<String>, account_secret: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            account_secret: account_secret.into(),
        }
    }

    /// Builds a pair only when both halves are present.
    pub fn from_parts(account_id: Option<String>, account_secret: Option<String>) -> Option<Self> {
        match (account_id, account_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(Self::new(id, secret))
            }
            _ => None,
        }
    }

    /// Request override wins when complete, otherwise the process default.
    pub fn resolve(requested: Option<&Self>, default: Option<&Self>) -> Option<Self> {
        requested.or(default).cloned()
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderCredentials(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteBackIntent {
    pub item_id: i64,
    pub board_id: Option<i64>,
    pub status_column_id: Option<String>,
    pub status_label: Option<String>,
    pub update_body: Option<String>,
}

impl WriteBackIntent {
    /// Board, column and label, when all three are known.
    pub fn column_change(&self) -> Option<(i64, &str, &str)> {
        let board_id = self.board_id?;
        let column_id = self.status_column_id.as_deref()?;
        let label = self.status_label.as_deref()?;
        Some((board_id, column_id, label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
    DryRun,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::DryRun => "dry_run",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Sent,
    Error,
    DryRun,
}

/// Response envelope returned to the webhook caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nimba_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationOutcome {
    pub fn sent(response: Value) -> Self {
        Self {
            status: OutcomeStatus::Sent,
            nimba_response: Some(response),
            error: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            nimba_response: None,
            error: Some(detail.into()),
        }
    }

    pub fn dry_run() -> Self {
        Self {
            status: OutcomeStatus::DryRun,
            nimba_response: Some(serde_json::json!({ "dry_run": true })),
            error: None,
        }
    }
}
