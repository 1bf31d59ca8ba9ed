use std::sync::Arc;

use anyhow::{Context, Result};

use crate::board::client::BoardWriter;
use crate::board::monday::MondayClient;
use crate::config::{Config, ServerConfig};
use crate::notifications::channel::NotificationProvider;
use crate::notifications::nimba::{NimbaClient, NimbaEndpoint, NimbaFactory};
use crate::relay::request::ProviderCredentials;
use crate::relay::service::{RelayService, RelaySettings};

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    pub server_config: ServerConfig,
}

impl AppState {
    pub fn new(relay: RelayService, server_config: ServerConfig) -> Self {
        Self {
            relay: Arc::new(relay),
            server_config,
        }
    }

    /// Builds the shared clients once; they are never replaced afterwards.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.request_timeout();
        let nimba = config.nimba();
        let monday = config.monday();

        let default_credentials =
            ProviderCredentials::from_parts(nimba.sid.clone(), nimba.secret.clone());
        let endpoint = NimbaEndpoint::from_config(&nimba, timeout);

        let default_client: Option<Arc<dyn NotificationProvider>> =
            match (endpoint.clone(), default_credentials.clone()) {
                (Some(endpoint), Some(credentials)) => {
                    let client = NimbaClient::new(endpoint, credentials)
                        .context("failed to build default Nimba client")?;
                    Some(Arc::new(client) as Arc<dyn NotificationProvider>)
                }
                _ => None,
            };
        if endpoint.is_none() {
            tracing::warn!("NIMBA_BASE_URL not set, sends will fail");
        }

        let board: Option<Arc<dyn BoardWriter>> = MondayClient::from_config(&monday, timeout)
            .context("failed to build monday client")?
            .map(|client| Arc::new(client) as Arc<dyn BoardWriter>);
        if board.is_none() {
            tracing::info!("MONDAY_API_TOKEN not set, board write-back disabled");
        }

        let settings = RelaySettings {
            default_credentials,
            default_sender_id: nimba.sender_id.clone(),
            signing_secret: monday.signing_secret.clone(),
        };
        let relay = RelayService::new(
            settings,
            default_client,
            Arc::new(NimbaFactory::new(endpoint)),
            board,
        );
        Ok(Self::new(relay, config.server()))
    }
}
