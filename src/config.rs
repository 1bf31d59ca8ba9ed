use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "smsbridge.toml";
pub const CONFIG_PATH_ENV: &str = "SMSBRIDGE_CONFIG";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub nimba: Option<NimbaConfig>,
    #[serde(default)]
    pub monday: Option<MondayConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub max_body_bytes: Option<usize>,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize, Default, Clone)]
pub struct NimbaConfig {
    pub base_url: Option<String>,
    pub sid: Option<String>,
    pub secret: Option<String>,
    pub sender_id: Option<String>,
    pub send_path: Option<String>,
    pub senders_path: Option<String>,
    pub callback_url: Option<String>,
}

impl std::fmt::Debug for NimbaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NimbaConfig")
            .field("base_url", &self.base_url)
            .field("sid", &self.sid.as_ref().map(|_| "<redacted>"))
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("sender_id", &self.sender_id)
            .field("send_path", &self.send_path)
            .field("senders_path", &self.senders_path)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

#[derive(Deserialize, Default, Clone)]
pub struct MondayConfig {
    pub api_token: Option<String>,
    pub signing_secret: Option<String>,
    pub api_url: Option<String>,
}

impl std::fmt::Debug for MondayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MondayConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl Config {
    /// Reads the optional TOML file, then layers the process environment on top.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("failed to parse TOML")
    }

    pub fn apply_env_with<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let nimba = self.nimba.get_or_insert_with(NimbaConfig::default);
        override_with(&mut nimba.base_url, lookup("NIMBA_BASE_URL"));
        override_with(&mut nimba.sid, lookup("NIMBA_SID"));
        override_with(&mut nimba.secret, lookup("NIMBA_SECRET"));
        override_with(&mut nimba.sender_id, lookup("NIMBA_SENDER_ID"));
        override_with(&mut nimba.send_path, lookup("NIMBA_SEND_PATH"));
        override_with(&mut nimba.senders_path, lookup("NIMBA_SENDERS_PATH"));
        override_with(&mut nimba.callback_url, lookup("NIMBA_CALLBACK_URL"));

        let monday = self.monday.get_or_insert_with(MondayConfig::default);
        override_with(&mut monday.api_token, lookup("MONDAY_API_TOKEN"));
        override_with(&mut monday.signing_secret, lookup("MONDAY_SIGNING_SECRET"));
        override_with(&mut monday.api_url, lookup("MONDAY_API_URL"));

        let server = self.server.get_or_insert_with(ServerConfig::default);
        override_with(&mut server.bind, lookup("SMSBRIDGE_BIND"));

        let logging = self.logging.get_or_insert_with(LoggingConfig::default);
        override_with(&mut logging.level, lookup("SMSBRIDGE_LOG_LEVEL"));
        override_with(&mut logging.format, lookup("SMSBRIDGE_LOG_FORMAT"));

        if let Some(timeout) = lookup("REQUEST_TIMEOUT_SECONDS") {
            let secs = timeout
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid REQUEST_TIMEOUT_SECONDS: {timeout}"))?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(15))
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn nimba(&self) -> NimbaConfig {
        self.nimba.clone().unwrap_or_default()
    }

    pub fn monday(&self) -> MondayConfig {
        self.monday.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        self.bind
            .clone()
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes.unwrap_or(1024 * 1024)
    }
}

impl NimbaConfig {
    pub fn send_path(&self) -> &str {
        self.send_path.as_deref().unwrap_or("/v1/messages")
    }

    pub fn senders_path(&self) -> &str {
        self.senders_path.as_deref().unwrap_or("/v1/sendernames")
    }
}

impl MondayConfig {
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or("https://api.monday.com/v2")
    }
}

fn override_with(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *slot = Some(value);
    }
}
