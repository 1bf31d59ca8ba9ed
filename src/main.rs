use anyhow::Result;

use smsbridge::config::Config;
use smsbridge::logging::init_logging;
use smsbridge::server::app::serve;
use smsbridge::server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config.logging())?;
    tracing::debug!(?config, "configuration loaded");
    let state = AppState::from_config(&config)?;
    serve(state).await
}
