pub mod board;
pub mod config;
pub mod error;
pub mod logging;
pub mod notifications;
pub mod relay;
pub mod server;
