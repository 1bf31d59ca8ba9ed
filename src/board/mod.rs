pub mod client;
pub mod monday;
