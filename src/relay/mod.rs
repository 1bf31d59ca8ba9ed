pub mod extract;
pub mod request;
pub mod service;
pub mod signature;
