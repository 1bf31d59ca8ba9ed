pub mod channel;
pub mod nimba;
pub mod senders;
