use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No signing secret configured; the request is accepted unverified.
    NotConfigured,
    Valid,
    Invalid,
}

impl SignatureCheck {
    pub fn is_rejected(self) -> bool {
        self == SignatureCheck::Invalid
    }
}

/// Checks a hex HMAC-SHA256 of the raw body against the shared secret.
pub fn verify(
    raw_body: &[u8],
    provided_signature: Option<&str>,
    shared_secret: Option<&str>,
) -> SignatureCheck {
    let Some(secret) = shared_secret.filter(|secret| !secret.is_empty()) else {
        return SignatureCheck::NotConfigured;
    };
    let Some(provided) = provided_signature else {
        return SignatureCheck::Invalid;
    };
    let provided = provided.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let Ok(provided) = hex::decode(provided) else {
        return SignatureCheck::Invalid;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return SignatureCheck::Invalid;
    };
    mac.update(raw_body);
    // verify_slice compares in constant time
    match mac.verify_slice(&provided) {
        Ok(()) => SignatureCheck::Valid,
        Err(_) => SignatureCheck::Invalid,
    }
}

pub fn sign(raw_body: &[u8], shared_secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(shared_secret.as_bytes()).ok()?;
    mac.update(raw_body);
    Some(hex::encode(mac.finalize().into_bytes()))
}
