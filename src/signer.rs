// ===============================
// src/signer.rs
// ===============================
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::ConfigError;
use crate::payload::Payload;

type HmacSha256 = Hmac<Sha256>;

pub fn timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// HMAC-SHA256 signer keyed once at startup with the CoinDCX secret.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

/// The exact bytes that were signed (and must be sent) plus the hex MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub message: String,
    pub signature: String,
}

impl Signer {
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::Missing("SECRET_KEY"));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| ConfigError::Hmac)?;
        Ok(Self { mac })
    }

    pub fn sign(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Serialize once, sign those bytes, hand both back.
    pub fn sign_payload(&self, payload: &Payload) -> SignedPayload {
        let message = payload.canonical();
        let signature = self.sign(&message);
        SignedPayload { message, signature }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signer { .. }")
    }
}
