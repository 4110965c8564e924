//! Payload signing for outbound webhooks.
//!
//! `X-Webhook-Signature` carries `hex(HMAC-SHA256(secret, body))` over the
//! exact bytes posted.

use anyhow::Result;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";

pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook secret: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Receiver-side check. Compares in constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = sign_payload(secret, body) else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    if expected.len() != provided.len() {
        return false;
    }
    expected.ct_eq(provided.as_slice()).into()
}

/// Fresh subscription secret: 32 random bytes, hex encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("whsec_{}", hex::encode(bytes))
}
