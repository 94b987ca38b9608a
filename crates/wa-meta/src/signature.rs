//! `X-Hub-Signature-256` verification

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header Meta signs webhook bodies with
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verify `sha256=<hex>` against HMAC-SHA256(app_secret, body)
pub fn verify_signature(app_secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
}
