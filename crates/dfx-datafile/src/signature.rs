//! Webhook payload signatures.
//!
//! The sender signs the raw request body with HMAC-SHA1 under the shared
//! secret and sends `sha1=<lowercase hex>` in the signature header.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// `"sha1=" + hex(hmac_sha1(secret, body))`.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> String {
    // HMAC hashes keys longer than the block size and pads shorter ones, so
    // `InvalidLength` is never returned for Hmac<Sha1>.
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Compare the provided header value against the computed signature.
///
/// The comparison runs in constant time over the bytes; only the final
/// accept/reject is observable.
pub fn verify_signature(secret: &[u8], body: &[u8], provided: &str) -> bool {
    let expected = compute_signature(secret, body);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
