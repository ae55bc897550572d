//! Webhook payload signature verification
//!
//! Deliveries carry an `X-Hub-Signature` header of the form
//! `sha1=<hex digest>`, where the digest is an HMAC-SHA1 of the raw body keyed
//! with the shared webhook secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::utils::hex;

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Digest algorithm name used as the signature prefix
pub const SIGNATURE_ALGORITHM: &str = "sha1";

type HmacSha1 = Hmac<Sha1>;

/// The supplied signature does not match the payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Signature validation failed. Expected: {expected}, actual: {actual}")]
pub struct SignatureMismatch {
    pub expected: String,
    pub actual: String,
}

/// Compute the signature string expected for `payload`
pub fn sign(payload: &[u8], secret: &SecretString) -> String {
    let mut mac = match HmacSha1::new_from_slice(secret.expose_secret().as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC keys have no length restriction"),
    };
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    format!("{}={}", SIGNATURE_ALGORITHM, hex::encode(digest))
}

/// Verify that `signature` is the signature of `payload` under `secret`
pub fn verify_signature(
    payload: &[u8],
    signature: &str,
    secret: &SecretString,
) -> Result<(), SignatureMismatch> {
    let expected = sign(payload, secret);
    if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureMismatch {
            expected,
            actual: signature.to_string(),
        })
    }
}
