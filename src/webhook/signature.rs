//! HMAC-SHA256 signature primitives for webhook deliveries.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
// self
use crate::_prelude::*;

type HmacSha256 = Hmac<Sha256>;

/// Failures raised while computing a signature.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SignatureError {
	/// Signing secret is empty.
	#[error("Webhook signing secret is empty.")]
	EmptySecret,
	/// Signing secret was refused by the HMAC implementation.
	#[error("Webhook signing secret cannot key HMAC-SHA256.")]
	InvalidKey,
}

/// Computes the Base64 (standard, padded) HMAC-SHA256 of
/// `method + uri + body + decimal(timestamp)` keyed by `secret`.
///
/// The parts are fed to the MAC in order with no separators. `uri` must be the full URI
/// including the query string exactly as received.
pub fn compute_signature(
	secret: &[u8],
	method: &str,
	uri: &str,
	body: &[u8],
	timestamp: i64,
) -> Result<String, SignatureError> {
	if secret.is_empty() {
		return Err(SignatureError::EmptySecret);
	}

	let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;

	mac.update(method.as_bytes());
	mac.update(uri.as_bytes());
	mac.update(body);
	mac.update(timestamp.to_string().as_bytes());

	Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Compares two encoded signatures in constant time.
///
/// Inputs of different lengths compare unequal.
pub fn signatures_match(expected: &str, claimed: &str) -> bool {
	expected.as_bytes().ct_eq(claimed.as_bytes()).into()
}
