//! Inbound webhook authentication.
//!
//! Deliveries carry `X-HubSpot-Signature-v3`, the Base64 HMAC-SHA256 of
//! `method + uri + body + timestamp`, and `X-HubSpot-Request-Timestamp`, the signing instant in
//! milliseconds since the Unix epoch. [`WebhookSignatureVerifier`] rejects stale timestamps
//! before doing any cryptographic work, then compares signatures in constant time. It holds no
//! mutable state and can be shared freely across request handlers.

pub mod event;
pub mod signature;

pub use event::*;
pub use signature::*;

// crates.io
use oauth2::http::HeaderMap;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	clock::{Clock, SystemClock},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Default signature header.
pub const SIGNATURE_HEADER: &str = "X-HubSpot-Signature-v3";
/// Default timestamp header.
pub const TIMESTAMP_HEADER: &str = "X-HubSpot-Request-Timestamp";

const BODY_PREVIEW_CHARS: usize = 200;

/// Reasons a delivery is refused.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum WebhookRejection {
	/// A required header is absent or not visible ASCII.
	#[error("Webhook header `{header}` is missing or unreadable.")]
	MissingHeader {
		/// Header name.
		header: String,
	},
	/// Timestamp header is not an integer.
	#[error("Webhook timestamp header is not an integer.")]
	InvalidTimestamp,
	/// Timestamp lies outside the freshness window.
	#[error("Webhook timestamp is stale by {age_ms} ms.")]
	StaleTimestamp {
		/// Age of the delivery when it was checked.
		age_ms: i64,
	},
	/// Computed and claimed signatures differ.
	#[error("Webhook signature does not match.")]
	SignatureMismatch,
	/// Signature could not be computed.
	#[error("Webhook signature could not be computed: {reason}.")]
	Internal {
		/// Failure description, never containing the secret.
		reason: String,
	},
}
impl WebhookRejection {
	/// HTTP status a webhook endpoint should answer with.
	///
	/// Malformed requests map to `400`; every authentication failure maps to `401`.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::MissingHeader { .. } | Self::InvalidTimestamp => 400,
			Self::StaleTimestamp { .. } | Self::SignatureMismatch | Self::Internal { .. } => 401,
		}
	}

	/// Returns a stable label suitable for log fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::MissingHeader { .. } => "missing_header",
			Self::InvalidTimestamp => "invalid_timestamp",
			Self::StaleTimestamp { .. } => "stale_timestamp",
			Self::SignatureMismatch => "signature_mismatch",
			Self::Internal { .. } => "internal_error",
		}
	}
}

/// Verification settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
	/// Maximum accepted age of a delivery.
	pub tolerance: Duration,
	/// Header carrying the signature.
	pub signature_header: String,
	/// Header carrying the millisecond timestamp.
	pub timestamp_header: String,
}
impl WebhookConfig {
	/// Default freshness window.
	pub const DEFAULT_TOLERANCE: Duration = Duration::minutes(5);

	/// Overrides the freshness window.
	pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
		self.tolerance = tolerance;

		self
	}
}
impl Default for WebhookConfig {
	fn default() -> Self {
		Self {
			tolerance: Self::DEFAULT_TOLERANCE,
			signature_header: SIGNATURE_HEADER.into(),
			timestamp_header: TIMESTAMP_HEADER.into(),
		}
	}
}

/// Borrowed view of one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WebhookRequest<'a> {
	/// HTTP method, e.g. `POST`.
	pub method: &'a str,
	/// Full request URI including scheme, host, path, and query, exactly as received.
	pub uri: &'a str,
	/// Raw body bytes before any parsing.
	pub body: &'a [u8],
	/// Claimed signing instant in milliseconds since the Unix epoch.
	pub timestamp: i64,
	/// Claimed Base64 signature.
	pub signature: &'a str,
}
impl<'a> WebhookRequest<'a> {
	/// Reads the signature and timestamp from `headers` using the names in `config`.
	pub fn from_headers(
		config: &WebhookConfig,
		method: &'a str,
		uri: &'a str,
		headers: &'a HeaderMap,
		body: &'a [u8],
	) -> Result<Self, WebhookRejection> {
		let signature = header_str(headers, &config.signature_header)?;
		let timestamp = header_str(headers, &config.timestamp_header)?
			.parse()
			.map_err(|_| WebhookRejection::InvalidTimestamp)?;

		Ok(Self { method, uri, body, timestamp, signature })
	}
}

/// Authenticates deliveries signed with the shared secret.
pub struct WebhookSignatureVerifier {
	secret: TokenSecret,
	config: WebhookConfig,
	clock: Arc<dyn Clock>,
}
impl WebhookSignatureVerifier {
	/// Creates a verifier with the default configuration and the system clock.
	pub fn new(secret: impl Into<TokenSecret>) -> Self {
		Self { secret: secret.into(), config: WebhookConfig::default(), clock: Arc::new(SystemClock) }
	}

	/// Replaces the configuration.
	pub fn with_config(mut self, config: WebhookConfig) -> Self {
		self.config = config;

		self
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the active configuration.
	pub fn config(&self) -> &WebhookConfig {
		&self.config
	}

	/// Accepts `request` only when it is fresh and its signature matches.
	///
	/// Timestamps in the future are accepted.
	pub fn verify(&self, request: &WebhookRequest<'_>) -> Result<(), WebhookRejection> {
		const KIND: FlowKind = FlowKind::WebhookVerification;

		let _guard = FlowSpan::new(KIND, "verify").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = self.check(request);

		if let Err(_rejection) = &result {
			#[cfg(feature = "tracing")]
			match _rejection {
				WebhookRejection::Internal { reason } => tracing::error!(
					reason = %reason,
					timestamp = request.timestamp,
					"Webhook signature could not be computed."
				),
				WebhookRejection::SignatureMismatch => tracing::warn!(
					method = request.method,
					uri = request.uri,
					timestamp = request.timestamp,
					body_preview = %body_preview(request.body),
					"Webhook signature mismatch."
				),
				other => tracing::warn!(reason = other.as_str(), "Webhook rejected: {other}"),
			}
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Extracts the signing headers and verifies the delivery in one step.
	pub fn verify_headers(
		&self,
		method: &str,
		uri: &str,
		headers: &HeaderMap,
		body: &[u8],
	) -> Result<(), WebhookRejection> {
		let request = WebhookRequest::from_headers(&self.config, method, uri, headers, body)
			.inspect_err(|_rejection| {
				#[cfg(feature = "tracing")]
				tracing::warn!(reason = _rejection.as_str(), "Webhook rejected: {_rejection}");
			})?;

		self.verify(&request)
	}

	fn check(&self, request: &WebhookRequest<'_>) -> Result<(), WebhookRejection> {
		let age_ms = self.clock.now_millis().saturating_sub(request.timestamp);

		if i128::from(age_ms) > self.config.tolerance.whole_milliseconds() {
			return Err(WebhookRejection::StaleTimestamp { age_ms });
		}

		let expected = compute_signature(
			self.secret.expose().as_bytes(),
			request.method,
			request.uri,
			request.body,
			request.timestamp,
		)
		.map_err(|err| WebhookRejection::Internal { reason: err.to_string() })?;

		if signatures_match(&expected, request.signature) {
			Ok(())
		} else {
			Err(WebhookRejection::SignatureMismatch)
		}
	}
}
impl Debug for WebhookSignatureVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("WebhookSignatureVerifier")
			.field("secret", &self.secret)
			.field("config", &self.config)
			.finish()
	}
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, WebhookRejection> {
	headers
		.get(name)
		.and_then(|value| value.to_str().ok())
		.ok_or_else(|| WebhookRejection::MissingHeader { header: name.to_owned() })
}

#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn body_preview(body: &[u8]) -> String {
	String::from_utf8_lossy(body).chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::HeaderValue;
	// self
	use super::*;
	use crate::clock::ManualClock;

	const NOW_MS: i64 = 1_760_000_000_000;

	fn verifier(clock: &ManualClock) -> WebhookSignatureVerifier {
		WebhookSignatureVerifier::new("s3cr3t").with_clock(Arc::new(clock.clone()))
	}

	#[test]
	fn status_codes_split_malformed_and_unauthenticated() {
		assert_eq!(WebhookRejection::InvalidTimestamp.status_code(), 400);
		assert_eq!(WebhookRejection::MissingHeader { header: "x".into() }.status_code(), 400);
		assert_eq!(WebhookRejection::StaleTimestamp { age_ms: 1 }.status_code(), 401);
		assert_eq!(WebhookRejection::SignatureMismatch.status_code(), 401);
		assert_eq!(WebhookRejection::Internal { reason: "x".into() }.status_code(), 401);
	}

	#[test]
	fn header_extraction_reports_missing_and_malformed_values() {
		let config = WebhookConfig::default();
		let mut headers = HeaderMap::new();
		let err = WebhookRequest::from_headers(&config, "POST", "https://host/", &headers, b"")
			.expect_err("Headers are missing.");

		assert_eq!(err, WebhookRejection::MissingHeader { header: SIGNATURE_HEADER.into() });

		headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("sig"));
		headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static("yesterday"));

		let err = WebhookRequest::from_headers(&config, "POST", "https://host/", &headers, b"")
			.expect_err("Timestamp is not numeric.");

		assert_eq!(err, WebhookRejection::InvalidTimestamp);

		headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static("1760000000000"));

		let request = WebhookRequest::from_headers(&config, "POST", "https://host/", &headers, b"")
			.expect("Headers should be extracted.");

		assert_eq!(request.timestamp, NOW_MS);
		assert_eq!(request.signature, "sig");
	}

	#[test]
	fn stale_check_runs_before_signature_work() {
		let clock = ManualClock::from_millis(NOW_MS);
		let verifier = WebhookSignatureVerifier::new("").with_clock(Arc::new(clock));
		let request = WebhookRequest {
			method: "POST",
			uri: "https://host/webhooks/contacts",
			body: b"{}",
			timestamp: NOW_MS - 300_001,
			signature: "",
		};

		assert_eq!(
			verifier.verify(&request),
			Err(WebhookRejection::StaleTimestamp { age_ms: 300_001 })
		);

		let fresh = WebhookRequest { timestamp: NOW_MS, ..request };

		assert!(matches!(verifier.verify(&fresh), Err(WebhookRejection::Internal { .. })));
	}

	#[test]
	fn future_timestamps_are_accepted() {
		let clock = ManualClock::from_millis(NOW_MS - 60_000);
		let body = br#"{"a":1}"#;
		let request = WebhookRequest {
			method: "POST",
			uri: "https://host/webhooks/contacts",
			body,
			timestamp: NOW_MS,
			signature: "E5j/89C5D3bFA4uO5cz6jPqpteWP28loJlFJKvl8crU=",
		};

		assert_eq!(verifier(&clock).verify(&request), Ok(()));
	}

	#[test]
	fn previews_are_capped() {
		assert_eq!(body_preview(&[b'x'; 500]).len(), BODY_PREVIEW_CHARS);
		assert_eq!(body_preview(b"short"), "short");
	}
}
