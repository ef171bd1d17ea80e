//! Crate-level error taxonomy shared by the lifecycle manager and exchange clients.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// [`Error::RefreshRejected`] is the only variant that invalidates cached credentials; every
/// other refresh failure leaves the cached state untouched so a later call can retry.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem or unusable token endpoint response.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry later.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No access token can be produced; a fresh authorization-code flow is required.
	#[error("Authentication required: no usable credential is cached.")]
	NoCredential,
	/// Authorization server rejected the refresh token or client credentials.
	#[error("Authorization server rejected the refresh grant: {reason}.")]
	RefreshRejected {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// Authorization server rejected the authorization code or client credentials.
	#[error("Authorization server rejected the authorization code grant: {reason}.")]
	CodeRejected {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when the failure is final and the caller must re-authenticate.
	pub fn requires_reauthentication(&self) -> bool {
		matches!(self, Self::NoCredential | Self::RefreshRejected { .. } | Self::CodeRejected { .. })
	}

	/// Returns `true` when a later attempt may succeed without operator involvement.
	///
	/// Rejections and local misconfiguration are never retryable; a malformed token endpoint
	/// response is.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Config(err) => err.is_retryable(),
			Self::Transient(_) | Self::Transport(_) => true,
			Self::NoCredential | Self::RefreshRejected { .. } | Self::CodeRejected { .. } => false,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Descriptor does not enable the requested grant.
	#[error("Descriptor `{descriptor}` does not enable the {grant} grant.")]
	UnsupportedGrant {
		/// Provider identifier string.
		descriptor: String,
		/// Disabled grant label.
		grant: &'static str,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Access token cannot be encoded as an HTTP header value.
	#[error("Access token contains characters that are not valid in an Authorization header.")]
	InvalidBearerToken,
}
impl ConfigError {
	/// Returns `true` only for upstream response problems that a later exchange may not repeat.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::MissingExpiresIn)
	}

	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Exchange did not complete within the configured timeout.
	#[error("Token exchange timed out after {timeout}.")]
	Timeout {
		/// Timeout that elapsed.
		timeout: Duration,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
