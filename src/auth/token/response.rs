//! Token endpoint response payload accepted by the lifecycle manager.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Result of an authorization-code or refresh-token exchange.
///
/// Mirrors the JSON body returned by the token endpoint
/// (`access_token`, `refresh_token`, `expires_in`, `token_type`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token; `None` keeps the previously cached one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime in seconds relative to the moment the response is accepted.
	pub expires_in: i64,
	/// Token type reported by the server (usually `bearer`).
	#[serde(default = "default_token_type")]
	pub token_type: String,
}
impl TokenResponse {
	/// Creates a bearer response without a refresh token.
	pub fn new(access_token: impl Into<String>, expires_in: i64) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			expires_in,
			token_type: default_token_type(),
		}
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Overrides the token type.
	pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = token_type.into();

		self
	}
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("token_type", &self.token_type)
			.finish()
	}
}

fn default_token_type() -> String {
	"bearer".into()
}
