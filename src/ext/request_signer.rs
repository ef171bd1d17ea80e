//! Request signing contracts that attach a bearer token to arbitrary HTTP clients.

// crates.io
use oauth2::http::{
	HeaderValue, Request,
	header::{AUTHORIZATION, HeaderMap},
};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Describes how to attach an access token to an outbound request without constraining the
/// HTTP client type.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the request and returns it with authorization state derived from `token`.
	fn attach_token(&self, request: Request, token: &TokenSecret) -> Result<Request, Error>;
}

/// Signer producing `Authorization: Bearer <token>` headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl BearerSigner {
	/// Builds the sensitive header value for `token`.
	pub fn header_value(token: &TokenSecret) -> Result<HeaderValue> {
		if token.is_empty() {
			return Err(ConfigError::InvalidBearerToken.into());
		}

		let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
			.map_err(|_| ConfigError::InvalidBearerToken)?;

		value.set_sensitive(true);

		Ok(value)
	}

	/// Inserts the header into `headers`, replacing any previous authorization value.
	pub fn sign_headers(headers: &mut HeaderMap, token: &TokenSecret) -> Result<()> {
		headers.insert(AUTHORIZATION, Self::header_value(token)?);

		Ok(())
	}
}
impl<B> RequestSignerExt<Request<B>, Error> for BearerSigner {
	fn attach_token(&self, mut request: Request<B>, token: &TokenSecret) -> Result<Request<B>> {
		Self::sign_headers(request.headers_mut(), token)?;

		Ok(request)
	}
}
#[cfg(feature = "reqwest")]
impl RequestSignerExt<reqwest::RequestBuilder, Error> for BearerSigner {
	fn attach_token(
		&self,
		request: reqwest::RequestBuilder,
		token: &TokenSecret,
	) -> Result<reqwest::RequestBuilder> {
		Ok(request.header(AUTHORIZATION, Self::header_value(token)?))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn signs_http_requests() {
		let request = Request::get("https://api.hubapi.com/crm/v3/objects/contacts")
			.body(())
			.expect("Request fixture should build.");
		let signed = BearerSigner
			.attach_token(request, &TokenSecret::new("access-1"))
			.expect("Signing should succeed for a header-safe token.");
		let header = signed.headers().get(AUTHORIZATION).expect("Authorization header should be set.");

		assert_eq!(header, "Bearer access-1");
		assert!(header.is_sensitive());
	}

	#[test]
	fn rejects_tokens_that_cannot_be_headers() {
		for token in ["", "line\nbreak"] {
			let err = BearerSigner::header_value(&TokenSecret::new(token))
				.expect_err("Token must be rejected.");

			assert!(matches!(err, Error::Config(ConfigError::InvalidBearerToken)));
		}
	}
}
