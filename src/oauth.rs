//! Token exchange clients.
//!
//! [`OAuthExchangeClient`] is the boundary between the lifecycle manager and the authorization
//! server: the manager never touches the network directly, so tests can substitute any
//! implementation. [`BasicExchangeClient`] is the production implementation built on the
//! `oauth2` crate and a pluggable [`TokenTransport`].

pub use oauth2;

// std
use std::collections::BTreeMap;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse as _, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	auth::{TokenResponse, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ExchangeMetadata, ExchangeMetadataSlot, TokenTransport},
	provider::{
		ClientAuthMethod, ExchangeErrorContext, ExchangeErrorKind, GrantType, ProviderDescriptor,
		ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;

/// Boxed future returned by [`OAuthExchangeClient`] methods.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Exchange client specialized for the crate's default reqwest transport stack.
pub type ReqwestExchangeClient = BasicExchangeClient<ReqwestTransport, ReqwestTransportErrorMapper>;

/// Performs the two token endpoint calls the lifecycle manager depends on.
///
/// Implementations report a refused grant as [`Error::RefreshRejected`] or
/// [`Error::CodeRejected`]; every other error is treated as transient by the manager.
pub trait OAuthExchangeClient
where
	Self: Send + Sync,
{
	/// Exchanges an authorization code (`grant_type=authorization_code`) for tokens.
	fn exchange_authorization_code<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a, TokenResponse>;

	/// Exchanges a refresh token (`grant_type=refresh_token`) for tokens.
	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a, TokenResponse>;
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ExchangeMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_grant: GrantType,
		meta: Option<&ExchangeMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unrecognized transport failure"),
		}
	}
}

/// Client identity presented to the token endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientCredentials {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Redirect URI registered for the authorization-code flow.
	pub redirect_uri: Url,
}
impl ClientCredentials {
	/// Bundles the client identity used for every grant.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			redirect_uri,
		}
	}
}

/// [`OAuthExchangeClient`] backed by the `oauth2` crate.
///
/// Client credentials travel in the form body by default (`client_id`, `client_secret`),
/// matching [`ClientAuthMethod::ClientSecretPost`].
pub struct BasicExchangeClient<C, M>
where
	C: ?Sized + TokenTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	descriptor: ProviderDescriptor,
	oauth_client: ConfiguredBasicClient,
	transport: Arc<C>,
	error_mapper: Arc<M>,
	strategy: Arc<dyn ProviderStrategy>,
}
impl<C, M> BasicExchangeClient<C, M>
where
	C: ?Sized + TokenTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds a client for `descriptor` using the caller-provided transport + mapper pair.
	pub fn with_transport(
		descriptor: ProviderDescriptor,
		credentials: &ClientCredentials,
		strategy: Arc<dyn ProviderStrategy>,
		transport: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(descriptor.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_url = RedirectUrl::new(credentials.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let auth_type = match descriptor.client_auth_method {
			ClientAuthMethod::ClientSecretPost => AuthType::RequestBody,
			ClientAuthMethod::ClientSecretBasic => AuthType::BasicAuth,
		};
		let oauth_client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(auth_type);

		Ok(Self {
			descriptor,
			oauth_client,
			transport: transport.into(),
			error_mapper: error_mapper.into(),
			strategy,
		})
	}

	/// Returns the descriptor this client talks to.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	fn ensure_supported(&self, grant: GrantType) -> Result<()> {
		if self.descriptor.supports(grant) {
			Ok(())
		} else {
			Err(ConfigError::UnsupportedGrant {
				descriptor: self.descriptor.id.to_string(),
				grant: grant.as_str(),
			}
			.into())
		}
	}

	fn extra_params(&self, grant: GrantType) -> BTreeMap<String, String> {
		let mut form = BTreeMap::new();

		self.strategy.augment_token_request(grant, &mut form);

		form
	}
}
#[cfg(feature = "reqwest")]
impl BasicExchangeClient<ReqwestTransport, ReqwestTransportErrorMapper> {
	/// Builds a client with its own reqwest transport and the [`DefaultProviderStrategy`].
	///
	/// [`DefaultProviderStrategy`]: crate::provider::DefaultProviderStrategy
	pub fn new(descriptor: ProviderDescriptor, credentials: &ClientCredentials) -> Result<Self> {
		Self::with_transport(
			descriptor,
			credentials,
			Arc::new(crate::provider::DefaultProviderStrategy),
			ReqwestTransport::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> OAuthExchangeClient for BasicExchangeClient<C, M>
where
	C: ?Sized + TokenTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_authorization_code<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a, TokenResponse> {
		const GRANT: GrantType = GrantType::AuthorizationCode;

		let meta = ExchangeMetadataSlot::default();

		Box::pin(async move {
			self.ensure_supported(GRANT)?;

			let handle = self.transport.with_metadata(meta.clone());
			let mut request =
				self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

			for (key, value) in self.extra_params(GRANT) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(
					self.strategy.as_ref(),
					GRANT,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(response)
		})
	}

	fn exchange_refresh_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
	) -> ExchangeFuture<'a, TokenResponse> {
		const GRANT: GrantType = GrantType::RefreshToken;

		let meta = ExchangeMetadataSlot::default();

		Box::pin(async move {
			self.ensure_supported(GRANT)?;

			let handle = self.transport.with_metadata(meta.clone());
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&secret);

			for (key, value) in self.extra_params(GRANT) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(
					self.strategy.as_ref(),
					GRANT,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			map_token_response(response)
		})
	}
}
impl<C, M> Debug for BasicExchangeClient<C, M>
where
	C: ?Sized + TokenTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicExchangeClient").field("descriptor", &self.descriptor).finish()
	}
}

fn map_token_response(response: FacadeTokenResponse) -> Result<TokenResponse> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();

	Ok(TokenResponse {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned())),
		expires_in: i64::try_from(expires_in).unwrap_or(i64::MAX),
		token_type: response.token_type().as_ref().to_owned(),
	})
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ExchangeMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(grant, meta_ref, error),
		RequestTokenError::Parse(source, body) => {
			let preview = String::from_utf8_lossy(&body).into_owned();

			map_unstructured_error(strategy, grant, meta_ref, preview).unwrap_or_else(|| {
				TransientError::TokenResponseParse { source, status: meta_status(meta_ref) }.into()
			})
		},
		RequestTokenError::Other(message) =>
			map_unstructured_error(strategy, grant, meta_ref, message.clone()).unwrap_or_else(
				|| {
					TransientError::TokenEndpoint {
						message,
						status: meta_status(meta_ref),
						retry_after: meta_retry_after(meta_ref),
					}
					.into()
				},
			),
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ExchangeMetadata>,
) -> Error {
	let mut ctx =
		ExchangeErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let reason = match response.error_description() {
		Some(description) => format!("{} ({description})", response.error().as_ref()),
		None => response.error().as_ref().to_string(),
	};

	classified_error(strategy.classify_exchange_error(&ctx), grant, reason, meta)
}

/// Classifies non-JSON or unexpected error bodies; successful statuses stay unclassified so
/// the caller reports them as malformed responses.
fn map_unstructured_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<&ExchangeMetadata>,
	body: String,
) -> Option<Error> {
	let status = meta_status(meta).filter(|status| !(200..300).contains(status))?;
	let ctx = ExchangeErrorContext::new(grant).with_http_status(status).with_body_preview(body);
	let reason = format!("HTTP {status}");

	Some(classified_error(strategy.classify_exchange_error(&ctx), grant, reason, meta))
}

fn classified_error(
	kind: ExchangeErrorKind,
	grant: GrantType,
	reason: String,
	meta: Option<&ExchangeMetadata>,
) -> Error {
	match (kind, grant) {
		(ExchangeErrorKind::Rejected, GrantType::RefreshToken) => Error::RefreshRejected { reason },
		(ExchangeErrorKind::Rejected, GrantType::AuthorizationCode) =>
			Error::CodeRejected { reason },
		(ExchangeErrorKind::Transient, _) => TransientError::TokenEndpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ExchangeMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(meta: Option<&ExchangeMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ExchangeMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ExchangeMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{auth::ProviderId, provider::DefaultProviderStrategy};

	fn descriptor(grants: &[GrantType]) -> ProviderDescriptor {
		ProviderDescriptor::builder(
			ProviderId::new("test-provider").expect("Failed to construct provider identifier."),
		)
		.token_endpoint(
			Url::parse("https://example.com/oauth/v1/token")
				.expect("Failed to parse token endpoint URL."),
		)
		.support_grants(grants.iter().copied())
		.build()
		.expect("Failed to build provider descriptor.")
	}

	fn credentials() -> ClientCredentials {
		ClientCredentials::new(
			"client-id",
			"client-secret",
			Url::parse("https://app.example.com/oauth/callback")
				.expect("Failed to parse redirect URI."),
		)
	}

	#[test]
	fn builds_for_both_auth_methods() {
		let mut descriptor = descriptor(&[GrantType::RefreshToken]);

		ReqwestExchangeClient::new(descriptor.clone(), &credentials())
			.expect("Client secret post configuration should build.");

		descriptor.client_auth_method = ClientAuthMethod::ClientSecretBasic;

		ReqwestExchangeClient::new(descriptor, &credentials())
			.expect("Client secret basic configuration should build.");
	}

	#[tokio::test]
	async fn unsupported_grant_is_a_config_error() {
		let client = ReqwestExchangeClient::new(descriptor(&[GrantType::RefreshToken]), &credentials())
			.expect("Client should build.");
		let err = client
			.exchange_authorization_code("code")
			.await
			.expect_err("Authorization code grant is disabled for this descriptor.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::UnsupportedGrant { grant: "authorization_code", .. })
		));
	}

	#[test]
	fn unstructured_errors_use_status_classes() {
		let strategy = DefaultProviderStrategy;
		let meta = ExchangeMetadata { status: Some(401), retry_after: None };
		let err = map_unstructured_error(
			&strategy,
			GrantType::RefreshToken,
			Some(&meta),
			"<html>Unauthorized</html>".into(),
		)
		.expect("Client error statuses should be classified.");

		assert!(matches!(err, Error::RefreshRejected { .. }));

		let meta = ExchangeMetadata { status: Some(502), retry_after: Some(Duration::seconds(3)) };
		let err = map_unstructured_error(&strategy, GrantType::RefreshToken, Some(&meta), "".into())
			.expect("Server error statuses should be classified.");

		assert!(matches!(
			err,
			Error::Transient(TransientError::TokenEndpoint { status: Some(502), .. })
		));

		let meta = ExchangeMetadata { status: Some(200), retry_after: None };

		assert!(
			map_unstructured_error(&strategy, GrantType::RefreshToken, Some(&meta), "{".into())
				.is_none()
		);
	}
}
