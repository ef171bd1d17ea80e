// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ClientAuthMethod, GrantType, ProviderDescriptor, SupportedGrants},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Token endpoint is mandatory for all flows.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// At least one grant must be supported.
	#[error("Descriptor must enable at least one grant type.")]
	NoSupportedGrants,
	/// Endpoints must use HTTPS unless they point at the local machine.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Option<Url>,
	/// Grants enabled for the provider.
	pub supported_grants: SupportedGrants,
	/// Preferred client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			token_endpoint: None,
			supported_grants: SupportedGrants::default(),
			client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Marks a single grant type as supported.
	pub fn support_grant(mut self, grant: GrantType) -> Self {
		self.supported_grants = self.supported_grants.enable(grant);

		self
	}

	/// Marks multiple grants as supported.
	pub fn support_grants<I>(mut self, grants: I) -> Self
	where
		I: IntoIterator<Item = GrantType>,
	{
		for grant in grants {
			self.supported_grants = self.supported_grants.enable(grant);
		}

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let token_endpoint =
			self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			token_endpoint,
			supported_grants: self.supported_grants,
			client_auth_method: self.client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.supported_grants.is_empty() {
			return Err(ProviderDescriptorError::NoSupportedGrants);
		}

		validate_endpoint("token", &self.token_endpoint)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptor::builder(
			ProviderId::new("hubspot").expect("Provider fixture should be valid."),
		)
	}

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Fixture URL should parse.")
	}

	#[test]
	fn rejects_missing_endpoint_and_grants() {
		let err = builder()
			.support_grant(GrantType::RefreshToken)
			.build()
			.expect_err("Descriptor without a token endpoint must be rejected.");

		assert_eq!(err, ProviderDescriptorError::MissingTokenEndpoint);

		let err = builder()
			.token_endpoint(url("https://api.hubapi.com/oauth/v1/token"))
			.build()
			.expect_err("Descriptor without grants must be rejected.");

		assert_eq!(err, ProviderDescriptorError::NoSupportedGrants);
	}

	#[test]
	fn rejects_remote_plain_http_but_allows_loopback() {
		let err = builder()
			.token_endpoint(url("http://api.hubapi.com/oauth/v1/token"))
			.support_grant(GrantType::RefreshToken)
			.build()
			.expect_err("Remote plain HTTP token endpoints must be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));

		for local in ["http://127.0.0.1:8080/token", "http://localhost/token", "http://[::1]/token"] {
			builder()
				.token_endpoint(url(local))
				.support_grant(GrantType::RefreshToken)
				.build()
				.expect("Loopback HTTP endpoints should be accepted for local testing.");
		}
	}

	#[test]
	fn support_helpers_cover_flags() {
		let descriptor = builder()
			.token_endpoint(url("https://api.hubapi.com/oauth/v1/token"))
			.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
			.client_auth_method(ClientAuthMethod::ClientSecretBasic)
			.build()
			.expect("Descriptor should build for a secure endpoint.");

		assert!(descriptor.supports(GrantType::AuthorizationCode));
		assert!(descriptor.supports(GrantType::RefreshToken));
		assert_eq!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert_eq!(descriptor.token_endpoint.as_str(), "https://api.hubapi.com/oauth/v1/token");
	}
}
