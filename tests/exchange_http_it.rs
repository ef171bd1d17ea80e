#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use oauth2_lifecycle::{
	auth::{ProviderId, TokenResponse, TokenSecret},
	clock::ManualClock,
	error::{ConfigError, Error, TransientError},
	manager::TokenLifecycleManager,
	oauth::{ClientCredentials, OAuthExchangeClient, ReqwestExchangeClient},
	provider::{GrantType, ProviderDescriptor},
};

const CLIENT_ID: &str = "client-lifecycle";
const CLIENT_SECRET: &str = "secret-lifecycle";
const REDIRECT_URI: &str = "https://app.example.com/oauth/callback";

fn token_endpoint(server: &MockServer) -> Url {
	Url::parse(&format!("http://{}/oauth/v1/token", server.address()))
		.expect("Mock token endpoint should parse.")
}

fn build_client(server: &MockServer) -> ReqwestExchangeClient {
	let descriptor = ProviderDescriptor::builder(
		ProviderId::new("mock-hubspot").expect("Provider identifier should be valid."),
	)
	.token_endpoint(token_endpoint(server))
	.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
	.build()
	.expect("Descriptor should build for a loopback endpoint.");
	let credentials = ClientCredentials::new(
		CLIENT_ID,
		CLIENT_SECRET,
		Url::parse(REDIRECT_URI).expect("Redirect URI should parse."),
	);

	ReqwestExchangeClient::new(descriptor, &credentials).expect("Exchange client should build.")
}

#[tokio::test]
async fn code_exchange_posts_the_documented_form() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v1/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "code-123")
				.form_urlencoded_tuple("redirect_uri", REDIRECT_URI)
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\",\"token_type\":\"bearer\",\"expires_in\":1800}",
				);
		})
		.await;
	let response = client
		.exchange_authorization_code("code-123")
		.await
		.expect("Code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "access-1");
	assert_eq!(response.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
	assert_eq!(response.expires_in, 1_800);
	assert_eq!(response.token_type, "bearer");
}

#[tokio::test]
async fn refresh_posts_the_documented_form() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v1/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-2\",\"token_type\":\"bearer\",\"expires_in\":1800}");
		})
		.await;
	let response = client
		.exchange_refresh_token(&TokenSecret::new("refresh-1"))
		.await
		.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(response.access_token.expose(), "access-2");
	assert!(response.refresh_token.is_none());
}

#[tokio::test]
async fn invalid_grant_is_a_rejection() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v1/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"refresh token expired\"}");
		})
		.await;
	let err = client
		.exchange_refresh_token(&TokenSecret::new("refresh-1"))
		.await
		.expect_err("Invalid grant should surface as an error.");

	mock.assert_async().await;

	match err {
		Error::RefreshRejected { reason } => assert!(reason.contains("invalid_grant")),
		other => panic!("Unexpected error: {other:?}."),
	}

	let err = client
		.exchange_authorization_code("stale-code")
		.await
		.expect_err("Invalid grant should reject the code as well.");

	assert!(matches!(err, Error::CodeRejected { .. }));
}

#[tokio::test]
async fn server_errors_are_transient() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v1/token");
			then.status(503).header("retry-after", "7").body("upstream unavailable");
		})
		.await;
	let err = client
		.exchange_refresh_token(&TokenSecret::new("refresh-1"))
		.await
		.expect_err("Service unavailable should surface as an error.");

	mock.assert_async().await;

	match err {
		Error::Transient(TransientError::TokenEndpoint { status, retry_after, .. }) => {
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(7)));
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn unauthorized_without_body_is_a_rejection() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v1/token");
			then.status(401);
		})
		.await;
	let err = client
		.exchange_refresh_token(&TokenSecret::new("refresh-1"))
		.await
		.expect_err("Unauthorized should surface as an error.");

	assert!(matches!(err, Error::RefreshRejected { .. }));
}

#[tokio::test]
async fn missing_expires_in_is_a_malformed_response() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/v1/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-2\",\"token_type\":\"bearer\"}");
		})
		.await;
	let err = client
		.exchange_refresh_token(&TokenSecret::new("refresh-1"))
		.await
		.expect_err("Responses without expires_in cannot derive an expiry.");

	assert!(matches!(err, Error::Config(ConfigError::MissingExpiresIn)));
	assert!(err.is_retryable());
}

#[tokio::test]
async fn manager_rotates_and_invalidates_through_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::from_millis(1_700_000_000_000);
	let manager = TokenLifecycleManager::new(Arc::new(build_client(&server)))
		.with_clock(Arc::new(clock.clone()));
	let mut code_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v1/token")
				.form_urlencoded_tuple("grant_type", "authorization_code");
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-1\",\"refresh_token\":\"refresh-1\",\"token_type\":\"bearer\",\"expires_in\":600}",
				);
		})
		.await;

	manager.exchange_code("code-1").await.expect("Code exchange should succeed.");
	code_mock.assert_async().await;
	code_mock.delete_async().await;

	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v1/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-1");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;

	clock.advance(Duration::minutes(5));

	assert!(manager.get_access_token().await.is_none());
	refresh_mock.assert_async().await;
	assert!(manager.snapshot().await.is_empty());
}

#[tokio::test]
async fn server_errors_keep_the_cached_credential_whatever_the_body_says() {
	let cases = [
		(503, "application/json", "{\"error\":\"invalid_grant\"}"),
		(500, "application/json", "{\"error\":\"invalid_request\"}"),
		(502, "text/html", "<html><body>upstream said invalid_client</body></html>"),
	];

	for (status, content_type, body) in cases {
		let server = MockServer::start_async().await;
		let clock = ManualClock::from_millis(1_700_000_000_000);
		let manager = TokenLifecycleManager::new(Arc::new(build_client(&server)))
			.with_clock(Arc::new(clock.clone()));
		let refresh_mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/oauth/v1/token")
					.form_urlencoded_tuple("grant_type", "refresh_token")
					.form_urlencoded_tuple("refresh_token", "refresh-1");
				then.status(status).header("content-type", content_type).body(body);
			})
			.await;

		manager
			.store_tokens(TokenResponse::new("access-1", 60).with_refresh_token("refresh-1"))
			.await;
		clock.advance(Duration::minutes(2));

		let err = manager.access_token().await.expect_err("Server errors should surface.");

		refresh_mock.assert_async().await;

		assert!(
			matches!(err, Error::Transient(TransientError::TokenEndpoint { status: Some(s), .. }) if s == status),
			"{status}: {err:?}"
		);
		assert!(err.is_retryable());

		let state = manager.snapshot().await;

		assert_eq!(state.access_token().map(TokenSecret::expose), Some("access-1"), "{status}");
		assert_eq!(state.refresh_token().map(TokenSecret::expose), Some("refresh-1"), "{status}");
	}
}
