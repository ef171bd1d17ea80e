//! Walks through an integration's credential lifecycle against a mock token endpoint: code
//! exchange, bearer signing, proactive refresh, and verification of a signed webhook.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use oauth2_lifecycle::{
	auth::ProviderId,
	clock::{Clock, ManualClock},
	ext::BearerSigner,
	http::ReqwestTransport,
	manager::TokenLifecycleManager,
	oauth::{BasicExchangeClient, ClientCredentials, ReqwestTransportErrorMapper},
	provider::{DefaultProviderStrategy, GrantType, ProviderDescriptor},
	reqwest::{Client, redirect::Policy},
	webhook::{WebhookRequest, WebhookSignatureVerifier, compute_signature},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let code_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v1/token")
				.form_urlencoded_tuple("grant_type", "authorization_code");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access-1\",\"refresh_token\":\"demo-refresh\",\"token_type\":\"bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/v1/token")
				.form_urlencoded_tuple("grant_type", "refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access-2\",\"token_type\":\"bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let base = format!("http://{}", server.address());
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-hubspot")?)
		.token_endpoint(Url::parse(&format!("{base}/oauth/v1/token"))?)
		.support_grants([GrantType::AuthorizationCode, GrantType::RefreshToken])
		.build()?;
	let credentials = ClientCredentials::new(
		"demo-client",
		"demo-secret",
		Url::parse("https://app.example.com/oauth/callback")?,
	);
	let transport =
		ReqwestTransport::with_client(Client::builder().redirect(Policy::none()).build()?);
	let exchange =
		<BasicExchangeClient<ReqwestTransport, ReqwestTransportErrorMapper>>::with_transport(
			descriptor,
			&credentials,
			Arc::new(DefaultProviderStrategy),
			transport,
			ReqwestTransportErrorMapper,
		)?;
	let clock = ManualClock::new(time::OffsetDateTime::now_utc());
	let manager =
		TokenLifecycleManager::new(Arc::new(exchange)).with_clock(Arc::new(clock.clone()));

	manager.exchange_code("demo-code").await?;

	let outbound = manager
		.authorize(&BearerSigner, Client::new().post(format!("{base}/crm/v3/objects/contacts")))
		.await?
		.build()?;

	println!(
		"Outbound request carries: {:?}.",
		outbound.headers().get("authorization").map(|value| value.is_sensitive())
	);

	clock.advance(Duration::minutes(26));

	let refreshed = manager.access_token().await?;

	println!("Refreshed ahead of expiry: {}.", refreshed.expose());

	code_mock.assert_async().await;
	refresh_mock.assert_async().await;

	let verifier =
		WebhookSignatureVerifier::new("demo-secret").with_clock(Arc::new(clock.clone()));
	let body = br#"[{"objectId":101,"subscriptionType":"contact.creation"}]"#;
	let timestamp = clock.now_millis();
	let signature = compute_signature(
		b"demo-secret",
		"POST",
		"https://app.example.com/webhooks/contacts",
		body,
		timestamp,
	)?;
	let delivery = WebhookRequest {
		method: "POST",
		uri: "https://app.example.com/webhooks/contacts",
		body,
		timestamp,
		signature: &signature,
	};

	println!("Webhook verification: {:?}.", verifier.verify(&delivery));

	Ok(())
}
