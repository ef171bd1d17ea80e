//! Cached bearer credential with proactive, serialized refresh.
//!
//! [`TokenLifecycleManager`] owns the only mutable credential state in the crate. Every lookup
//! runs the full check, refresh and store sequence under one async mutex, so concurrent callers
//! that find an expiring token queue behind a single refresh grant and then observe its outcome
//! (the rotated token or the invalidated state) instead of issuing duplicate grants.
//!
//! Failures follow two rules. A rejected refresh grant wipes the state and reports
//! [`Error::RefreshRejected`]; anything else (network, timeout, 5xx, malformed response)
//! leaves the state exactly as it was so the next call retries with the same refresh token.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenResponse, TokenSecret, TokenState},
	clock::{Clock, SystemClock},
	error::TransientError,
	ext::RequestSignerExt,
	oauth::{ExchangeFuture, OAuthExchangeClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Timing knobs for [`TokenLifecycleManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
	/// Window before the real expiry in which a cached token counts as stale.
	pub refresh_margin: Duration,
	/// Upper bound for a single token endpoint exchange; must be positive.
	#[serde(deserialize_with = "deserialize_positive_duration")]
	pub exchange_timeout: Duration,
}
impl LifecycleConfig {
	/// Default refresh margin.
	pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::minutes(5);
	/// Default exchange timeout.
	pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::seconds(30);

	/// Overrides the refresh margin.
	pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
		self.refresh_margin = margin;

		self
	}

	/// Overrides the exchange timeout.
	///
	/// Zero or negative values keep [`Self::DEFAULT_EXCHANGE_TIMEOUT`].
	pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
		if timeout.is_positive() {
			self.exchange_timeout = timeout;
		}

		self
	}

	/// Exchange timeout as a std duration, falling back to the default when the field was set
	/// to a non-positive value directly.
	fn effective_exchange_timeout(&self) -> (Duration, std::time::Duration) {
		let timeout = if self.exchange_timeout.is_positive() {
			self.exchange_timeout
		} else {
			Self::DEFAULT_EXCHANGE_TIMEOUT
		};

		(timeout, std::time::Duration::try_from(timeout).unwrap_or(std::time::Duration::from_secs(30)))
	}
}
impl Default for LifecycleConfig {
	fn default() -> Self {
		Self {
			refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
			exchange_timeout: Self::DEFAULT_EXCHANGE_TIMEOUT,
		}
	}
}

fn deserialize_positive_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let duration = Duration::deserialize(deserializer)?;

	if duration.is_positive() {
		Ok(duration)
	} else {
		Err(serde::de::Error::custom(format!("exchange timeout must be positive, got {duration}")))
	}
}

/// In-memory OAuth 2.0 credential cache that refreshes ahead of expiry.
///
/// Construct one per integration and share it behind an [`Arc`]. Exchange timeouts rely on
/// `tokio::time`, so the manager must be driven from within a Tokio runtime.
pub struct TokenLifecycleManager {
	exchange: Arc<dyn OAuthExchangeClient>,
	clock: Arc<dyn Clock>,
	config: LifecycleConfig,
	state: AsyncMutex<TokenState>,
	metrics: Arc<RefreshMetrics>,
}
impl TokenLifecycleManager {
	/// Creates an empty manager backed by `exchange` and the system clock.
	pub fn new(exchange: Arc<dyn OAuthExchangeClient>) -> Self {
		Self {
			exchange,
			clock: Arc::new(SystemClock),
			config: LifecycleConfig::default(),
			state: AsyncMutex::new(TokenState::default()),
			metrics: Default::default(),
		}
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Replaces the timing configuration.
	pub fn with_config(mut self, config: LifecycleConfig) -> Self {
		self.config = config;

		self
	}

	/// Returns the active timing configuration.
	pub fn config(&self) -> &LifecycleConfig {
		&self.config
	}

	/// Returns the shared lookup counters.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	/// Returns a copy of the cached state.
	pub async fn snapshot(&self) -> TokenState {
		self.state.lock().await.clone()
	}

	/// Accepts a token endpoint response.
	///
	/// The expiry is computed from the current instant. A response without a refresh token
	/// keeps the previously cached one.
	pub async fn store_tokens(&self, response: TokenResponse) {
		let mut state = self.state.lock().await;

		state.apply(response, self.clock.now());
	}

	/// Clears the access token, refresh token, and expiry.
	pub async fn invalidate(&self) {
		self.state.lock().await.invalidate();
	}

	/// Returns a usable access token, refreshing it when it is inside the refresh margin.
	///
	/// # Errors
	///
	/// - [`Error::NoCredential`] when nothing is cached or no refresh token is available; the
	///   state is invalidated.
	/// - [`Error::RefreshRejected`] when the authorization server refused the refresh grant;
	///   the state is invalidated.
	/// - Any other variant for transient failures; the state is left untouched.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let mut state = self.state.lock().await;

				self.metrics.record_attempt();

				if let Some(token) =
					state.usable_access_token(self.clock.now(), self.config.refresh_margin)
				{
					self.metrics.record_cache_hit();

					return Ok(token.clone());
				}

				let Some(refresh_token) = state.refresh_token().cloned() else {
					state.invalidate();
					self.metrics.record_rejection();

					#[cfg(feature = "tracing")]
					tracing::warn!("No refresh token is cached; re-authentication is required.");

					return Err(Error::NoCredential);
				};

				match self.bounded(self.exchange.exchange_refresh_token(&refresh_token)).await {
					Ok(response) => {
						let token = state.apply(response, self.clock.now());

						self.metrics.record_refresh();

						Ok(token)
					},
					Err(err @ Error::RefreshRejected { .. }) => {
						state.invalidate();
						self.metrics.record_rejection();

						#[cfg(feature = "tracing")]
						tracing::warn!(error = %err, "Refresh grant rejected; cached credential invalidated.");

						Err(err)
					},
					Err(err) => {
						self.metrics.record_transient_failure();

						#[cfg(feature = "tracing")]
						tracing::warn!(error = %err, "Refresh failed transiently; cached credential kept.");

						Err(err)
					},
				}
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Same as [`access_token`](Self::access_token) but collapses every failure into `None`.
	pub async fn get_access_token(&self) -> Option<TokenSecret> {
		self.access_token().await.ok()
	}

	/// Exchanges an authorization code and caches the resulting tokens.
	///
	/// A rejected code leaves the cached state untouched.
	pub async fn exchange_code(&self, code: &str) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::CodeExchange;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self
					.bounded(self.exchange.exchange_authorization_code(code))
					.await
					.inspect_err(|_err| {
						#[cfg(feature = "tracing")]
						tracing::warn!(error = %_err, "Authorization code exchange failed.");
					})?;
				let mut state = self.state.lock().await;

				Ok(state.apply(response, self.clock.now()))
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Attaches the current access token to `request` through `signer`.
	///
	/// Fails without touching the request when no usable token can be produced, so callers
	/// never send an unauthenticated request.
	pub async fn authorize<S, R>(&self, signer: &S, request: R) -> Result<R>
	where
		S: ?Sized + RequestSignerExt<R, Error>,
	{
		let token = self.access_token().await?;

		signer.attach_token(request, &token)
	}

	async fn bounded<T>(&self, exchange: ExchangeFuture<'_, T>) -> Result<T> {
		let (timeout, limit) = self.config.effective_exchange_timeout();

		tokio::time::timeout(limit, exchange)
			.await
			.map_err(|_| TransientError::Timeout { timeout })?
	}
}
impl Debug for TokenLifecycleManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenLifecycleManager").field("config", &self.config).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::clock::ManualClock;

	struct StaticExchange;
	impl OAuthExchangeClient for StaticExchange {
		fn exchange_authorization_code<'a>(
			&'a self,
			code: &'a str,
		) -> ExchangeFuture<'a, TokenResponse> {
			Box::pin(async move {
				Ok(TokenResponse::new(format!("access-{code}"), 3_600).with_refresh_token("refresh"))
			})
		}

		fn exchange_refresh_token<'a>(
			&'a self,
			_refresh_token: &'a TokenSecret,
		) -> ExchangeFuture<'a, TokenResponse> {
			Box::pin(async { Ok(TokenResponse::new("refreshed", 3_600)) })
		}
	}

	#[test]
	fn config_defaults_match_documented_windows() {
		let config = LifecycleConfig::default();

		assert_eq!(config.refresh_margin, Duration::minutes(5));
		assert_eq!(config.exchange_timeout, Duration::seconds(30));

		let config = config.with_refresh_margin(Duration::ZERO);

		assert_eq!(config.refresh_margin, Duration::ZERO);
	}

	#[test]
	fn non_positive_exchange_timeouts_are_refused() {
		let config = LifecycleConfig::default()
			.with_exchange_timeout(Duration::seconds(-5))
			.with_exchange_timeout(Duration::ZERO);

		assert_eq!(config.exchange_timeout, LifecycleConfig::DEFAULT_EXCHANGE_TIMEOUT);

		let config = LifecycleConfig { exchange_timeout: Duration::seconds(-1), ..config };

		assert_eq!(
			config.effective_exchange_timeout(),
			(Duration::seconds(30), std::time::Duration::from_secs(30))
		);

		let err = serde_json::from_str::<LifecycleConfig>(r#"{"exchange_timeout":[-5,0]}"#)
			.expect_err("Negative timeouts must not deserialize.");

		assert!(err.to_string().contains("exchange timeout must be positive"), "{err}");

		let config = serde_json::from_str::<LifecycleConfig>(r#"{"exchange_timeout":[10,0]}"#)
			.expect("Positive timeouts should deserialize.");

		assert_eq!(config.exchange_timeout, Duration::seconds(10));
		assert_eq!(config.refresh_margin, LifecycleConfig::DEFAULT_REFRESH_MARGIN);
	}

	#[tokio::test]
	async fn exchange_code_then_refresh_keeps_rotating() {
		let clock = ManualClock::default();
		let manager =
			TokenLifecycleManager::new(Arc::new(StaticExchange)).with_clock(Arc::new(clock.clone()));
		let token = manager.exchange_code("abc").await.expect("Code exchange should succeed.");

		assert_eq!(token.expose(), "access-abc");

		clock.advance(Duration::hours(1));

		let token = manager.access_token().await.expect("Refresh should succeed.");

		assert_eq!(token.expose(), "refreshed");

		let state = manager.snapshot().await;

		assert_eq!(state.refresh_token().map(TokenSecret::expose), Some("refresh"));
		assert_eq!(manager.metrics().refreshes(), 1);
	}

	#[tokio::test]
	async fn empty_manager_reports_no_credential() {
		let manager = TokenLifecycleManager::new(Arc::new(StaticExchange));
		let err = manager.access_token().await.expect_err("Nothing is cached yet.");

		assert!(matches!(err, Error::NoCredential));
		assert!(manager.get_access_token().await.is_none());
	}
}
