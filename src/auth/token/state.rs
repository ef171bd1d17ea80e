//! Mutable credential state guarded by the lifecycle manager.

// self
use crate::{
	_prelude::*,
	auth::{TokenResponse, TokenSecret},
};

/// Upper bound applied when `expires_in` would overflow the calendar.
const MAX_LIFETIME: Duration = Duration::days(365 * 100);

/// Cached credential owned by a [`TokenLifecycleManager`](crate::manager::TokenLifecycleManager).
///
/// An absent access token means re-authentication is required; nothing in the crate fabricates
/// one. `expires_at` is only meaningful while `access_token` is present.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenState {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	expires_at: Option<OffsetDateTime>,
}
impl TokenState {
	/// Returns the cached access token, fresh or not.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// Returns the cached refresh token.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Returns the absolute expiry of the cached access token.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at
	}

	/// Returns `true` when neither token is cached.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	/// Returns the access token when it stays usable beyond `margin` at `now`.
	pub fn usable_access_token(&self, now: OffsetDateTime, margin: Duration) -> Option<&TokenSecret> {
		let token = self.access_token.as_ref()?;
		let deadline = self.expires_at?.checked_sub(margin)?;

		(now < deadline).then_some(token)
	}

	/// Accepts a token response issued at `now` and returns the new access token.
	///
	/// A response without a refresh token keeps the cached one.
	pub fn apply(&mut self, response: TokenResponse, now: OffsetDateTime) -> TokenSecret {
		let TokenResponse { access_token, refresh_token, expires_in, .. } = response;

		if let Some(refresh) = refresh_token {
			self.refresh_token = Some(refresh);
		}

		self.expires_at = Some(expiry_from(now, expires_in));
		self.access_token = Some(access_token.clone());

		access_token
	}

	/// Clears every cached secret and the expiry.
	pub fn invalidate(&mut self) {
		self.access_token = None;
		self.refresh_token = None;
		self.expires_at = None;
	}
}
impl Debug for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenState")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

fn expiry_from(now: OffsetDateTime, expires_in: i64) -> OffsetDateTime {
	match now.checked_add(Duration::seconds(expires_in)) {
		Some(instant) => instant,
		None if expires_in.is_negative() => now,
		None => now.checked_add(MAX_LIFETIME).unwrap_or(now),
	}
}
