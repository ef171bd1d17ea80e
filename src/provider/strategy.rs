//! Provider strategy hooks that classify failed token exchanges.
//!
//! The lifecycle manager only distinguishes two outcomes for a failed exchange: the
//! authorization server refused the grant for good, or the failure is temporary. Strategies own
//! that decision so providers with unusual error payloads can be supported without touching
//! the manager.

// std
use std::collections::BTreeMap;
// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Strategy hook that allows providers to decorate requests and classify errors.
pub trait ProviderStrategy: Send + Sync {
	/// Maps a failed token request into the crate taxonomy.
	fn classify_exchange_error(&self, ctx: &ExchangeErrorContext) -> ExchangeErrorKind;

	/// Gives providers a chance to add custom form parameters before dispatching.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Outcome categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeErrorKind {
	/// The server refused the code, refresh token, or client credentials; retrying is pointless.
	Rejected,
	/// Failure is temporary and a later attempt may succeed.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
}
impl ExchangeErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy keyed on the HTTP status class, refined by RFC 6749 error codes and body
/// hints.
///
/// Server errors (5xx) are always transient, whatever the body says. For other statuses the
/// OAuth `error` code decides first, then hints in the description or body, then the status:
/// client errors (4xx) are final except `408 Request Timeout` and `429 Too Many Requests`, and
/// anything unrecognized is transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_exchange_error(&self, ctx: &ExchangeErrorContext) -> ExchangeErrorKind {
		if matches!(ctx.http_status, Some(500..=599)) {
			return ExchangeErrorKind::Transient;
		}
		if let Some(kind) = ctx.oauth_error.as_deref().and_then(match_error_code) {
			return kind;
		}
		if let Some(kind) = classify_text(ctx.error_description.as_deref())
			.or_else(|| classify_text(ctx.body_preview.as_deref()))
		{
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ExchangeErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf: String = body.chars().take(ExchangeErrorContext::BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

fn match_error_code(value: &str) -> Option<ExchangeErrorKind> {
	const REJECTED: [&str; 7] = [
		"invalid_grant",
		"invalid_client",
		"unauthorized_client",
		"access_denied",
		"invalid_request",
		"unsupported_grant_type",
		"invalid_scope",
	];
	const TRANSIENT: [&str; 3] = ["temporarily_unavailable", "server_error", "slow_down"];

	if REJECTED.iter().any(|code| value.eq_ignore_ascii_case(code)) {
		Some(ExchangeErrorKind::Rejected)
	} else if TRANSIENT.iter().any(|code| value.eq_ignore_ascii_case(code)) {
		Some(ExchangeErrorKind::Transient)
	} else {
		None
	}
}

fn classify_text(text: Option<&str>) -> Option<ExchangeErrorKind> {
	let lowered = text?.to_ascii_lowercase();

	if lowered.contains("invalid_grant") || lowered.contains("invalid_client") {
		Some(ExchangeErrorKind::Rejected)
	} else if lowered.contains("temporarily_unavailable") {
		Some(ExchangeErrorKind::Transient)
	} else {
		None
	}
}

fn classify_status(status: Option<u16>) -> ExchangeErrorKind {
	match status {
		Some(408 | 429) => ExchangeErrorKind::Transient,
		Some(400..=499) => ExchangeErrorKind::Rejected,
		_ => ExchangeErrorKind::Transient,
	}
}
