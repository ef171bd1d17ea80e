//! Refresh-safe OAuth 2.0 credential cache and timestamped HMAC webhook verification for
//! third-party API integrations.
//!
//! The crate has two independent halves:
//!
//! - [`manager::TokenLifecycleManager`] caches a bearer credential, refreshes it ahead of expiry
//!   through an [`oauth::OAuthExchangeClient`], and serializes refreshes so concurrent callers
//!   never trigger duplicate grants.
//! - [`webhook::WebhookSignatureVerifier`] authenticates inbound callbacks signed with
//!   `HMAC-SHA256(method + uri + body + timestamp)` and rejects stale or forged deliveries.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod error;
pub mod ext;
pub mod http;
pub mod manager;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod webhook;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
