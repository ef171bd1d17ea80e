//! Token exchange payloads, redacted secrets, and the mutable credential state.

pub mod response;
pub mod secret;
pub mod state;
