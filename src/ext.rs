//! Extension contracts for attaching cached credentials to outbound requests.

pub mod request_signer;

pub use request_signer::*;
