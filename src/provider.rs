//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the token endpoint,
//! supported grant flags, and the client authentication preference. `strategy` defines
//! [`ProviderStrategy`], the hook that decides whether a failed exchange is a final rejection
//! or a transient failure worth retrying.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
