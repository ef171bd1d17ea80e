//! Auth-domain identifiers and the cached credential model.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{response::*, secret::*, state::*};
