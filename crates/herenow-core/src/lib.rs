//! here/now core crate - configuration, errors, domain allowlist, shared types.
//!
//! Everything the storage and API crates have in common lives here so
//! that neither depends on the other for basic vocabulary.

pub mod config;
pub mod domains;
pub mod error;
pub mod types;

pub use config::HereNowConfig;
pub use domains::DomainAllowlist;
pub use error::{HereNowError, Result};
pub use types::*;
