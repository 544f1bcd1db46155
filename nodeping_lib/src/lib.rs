//! NodePing API client library.
//!
//! Provides a typed client for the read endpoints of the NodePing REST API:
//! accounts, checks, and check results.

pub mod check;
pub mod check_result;
pub mod client;
pub mod config;
pub mod error;
pub mod helpers;

pub use check::{Check, CheckType};
pub use check_result::CheckResult;
pub use client::Client;
pub use config::{ClientConfig, API_VERSION, BASE_URL, DEFAULT_TIMEOUT_SECS, MAX_RESULT_LIMIT};
pub use error::{Error, MalformedResponseError, Result, ServiceError, TransportError};
pub use helpers::parent_check_id;

/// Library version for User-Agent and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
