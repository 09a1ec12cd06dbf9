//! Utilities module
//!
//! - `Logger`: `env_logger` setup for binaries and tests
//! - `Helpers`: formatting for CLI output
//!
//! # Example
//!
//! ```rust
//! use posql_client::utils::{Helpers, Logger};
//! use std::time::Duration;
//!
//! Logger::init();
//! log::info!("verified in {}", Helpers::format_duration(Duration::from_millis(40)));
//! ```

pub mod helpers;
pub mod logger;

pub use helpers::Helpers;
pub use logger::Logger;
