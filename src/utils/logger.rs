//! Logging setup
//!
//! The library only emits records through the `log` facade; binaries pick
//! the backend. [`Logger`] wires up `env_logger`, letting `RUST_LOG`
//! override the chosen default.
//!
//! # Example
//!
//! ```rust
//! use posql_client::utils::Logger;
//!
//! Logger::init();
//! log::info!("client started");
//! ```

use log::LevelFilter;

/// `env_logger` setup
pub struct Logger;

impl Logger {
    /// Initialize the logger at `info`
    ///
    /// `RUST_LOG` (e.g. `RUST_LOG=posql_client=debug`) takes precedence.
    /// Does nothing if a logger is already installed.
    pub fn init() {
        Self::init_with_level(LevelFilter::Info);
    }

    /// Initialize logger with custom default level
    ///
    /// # Arguments
    /// * `level` - Level used when `RUST_LOG` is unset
    pub fn init_with_level(level: LevelFilter) {
        let _ = Self::try_init(level);
    }

    /// Initialize logger, reporting whether this call installed it
    ///
    /// # Returns
    /// `false` if another logger was installed first
    pub fn try_init(level: LevelFilter) -> bool {
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_millis()
            .try_init()
            .is_ok()
    }

    /// Level for a `-v` count: 0 → warn, 1 → info, 2 → debug, 3+ → trace
    pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
        match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
