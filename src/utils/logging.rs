//! Logger setup and per-module switchable logging macros.
//!
//! A module opts in by declaring the flag the macros read:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn, log_error};
//! ```

use log::LevelFilter;

/// Installs `env_logger`. `RUST_LOG` wins over `default_level`; a second call
/// is a no-op so tests and the binary can both call it.
pub fn init(default_level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp_secs()
        .try_init();
}

/// Level for the binary: `Debug` under `PUNCHCARD_DEBUG`, else `Warn` so
/// command output stays readable.
pub fn default_level() -> LevelFilter {
    match std::env::var("PUNCHCARD_DEBUG") {
        Ok(value) if value == "1" || value.eq_ignore_ascii_case("true") => LevelFilter::Debug,
        _ => LevelFilter::Warn,
    }
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
