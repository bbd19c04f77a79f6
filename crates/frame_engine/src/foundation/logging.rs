//! Logging setup
//!
//! Library code logs through the `log` facade; the binary installs `env_logger` once.

pub use log::{debug, error, info, trace, warn};

/// Filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_FILTER: &str = "info";

/// Install the global logger
///
/// `RUST_LOG` wins over `filter`, which wins over [`DEFAULT_FILTER`]. Calling this more
/// than once is harmless.
pub fn init(filter: Option<&str>) {
    let default_filter = filter.unwrap_or(DEFAULT_FILTER);
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
    if result.is_err() {
        log::debug!("Logger already initialized");
    }
}
