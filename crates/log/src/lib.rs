//! # Tether Log
//!
//! Tracing subscriber setup shared by tether binaries and test suites.
//!
//! ```ignore
//! let _guard = tether_log::auto_init()?;
//! tracing::info!(lock = "jobs:nightly", "lock acquired");
//! ```

mod builder;
pub mod config;
pub mod error;

pub use builder::{LoggerBuilder, LoggerGuard, ReloadHandle};
pub use config::{Config, DisplayConfig, Format};
pub use error::{LogError, LogResult};

use std::sync::OnceLock;

/// Pick a configuration from the environment and build type, then init.
///
/// Uses [`Config::from_env`] when `TETHER_LOG` or `RUST_LOG` is set,
/// otherwise the development preset in debug builds and production in
/// release builds.
pub fn auto_init() -> LogResult<LoggerGuard> {
    if std::env::var("TETHER_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Install the test configuration once per process.
///
/// Safe to call from every test; later calls, or calls after another
/// subscriber was installed, do nothing.
pub fn try_init_test() {
    static TEST_INIT: OnceLock<()> = OnceLock::new();
    TEST_INIT.get_or_init(|| {
        if tracing::dispatcher::has_been_set() {
            return;
        }
        // Losing the race to another subscriber is fine for tests.
        let _ = LoggerBuilder::from_config(Config::test())
            .with_test_writer()
            .build();
    });
}
