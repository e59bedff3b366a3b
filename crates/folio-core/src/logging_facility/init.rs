//! Subscriber installation

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, debug and above
    Development,
    /// JSON lines, info and above
    Production,
    /// Nothing is printed; use `init_test_capture` to record events
    Test,
}

impl Profile {
    fn default_directives(&self) -> &'static str {
        match self {
            Profile::Development => "folio_core=debug,folio_store=debug",
            Profile::Production => "folio_core=info,folio_store=info",
            Profile::Test => "off",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber once; later calls are no-ops
///
/// `RUST_LOG` overrides the profile's default directives. SQL statements are
/// emitted under the `folio_store::query` target at debug level when the
/// store's `log` setting enables `query`.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(profile.default_directives()))
        };
        // try_init: a host application may already own the global subscriber
        match profile {
            Profile::Development => {
                let _ = tracing_subscriber::fmt().with_env_filter(filter()).try_init();
            }
            Profile::Production => {
                let _ = tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter())
                    .try_init();
            }
            Profile::Test => {
                let _ = tracing_subscriber::registry().try_init();
            }
        }
    });
}
