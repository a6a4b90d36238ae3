pub mod build_info;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVES: &str = "kas_kiosk=info,kas_core=info,kas_storage_json=info";

/// Installs the global `fmt` subscriber once; `RUST_LOG` overrides the defaults.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

        // A host application may already own the global subscriber.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
