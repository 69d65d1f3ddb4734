use tracing_subscriber::EnvFilter;

/// Directives applied when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str =
    "info,vellum_render=debug,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over [`DEFAULT_FILTER`].
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Installs the global fmt subscriber with explicit filter directives.
///
/// Returns `false` if a global subscriber was already installed, which is
/// common in test binaries that initialise logging from several tests.
pub fn init_with_filter(directives: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .try_init()
        .is_ok()
}
