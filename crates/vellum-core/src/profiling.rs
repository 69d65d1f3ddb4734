//! Profiling utilities based on the `puffin` crate.
//!
//! The renderer marks its hot paths with [`profile_function`] and
//! [`profile_scope`]. Scopes cost almost nothing until
//! [`init_profiling`] turns them on.

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

/// Where collected scopes are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilingBackend {
    /// Scopes are collected in-process only (e.g. for an embedded viewer).
    InProcess,
    /// Scopes are served to `puffin_viewer` over HTTP on the given address.
    #[cfg(feature = "profiling")]
    PuffinHttp { bind_address: String },
}

impl ProfilingBackend {
    /// The puffin HTTP server on its conventional port.
    #[cfg(feature = "profiling")]
    pub fn puffin_http_default() -> Self {
        Self::PuffinHttp {
            bind_address: format!("0.0.0.0:{}", puffin_http::DEFAULT_PORT),
        }
    }
}

#[cfg(feature = "profiling")]
static PROFILING_SERVER: std::sync::OnceLock<puffin_http::Server> = std::sync::OnceLock::new();

/// Enable puffin scopes and start the selected backend.
///
/// # Example
/// ```no_run
/// use vellum_core::profiling::{init_profiling, ProfilingBackend};
///
/// init_profiling(ProfilingBackend::puffin_http_default());
/// ```
pub fn init_profiling(backend: ProfilingBackend) {
    puffin::set_scopes_on(true);

    match backend {
        ProfilingBackend::InProcess => {
            tracing::info!("Puffin scopes enabled (in-process)");
        }
        #[cfg(feature = "profiling")]
        ProfilingBackend::PuffinHttp { bind_address } => {
            match puffin_http::Server::new(&bind_address) {
                Ok(server) => {
                    tracing::info!("Puffin profiler server listening on {}", bind_address);
                    let _ = PROFILING_SERVER.set(server);
                }
                Err(e) => {
                    tracing::error!("Failed to start puffin server on {}: {}", bind_address, e);
                }
            }
        }
    }
}

/// Mark a frame boundary. Call once per rendered frame.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
