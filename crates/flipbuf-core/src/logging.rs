//! Logging facade.
//!
//! With the `tracing` feature the usual `tracing` macros are re-exported
//! here; without it, a no-op `warn!` is exported at the crate root
//! so call sites compile either way:
//!
//! ```ignore
//! #[cfg(feature = "tracing")]
//! use crate::logging::warn;
//! #[cfg(not(feature = "tracing"))]
//! use crate::warn;
//! ```
//!
//! `tracing-json` adds [`try_init`], which installs a JSON formatter
//! filtered by `RUST_LOG`.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

/// Install a global JSON subscriber honoring `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn try_init() -> bool {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_current_span(true)
        .try_init()
        .is_ok()
}
