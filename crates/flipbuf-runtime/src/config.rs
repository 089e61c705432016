#![forbid(unsafe_code)]

//! Buffer configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable               | Field          | Accepted values              |
//! |------------------------|----------------|------------------------------|
//! | `FLIPBUF_ASYNC`        | `asynchronous` | `1/true/yes/on`, `0/false/no/off` |
//! | `FLIPBUF_WORKER_NAME`  | `worker_name`  | any non-empty string         |
//!
//! Unparseable values are ignored and the default stays in place.

use std::env;

/// Environment variable selecting asynchronous reconciliation.
pub const ENV_ASYNC: &str = "FLIPBUF_ASYNC";

/// Environment variable naming the reconcile worker thread.
pub const ENV_WORKER_NAME: &str = "FLIPBUF_WORKER_NAME";

/// Construction-time settings for a [`Buffer`](crate::Buffer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Run reconciliation on the buffer's worker thread instead of inline.
    /// Default: false.
    pub asynchronous: bool,

    /// Thread name for the reconcile worker.
    /// Default: `"flipbuf-reconcile"`.
    pub worker_name: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            asynchronous: false,
            worker_name: "flipbuf-reconcile".into(),
        }
    }
}

impl BufferConfig {
    /// Defaults with `FLIPBUF_*` overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    #[must_use]
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Apply overrides from an arbitrary key lookup.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup(ENV_ASYNC)
            && let Some(flag) = parse_flag(&val)
        {
            self.asynchronous = flag;
        }
        if let Some(val) = lookup(ENV_WORKER_NAME) {
            let val = val.trim();
            if !val.is_empty() {
                self.worker_name = val.to_string();
            }
        }
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
