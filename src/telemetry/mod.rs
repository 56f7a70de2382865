//! Tracing subscriber setup (spec §6: structured logging is part of the
//! ambient stack regardless of the spec's feature scope).
//!
//! Grounded on the `tracing_subscriber::registry()` + `EnvFilter` +
//! `fmt::layer()` shape used by the other example agent binaries in the
//! pack; this crate's teacher declares the same `tracing`/
//! `tracing-subscriber` dependencies but never wires them up itself, so
//! the layering is adapted from `ravituringworks-generic-ai-agent`'s
//! daemon binaries instead.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,saga=debug";

/// Initialize the global tracing subscriber with human-readable output.
/// Call once, at process startup; a second call is a silent no-op (a
/// subscriber is already installed and `tracing` only keeps the first).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// Initialize the global tracing subscriber with newline-delimited JSON
/// output, for deployments that ship logs to a collector rather than a
/// terminal.
pub fn init_json() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .try_init();
}
