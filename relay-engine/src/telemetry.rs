//! Tracing setup for processes embedding the engine

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber, honouring `RUST_LOG`
///
/// Falls back to `default_directive` (e.g. `"relay_engine=info"`) when
/// `RUST_LOG` is unset or invalid. Panics if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Like [`init_tracing`] but returns `false` instead of panicking when a
/// subscriber is already installed
pub fn try_init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}

fn env_filter(default_directive: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive.to_string().into())
}
