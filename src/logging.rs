//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the default directive, e.g.
//! `RUST_LOG=acoustic_node=trace` shows per-frame events.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Directive used when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "acoustic_node=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`.
///
/// Returns false when a global subscriber is already installed, so tests may
/// call it repeatedly.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init().is_ok()
}
