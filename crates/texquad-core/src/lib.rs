// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the compact fmt subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::fmt;
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .try_init();
}
