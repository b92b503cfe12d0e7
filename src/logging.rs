//! Tracing setup for the command line.

use std::io::{self, IsTerminal};

use tracing_subscriber::{EnvFilter, prelude::*};

/// Initialize tracing. Call once at process startup.
///
/// `RUST_LOG` takes precedence; otherwise our own crate logs at `info`, or `debug` when
/// `verbose` is set. Everything is written to stderr so tool output on stdout stays clean.
pub fn init_tracing(verbose: bool) {
    let level = if verbose {
        "oakd_bundle=debug"
    } else {
        "oakd_bundle=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal())
                .with_target(false),
        )
        .try_init();
}
