//! Shared pieces of the `tecrad` daemon and the `tecra-cli` RPC client

pub mod client;
pub mod config;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber; `RUST_LOG` overrides the default `info` filter.
///
/// `log` records from the library crates are forwarded to it.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
