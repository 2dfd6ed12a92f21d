//! Structured logging setup: a `tracing-subscriber` `EnvFilter` layer over
//! stdout, initialized once from `main`.

use color_eyre::eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. `default_directive` seeds
/// the filter (normally the resolved config's `log` field) and is
/// overridden by `RUST_LOG` when that variable is set.
pub fn init(default_directive: &str) -> Result<()> {
    let default_directive = default_directive
        .parse()
        .wrap_err_with(|| format!("`{default_directive}` is not a valid log filter directive"))?;

    let filter = EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| color_eyre::eyre::eyre!("failed to install logging subscriber: {err}"))
}
