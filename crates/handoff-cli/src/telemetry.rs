//! Log output for the load driver.
//!
//! Events from both the driver and the `handoff` library (built with its
//! `tracing` feature) go to stderr through `tracing_subscriber::fmt`. The level
//! is controlled by `RUST_LOG` and defaults to `info`. Use
//! `RUST_LOG=handoff=trace` to see every dispatch.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false),
        )
        .try_init()?;

    Ok(())
}
