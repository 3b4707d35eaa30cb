//! Console logging for the load driver.
//!
//! Pool internals log through `tracing` when the `wormpool/tracing` feature is
//! on; this module installs the subscriber that prints them. The filter is
//! read from `RUST_LOG` and falls back to `info`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry(json: bool) -> anyhow::Result<()> {
    let pretty = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
            .with_file(true)
            .pretty()
    });

    let structured = json.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
            .json()
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(pretty)
        .with(structured)
        .try_init()?;

    Ok(())
}
