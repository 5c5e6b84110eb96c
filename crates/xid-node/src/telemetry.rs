//! Log output for the `xid-node` binary.
//!
//! Events are printed through `tracing_subscriber::fmt` in a human-readable
//! form. Verbosity follows `RUST_LOG` and defaults to `info`; set
//! `RUST_LOG=xid_coord=debug` to follow each allocation step, or `trace` to
//! see every lease renewal.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;
    Ok(())
}
