//! Logging facade: installs the global `tracing` subscriber.

use dbseed_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the event filter; `RUST_LOG` wins over the configured level.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => level_filter(&settings.log_level),
    }
}

fn level_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|error| anyhow::anyhow!("invalid log level '{}': {}", level, error))
}

/// Initialize the tracing pipeline.
///
/// A subscriber installed earlier (tests, an embedding binary) is left in
/// place.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };
    installed.ok();

    tracing::debug!(
        target: "dbseed-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}
