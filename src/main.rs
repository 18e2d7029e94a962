use std::process::ExitCode;

use dbseed_app::{exit_code, load_spec, provision, render_text, ExitStatus};
use dbseed_kernel::settings::Settings;

/// Container entrypoint: apply the configured spec once and exit.
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("error: failed to load dbseed settings: {error:#}");
            return Ok(ExitStatus::InvalidInput.into());
        }
    };
    dbseed_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.display_target(),
        "dbseed bootstrap starting"
    );

    let spec = match load_spec(settings.bootstrap.spec_path.as_deref()) {
        Ok(spec) => spec,
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "refusing to run");
            return Ok(ExitStatus::InvalidInput.into());
        }
    };

    let report = provision(&settings, spec).await;
    print!("{}", render_text(&report));

    let status = exit_code(&report, settings.bootstrap.allow_partial_failure);
    tracing::info!(exit_status = ?status, "dbseed bootstrap complete");
    Ok(status.into())
}
