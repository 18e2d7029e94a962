use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use dbseed_app::{exit_code, load_spec, provision, render_json, render_text, ExitStatus};
use dbseed_kernel::settings::Settings;
use dbseed_kernel::{BootstrapPolicy, Bootstrapper, MemoryConnector, ProvisioningSpec, RunReport};

#[derive(Debug, Parser)]
#[command(name = "dbseed", version, about = "Ensure required database users and collections exist")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply the provisioning spec to the configured database
    Run {
        /// JSON spec file; overrides `bootstrap.spec_path`
        #[arg(long)]
        spec: Option<String>,
        /// Stop after the first failed action
        #[arg(long)]
        halt_on_first_failure: bool,
        /// Exit zero even if some actions failed
        #[arg(long)]
        allow_partial_failure: bool,
        /// Apply to an empty in-memory database instead of the configured one
        #[arg(long)]
        dry_run: bool,
        #[arg(long, value_enum, default_value_t = Output::Text)]
        output: Output,
    },
    /// Parse and validate the provisioning spec without connecting
    Validate {
        #[arg(long)]
        spec: Option<String>,
    },
    /// Print the provisioning spec as JSON with passwords redacted
    Show {
        #[arg(long)]
        spec: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Text,
    Json,
}

/// Resolve `--spec` against `bootstrap.spec_path` and load it; an invalid
/// spec is reported on stderr and mapped to its exit code.
fn spec_or_exit(arg: Option<String>, settings: &Settings) -> Result<ProvisioningSpec, ExitCode> {
    let path = arg.or_else(|| settings.bootstrap.spec_path.clone());
    load_spec(path.as_deref()).map_err(|error| {
        eprintln!("error: {error:#}");
        ExitStatus::InvalidInput.into()
    })
}

async fn run_once(settings: &Settings, spec: ProvisioningSpec, dry_run: bool) -> RunReport {
    if dry_run {
        let bootstrapper = Bootstrapper::new(BootstrapPolicy::from_settings(settings));
        return bootstrapper.run(spec, &MemoryConnector::new()).await;
    }
    provision(settings, spec).await
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = match Settings::load() {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("error: failed to load dbseed settings: {error:#}");
            return Ok(ExitStatus::InvalidInput.into());
        }
    };
    dbseed_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Run {
            spec,
            halt_on_first_failure,
            allow_partial_failure,
            dry_run,
            output,
        } => {
            settings.bootstrap.halt_on_first_failure |= halt_on_first_failure;
            settings.bootstrap.allow_partial_failure |= allow_partial_failure;

            let spec = match spec_or_exit(spec, &settings) {
                Ok(spec) => spec,
                Err(code) => return Ok(code),
            };

            tracing::info!(
                env = ?settings.environment,
                db = %settings.database.display_target(),
                dry_run,
                "dbseed run starting"
            );

            let report = run_once(&settings, spec, dry_run).await;
            match output {
                Output::Text => print!("{}", render_text(&report)),
                Output::Json => println!("{}", render_json(&report)?),
            }

            Ok(exit_code(&report, settings.bootstrap.allow_partial_failure).into())
        }
        Command::Validate { spec } => {
            let spec = match spec_or_exit(spec, &settings) {
                Ok(spec) => spec,
                Err(code) => return Ok(code),
            };
            println!("spec is valid: {} action(s)", spec.len());
            Ok(ExitStatus::Success.into())
        }
        Command::Show { spec } => {
            let spec = match spec_or_exit(spec, &settings) {
                Ok(spec) => spec,
                Err(code) => return Ok(code),
            };
            let json = serde_json::to_string_pretty(&spec)?;
            println!("{json}");
            Ok(ExitStatus::Success.into())
        }
    }
}
