use anyhow::Context;
use dbseed_db::MongoConnector;
use dbseed_kernel::settings::Settings;
use dbseed_kernel::{BootstrapPolicy, Bootstrapper, ProvisioningSpec, RunReport};

/// Spec applied when no `bootstrap.spec_path` is configured: the
/// application user with `readWrite` on `mydatabase`, and its `test`
/// collection.
pub const DEFAULT_SPEC: &str = include_str!("../config/provisioning.json");

/// Load and validate the provisioning spec at `path`, or the embedded default.
pub fn load_spec(path: Option<&str>) -> anyhow::Result<ProvisioningSpec> {
    match path {
        Some(path) => ProvisioningSpec::from_path(path)
            .with_context(|| format!("invalid provisioning spec '{}'", path)),
        None => ProvisioningSpec::from_json_str(DEFAULT_SPEC)
            .with_context(|| "invalid embedded provisioning spec"),
    }
}

/// Apply `spec` to the MongoDB deployment described by `settings`.
pub async fn provision(settings: &Settings, spec: ProvisioningSpec) -> RunReport {
    let connector = MongoConnector::new(settings.database.clone());
    let bootstrapper = Bootstrapper::new(BootstrapPolicy::from_settings(settings));
    bootstrapper.run(spec, &connector).await
}
