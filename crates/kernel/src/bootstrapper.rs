use std::collections::BTreeSet;
use std::time::Duration;

use crate::connector::{Connector, Creation, Session};
use crate::error::ProvisionError;
use crate::outcome::{ExecutionResult, RunReport, Status};
use crate::settings::Settings;
use crate::spec::{Action, ProvisioningSpec, RoleGrant, Secret};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time granted to a connector past `connect_timeout` before the
/// attempt is abandoned. Connectors enforce `connect_timeout` themselves and
/// must get to report (and clean up) their own failure first.
const CONNECT_GRACE: Duration = Duration::from_secs(1);

/// Knobs controlling a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPolicy {
    /// Stop attempting actions after the first `Failed` one; the rest are `Skipped`.
    pub halt_on_first_failure: bool,
    /// Deadline the connector is given for acquiring a session, including
    /// the liveness check. The run gives up `CONNECT_GRACE` after it.
    pub connect_timeout: Duration,
}

impl BootstrapPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            halt_on_first_failure: settings.bootstrap.halt_on_first_failure,
            connect_timeout: Duration::from_millis(settings.database.connect_timeout_ms),
        }
    }
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            halt_on_first_failure: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Applies a [`ProvisioningSpec`] to a target, one action at a time.
#[derive(Debug, Clone, Default)]
pub struct Bootstrapper {
    policy: BootstrapPolicy,
}

impl Bootstrapper {
    pub fn new(policy: BootstrapPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BootstrapPolicy {
        &self.policy
    }

    /// Connect, apply every action in declared order, and close the session.
    ///
    /// Never fails: every problem is reported in the returned [`RunReport`].
    /// When the target cannot be reached the report is
    /// [`RunReport::ConnectionFailed`] carrying the connector's own error, and
    /// nothing was attempted. A connector that neither succeeds nor fails
    /// within the connect timeout plus a short grace period is abandoned.
    pub async fn run<C: Connector>(&self, spec: ProvisioningSpec, connector: &C) -> RunReport {
        let target = connector.target();
        tracing::info!(
            target_db = %target,
            actions = spec.len(),
            halt_on_first_failure = self.policy.halt_on_first_failure,
            "bootstrap run starting"
        );

        let deadline = self.policy.connect_timeout + CONNECT_GRACE;
        let session = match tokio::time::timeout(deadline, connector.connect()).await {
            Ok(Ok(session)) => session,
            Ok(Err(error)) => {
                tracing::error!(target_db = %target, error = %error, "connection failed");
                return RunReport::ConnectionFailed {
                    detail: error.message,
                };
            }
            Err(_) => {
                let detail = format!(
                    "no response from {target} within {}ms",
                    deadline.as_millis()
                );
                tracing::error!(target_db = %target, "{detail}");
                return RunReport::ConnectionFailed { detail };
            }
        };

        let results = self.apply_all(&session, spec.into_actions()).await;

        if let Err(error) = session.close().await {
            tracing::warn!(target_db = %target, error = %error, "failed to close session");
        }

        let report = RunReport::Completed { results };
        tracing::info!(
            target_db = %target,
            failed = report.failed_count(),
            success = report.is_success(),
            "bootstrap run complete"
        );
        report
    }

    async fn apply_all<S: Session>(&self, session: &S, actions: Vec<Action>) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(actions.len());
        let mut halted = false;

        for action in actions {
            if halted {
                tracing::info!(action = %action, "skipping action");
                results.push(ExecutionResult::skipped(action));
                continue;
            }

            let result = apply(session, action).await;
            match result.status {
                Status::Failed(kind) => {
                    tracing::warn!(
                        action = %result.action,
                        error_kind = %kind,
                        detail = %result.detail,
                        "action failed"
                    );
                    halted = self.policy.halt_on_first_failure;
                }
                status => {
                    tracing::info!(action = %result.action, status = %status, "action applied");
                }
            }
            results.push(result);
        }

        results
    }
}

async fn apply<S: Session>(session: &S, action: Action) -> ExecutionResult {
    let outcome = match &action {
        Action::EnsureUser {
            username,
            password,
            auth_database,
            roles,
        } => ensure_user(session, auth_database, username, password, roles).await,
        Action::EnsureCollection { database, name } => {
            ensure_collection(session, database, name).await
        }
    };

    match outcome {
        Ok((Creation::Created, detail)) => ExecutionResult::success(action, detail),
        Ok((Creation::AlreadyExisted, detail)) => ExecutionResult::already_exists(action, detail),
        Err(error) => ExecutionResult::failed(action, error),
    }
}

async fn ensure_user<S: Session>(
    session: &S,
    auth_database: &str,
    username: &str,
    password: &Secret,
    roles: &BTreeSet<RoleGrant>,
) -> Result<(Creation, String), ProvisionError> {
    match session.find_user(auth_database, username).await? {
        None => {
            session
                .create_user(auth_database, username, password, roles)
                .await?;
            Ok((
                Creation::Created,
                format!("created user with roles [{}]", format_roles(roles)),
            ))
        }
        Some(existing) if existing == *roles => Ok((
            Creation::AlreadyExisted,
            "user exists with the declared roles".to_string(),
        )),
        Some(existing) => Err(ProvisionError::conflicting_definition(format!(
            "user exists with roles [{}] but [{}] are declared; roles left unchanged",
            format_roles(&existing),
            format_roles(roles)
        ))),
    }
}

async fn ensure_collection<S: Session>(
    session: &S,
    database: &str,
    name: &str,
) -> Result<(Creation, String), ProvisionError> {
    if session.collection_exists(database, name).await? {
        return Ok((Creation::AlreadyExisted, "collection exists".to_string()));
    }

    match session.create_collection(database, name).await? {
        Creation::Created => Ok((Creation::Created, "created empty collection".to_string())),
        Creation::AlreadyExisted => Ok((
            Creation::AlreadyExisted,
            "collection was created concurrently".to_string(),
        )),
    }
}

fn format_roles(roles: &BTreeSet<RoleGrant>) -> String {
    roles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
