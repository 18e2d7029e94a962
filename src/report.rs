use std::fmt::Write as _;
use std::process::ExitCode;

use anyhow::Context;
use dbseed_kernel::{RunReport, Status};

/// Process exit status of a bootstrap invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    /// At least one action failed.
    ActionFailed = 1,
    ConnectionFailed = 2,
    /// The spec or configuration could not be loaded.
    InvalidInput = 3,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

/// Decide the exit status; `allow_partial_failure` turns failed actions
/// into a zero exit but never hides a connection failure.
pub fn exit_code(report: &RunReport, allow_partial_failure: bool) -> ExitStatus {
    match report {
        RunReport::ConnectionFailed { .. } => ExitStatus::ConnectionFailed,
        RunReport::Completed { .. } if report.is_success() || allow_partial_failure => {
            ExitStatus::Success
        }
        RunReport::Completed { .. } => ExitStatus::ActionFailed,
    }
}

fn marker(status: &Status) -> &'static str {
    match status {
        Status::Success | Status::AlreadyExists => "ok",
        Status::Failed(_) => "FAIL",
        Status::Skipped => "skip",
    }
}

/// One line per action, then a summary line.
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    match report {
        RunReport::ConnectionFailed { detail } => {
            let _ = writeln!(out, "[FAIL] connection_failed: {detail}");
        }
        RunReport::Completed { results } => {
            for result in results {
                let _ = writeln!(
                    out,
                    "[{}] {}: {} ({})",
                    marker(&result.status),
                    result.action,
                    result.status,
                    result.detail
                );
            }
            let _ = writeln!(
                out,
                "{} action(s), {} failed",
                results.len(),
                report.failed_count()
            );
        }
    }
    out
}

pub fn render_json(report: &RunReport) -> anyhow::Result<String> {
    serde_json::to_string_pretty(report).with_context(|| "failed to serialize run report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbseed_kernel::{Action, ExecutionResult, ProvisionError};

    fn completed(results: Vec<ExecutionResult>) -> RunReport {
        RunReport::Completed { results }
    }

    fn user() -> Action {
        Action::ensure_user("appuser", "apppassword", [])
    }

    #[test]
    fn exit_status_reflects_failures() {
        let ok = completed(vec![ExecutionResult::already_exists(user(), "present")]);
        let failed = completed(vec![ExecutionResult::failed(
            user(),
            ProvisionError::permission_denied("nope"),
        )]);
        let unreachable = RunReport::ConnectionFailed {
            detail: "refused".to_string(),
        };

        assert_eq!(exit_code(&ok, false), ExitStatus::Success);
        assert_eq!(exit_code(&failed, false), ExitStatus::ActionFailed);
        assert_eq!(exit_code(&failed, true), ExitStatus::Success);
        assert_eq!(exit_code(&unreachable, true), ExitStatus::ConnectionFailed);
    }

    #[test]
    fn text_report_lists_each_action() {
        let report = completed(vec![
            ExecutionResult::success(user(), "created"),
            ExecutionResult::failed(
                Action::ensure_collection("mydatabase", "test"),
                ProvisionError::permission_denied("not authorized"),
            ),
        ]);

        let text = render_text(&report);

        assert!(text.contains("[ok] ensure_user appuser@admin: success (created)"));
        assert!(text.contains(
            "[FAIL] ensure_collection mydatabase.test: failed(permission_denied) (not authorized)"
        ));
        assert!(text.contains("2 action(s), 1 failed"));
    }

    #[test]
    fn json_report_never_contains_passwords() {
        let report = completed(vec![ExecutionResult::success(user(), "created")]);
        let json = render_json(&report).unwrap();

        assert!(json.contains("\"outcome\": \"completed\""));
        assert!(!json.contains("apppassword"));
    }
}
