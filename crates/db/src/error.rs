use dbseed_kernel::{ErrorKind, ProvisionError};
use mongodb::error::{Error, ErrorKind as DriverErrorKind};

const UNAUTHORIZED: i32 = 13;
const AUTHENTICATION_FAILED: i32 = 18;
pub(crate) const NAMESPACE_EXISTS: i32 = 48;
const USER_ALREADY_EXISTS: i32 = 51003;

/// Server error code of a failed command, if the error carries one.
pub(crate) fn command_code(error: &Error) -> Option<i32> {
    match error.kind.as_ref() {
        DriverErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn kind_for_code(code: i32) -> ErrorKind {
    match code {
        UNAUTHORIZED | AUTHENTICATION_FAILED => ErrorKind::PermissionDenied,
        USER_ALREADY_EXISTS => ErrorKind::ConflictingDefinition,
        _ => ErrorKind::Unknown,
    }
}

/// Map a driver error onto the kernel's error kinds.
pub(crate) fn classify(error: Error) -> ProvisionError {
    let kind = match error.kind.as_ref() {
        DriverErrorKind::Command(command) => kind_for_code(command.code),
        DriverErrorKind::Authentication { .. } => ErrorKind::PermissionDenied,
        DriverErrorKind::ServerSelection { .. }
        | DriverErrorKind::Io(_)
        | DriverErrorKind::DnsResolve { .. }
        | DriverErrorKind::ConnectionPoolCleared { .. } => ErrorKind::ConnectionFailed,
        _ => ErrorKind::Unknown,
    };
    ProvisionError::new(kind, error.to_string())
}
