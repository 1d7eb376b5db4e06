//! The execution error taxonomy.
//!
//! Every failure mode a runner can produce boils down to one of these
//! variants. `biexec-service` is the only place that turns a variant into
//! an HTTP status code; everything below it only ever deals in kinds.

use std::fmt;

/// A failure raised while compiling or running user-authored source code.
#[derive(Debug, Clone)]
pub enum ExecutionError {
    /// Source failed to parse.
    CompileError(String),
    /// Required entry symbol missing, or a return value of the wrong shape.
    ContractViolation(String),
    /// User code tried to load a deny-listed module.
    ImportBlocked { module: String },
    /// User code called `open` or an equivalent stub.
    PermissionDenied(String),
    /// Wall-clock cap exceeded.
    Timeout { timeout_seconds: u64 },
    /// Any other exception raised by user code.
    RuntimeError(String),
}

impl ExecutionError {
    /// Short, stable kind string — used for logging and for the wire error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::CompileError(_) => "compile_error",
            ExecutionError::ContractViolation(_) => "contract_violation",
            ExecutionError::ImportBlocked { .. } => "import_blocked",
            ExecutionError::PermissionDenied(_) => "permission_denied",
            ExecutionError::Timeout { .. } => "timeout",
            ExecutionError::RuntimeError(_) => "runtime_error",
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::CompileError(msg) => write!(f, "compile error: {msg}"),
            ExecutionError::ContractViolation(msg) => write!(f, "contract violation: {msg}"),
            ExecutionError::ImportBlocked { module } => {
                write!(f, "import blocked: module '{module}' is not permitted")
            }
            ExecutionError::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            ExecutionError::Timeout { timeout_seconds } => {
                write!(f, "execution exceeded {timeout_seconds}s timeout")
            }
            ExecutionError::RuntimeError(msg) => write!(f, "runtime error: {msg}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_taxonomy() {
        assert_eq!(ExecutionError::CompileError("x".into()).kind(), "compile_error");
        assert_eq!(
            ExecutionError::ContractViolation("x".into()).kind(),
            "contract_violation"
        );
        assert_eq!(
            ExecutionError::ImportBlocked { module: "os".into() }.kind(),
            "import_blocked"
        );
        assert_eq!(ExecutionError::PermissionDenied("x".into()).kind(), "permission_denied");
        assert_eq!(ExecutionError::Timeout { timeout_seconds: 1 }.kind(), "timeout");
        assert_eq!(ExecutionError::RuntimeError("x".into()).kind(), "runtime_error");
    }

    #[test]
    fn import_blocked_display_names_the_module() {
        let err = ExecutionError::ImportBlocked { module: "os".into() };
        assert!(err.to_string().contains("os"));
    }
}
