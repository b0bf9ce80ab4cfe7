use crate::error::{CrabError, ErrorCode};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    /// Convert into a `CrabError` that names the command which could not run
    pub fn into_tool_error(self, command: &str) -> CrabError {
        let code = match &self {
            ProcessError::CommandNotFound(_) => ErrorCode::EXEC_COMMAND_NOT_FOUND,
            ProcessError::Timeout(_) => ErrorCode::EXEC_TIMEOUT,
            ProcessError::Io(_) => ErrorCode::EXEC_SPAWN_FAILED,
            ProcessError::MockExpectationNotMet(_) => ErrorCode::EXEC_GENERIC,
        };

        CrabError::external_tool(code, self.to_string(), command, None, "", "").with_source(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_tool_error() {
        let err = ProcessError::CommandNotFound("crab".to_string()).into_tool_error("crab status");
        assert_eq!(err.code(), ErrorCode::EXEC_COMMAND_NOT_FOUND);
        assert!(err.user_message().contains("crab status"));
    }

    #[test]
    fn test_timeout_maps_to_tool_error() {
        let err = ProcessError::Timeout(Duration::from_secs(5)).into_tool_error("hadd");
        assert_eq!(err.code(), ErrorCode::EXEC_TIMEOUT);
        assert_eq!(err.exit_code(), 5);
    }
}
