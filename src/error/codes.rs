/// Error code registry for crab-pilot
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration and parameter derivation errors
/// - 2000-2999: Status parsing errors
/// - 3000-3999: Local I/O and template errors
/// - 4000-4999: External tool errors
/// - 5000-5999: Spreadsheet errors
/// - 6000-6999: Output consolidation errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_INVALID_TOML: u16 = 1003;
    pub const CONFIG_INVALID_VALUE: u16 = 1004;
    pub const CONFIG_LOOKUP_FAILED: u16 = 1010;
    pub const CONFIG_MISSING_PARAMETER: u16 = 1011;
    pub const CONFIG_UNKNOWN_GENERATOR: u16 = 1012;

    // Status parsing errors (2000-2999)
    pub const PARSE_GENERIC: u16 = 2000;
    pub const PARSE_TASK_NAME: u16 = 2001;
    pub const PARSE_STATUS_OUTPUT: u16 = 2002;
    pub const PARSE_INVALID_JSON: u16 = 2003;

    // Local I/O errors (3000-3999)
    pub const IO_GENERIC: u16 = 3000;
    pub const IO_NOT_FOUND: u16 = 3001;
    pub const IO_PERMISSION_DENIED: u16 = 3002;
    pub const IO_ALREADY_EXISTS: u16 = 3003;
    pub const TEMPLATE_GENERIC: u16 = 3100;
    pub const TEMPLATE_MANIFEST_INVALID: u16 = 3101;

    // External tool errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_TIMEOUT: u16 = 4002;
    pub const EXEC_NONZERO_EXIT: u16 = 4003;
    pub const EXEC_MISSING_SUCCESS_MARKER: u16 = 4004;
    pub const EXEC_SIGNAL_RECEIVED: u16 = 4005;
    pub const EXEC_SPAWN_FAILED: u16 = 4006;
    pub const EXEC_HTTP_FAILED: u16 = 4010;

    // Spreadsheet errors (5000-5999)
    pub const SHEET_GENERIC: u16 = 5000;
    pub const SHEET_RATE_LIMITED: u16 = 5001;
    pub const SHEET_NOT_FOUND: u16 = 5002;

    // Consolidation errors (6000-6999)
    pub const GROUPING_GENERIC: u16 = 6000;
    pub const GROUPING_TOO_FEW_FILES: u16 = 6001;
    pub const GROUPING_CONVENTION_MISMATCH: u16 = 6002;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
    pub const OTHER_INTERRUPTED: u16 = 9001;
}

/// Describe an error code in plain words
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_INVALID_YAML => "Invalid YAML syntax",
        ErrorCode::CONFIG_INVALID_TOML => "Invalid TOML syntax",
        ErrorCode::CONFIG_INVALID_VALUE => "Invalid configuration value",
        ErrorCode::CONFIG_LOOKUP_FAILED => "Configuration lookup failed",
        ErrorCode::CONFIG_MISSING_PARAMETER => "Required parameter missing",
        ErrorCode::CONFIG_UNKNOWN_GENERATOR => "Unknown generator name",
        ErrorCode::PARSE_GENERIC => "General parse error",
        ErrorCode::PARSE_TASK_NAME => "Task name does not follow the naming convention",
        ErrorCode::PARSE_STATUS_OUTPUT => "Status output could not be parsed",
        ErrorCode::PARSE_INVALID_JSON => "Status output contained invalid JSON",
        ErrorCode::IO_GENERIC => "General I/O error",
        ErrorCode::IO_NOT_FOUND => "File or directory not found",
        ErrorCode::IO_PERMISSION_DENIED => "Permission denied",
        ErrorCode::IO_ALREADY_EXISTS => "File or directory already exists",
        ErrorCode::TEMPLATE_GENERIC => "Template error",
        ErrorCode::TEMPLATE_MANIFEST_INVALID => "Template manifest is invalid",
        ErrorCode::EXEC_GENERIC => "External tool error",
        ErrorCode::EXEC_COMMAND_NOT_FOUND => "External command not found",
        ErrorCode::EXEC_TIMEOUT => "External command timed out",
        ErrorCode::EXEC_NONZERO_EXIT => "External command exited with a failure code",
        ErrorCode::EXEC_MISSING_SUCCESS_MARKER => "External command output lacked a success marker",
        ErrorCode::EXEC_SIGNAL_RECEIVED => "External command terminated by signal",
        ErrorCode::EXEC_SPAWN_FAILED => "External command could not be started",
        ErrorCode::EXEC_HTTP_FAILED => "HTTP request failed",
        ErrorCode::SHEET_GENERIC => "Spreadsheet error",
        ErrorCode::SHEET_RATE_LIMITED => "Spreadsheet API rate limit reached",
        ErrorCode::SHEET_NOT_FOUND => "Spreadsheet entry not found",
        ErrorCode::GROUPING_GENERIC => "File grouping error",
        ErrorCode::GROUPING_TOO_FEW_FILES => "Too few files to group",
        ErrorCode::GROUPING_CONVENTION_MISMATCH => "File name does not follow the output convention",
        ErrorCode::OTHER_INTERRUPTED => "Interrupted by user",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_codes() {
        assert_eq!(
            describe_error_code(ErrorCode::CONFIG_MISSING_PARAMETER),
            "Required parameter missing"
        );
        assert_eq!(
            describe_error_code(ErrorCode::SHEET_RATE_LIMITED),
            "Spreadsheet API rate limit reached"
        );
    }

    #[test]
    fn test_describe_unknown_code() {
        assert_eq!(describe_error_code(4242), "Unknown error");
    }
}
