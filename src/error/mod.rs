use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for crab-pilot
///
/// Variants follow the failure taxonomy of the pipeline: parameter derivation
/// (`ConfigLookup`, `MissingParameter`), status handling (`Parse`), external
/// tools (`ExternalTool`, `RateLimit`) and output consolidation
/// (`FileGrouping`).
#[derive(Error, Debug)]
pub enum CrabError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Configuration lookup failed: {message}")]
    ConfigLookup {
        code: u16,
        message: String,
        /// Keys walked before the lookup failed, outermost first
        lookup_path: Vec<String>,
    },

    #[error("[E{code:04}] Generator '{generator}' is missing required parameters: {}", .missing.join(", "))]
    MissingParameter {
        code: u16,
        generator: String,
        missing: Vec<String>,
    },

    #[error("[E{code:04}] Parse error: {message}")]
    Parse {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] External tool failed: {message}")]
    ExternalTool {
        code: u16,
        message: String,
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Rate limited: {message}")]
    RateLimit { code: u16, message: String },

    #[error("[E{code:04}] File grouping error: {message}")]
    FileGrouping {
        code: u16,
        message: String,
        file: Option<String>,
    },

    #[error("[E{code:04}] Template error: {message}")]
    Template {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] I/O error: {message}")]
    Io {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Interrupted by user")]
    Interrupted { code: u16 },
}

impl CrabError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a lookup error for a nested configuration key path
    pub fn config_lookup<I, S>(message: impl Into<String>, lookup_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ConfigLookup {
            code: ErrorCode::CONFIG_LOOKUP_FAILED,
            message: message.into(),
            lookup_path: lookup_path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn missing_parameter(generator: impl Into<String>, missing: Vec<String>) -> Self {
        Self::MissingParameter {
            code: ErrorCode::CONFIG_MISSING_PARAMETER,
            generator: generator.into(),
            missing,
        }
    }

    /// Create a parse error with default code
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            code: ErrorCode::PARSE_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    pub fn parse_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create an external tool error carrying the full command context
    pub fn external_tool(
        code: u16,
        message: impl Into<String>,
        command: impl Into<String>,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            code,
            message: message.into(),
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            source: None,
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            code: ErrorCode::SHEET_RATE_LIMITED,
            message: message.into(),
        }
    }

    pub fn file_grouping(code: u16, message: impl Into<String>, file: Option<String>) -> Self {
        Self::FileGrouping {
            code,
            message: message.into(),
            file,
        }
    }

    pub fn template(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Template {
            code: ErrorCode::TEMPLATE_GENERIC,
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn io(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Io {
            code: ErrorCode::IO_GENERIC,
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn interrupted() -> Self {
        Self::Interrupted {
            code: ErrorCode::OTHER_INTERRUPTED,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Parse { source: src, .. }
            | Self::ExternalTool { source: src, .. }
            | Self::Template { source: src, .. }
            | Self::Io { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::ConfigLookup { .. }
            | Self::MissingParameter { .. }
            | Self::RateLimit { .. }
            | Self::FileGrouping { .. }
            | Self::Interrupted { .. } => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::ConfigLookup { message, .. }
            | Self::Parse { message, .. }
            | Self::ExternalTool { message, .. }
            | Self::RateLimit { message, .. }
            | Self::FileGrouping { message, .. }
            | Self::Template { message, .. }
            | Self::Io { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::MissingParameter { .. } | Self::Interrupted { .. } => {}
        }
        self
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::ConfigLookup { .. } | Self::MissingParameter { .. } => 2,
            Self::ExternalTool { .. } => 5,
            Self::Interrupted { .. } => 130,
            Self::Parse { .. }
            | Self::RateLimit { .. }
            | Self::FileGrouping { .. }
            | Self::Template { .. }
            | Self::Io { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::ConfigLookup { code, .. }
            | Self::MissingParameter { code, .. }
            | Self::Parse { code, .. }
            | Self::ExternalTool { code, .. }
            | Self::RateLimit { code, .. }
            | Self::FileGrouping { code, .. }
            | Self::Template { code, .. }
            | Self::Io { code, .. }
            | Self::Interrupted { code } => *code,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::ConfigLookup {
                message,
                lookup_path,
                ..
            } => {
                if lookup_path.is_empty() {
                    format!("Lookup failed: {}", message)
                } else {
                    format!("Lookup of '{}' failed: {}", lookup_path.join("."), message)
                }
            }
            Self::MissingParameter {
                generator, missing, ..
            } => format!(
                "Generator '{}' needs {} but the job entry does not provide it",
                generator,
                missing.join(", ")
            ),
            Self::Parse { message, .. } => format!("Could not parse: {}", message),
            Self::ExternalTool {
                message,
                command,
                exit_code,
                ..
            } => match exit_code {
                Some(code) => format!("Command '{}' failed with exit code {}: {}", command, code, message),
                None => format!("Command '{}' failed: {}", command, message),
            },
            Self::RateLimit { message, .. } => format!("Rate limit reached: {}", message),
            Self::FileGrouping { message, file, .. } => match file {
                Some(f) => format!("Cannot group '{}': {}", f, message),
                None => format!("Cannot group files: {}", message),
            },
            Self::Template { message, path, .. } => match path {
                Some(p) => format!("Template {}: {}", p.display(), message),
                None => format!("Template error: {}", message),
            },
            Self::Io { message, path, .. } => match path {
                Some(p) => format!("I/O error at {}: {}", p.display(), message),
                None => format!("I/O error: {}", message),
            },
            Self::Interrupted { .. } => "Interrupted by user".to_string(),
        }
    }

    /// Get a developer-friendly error message with full chain
    pub fn developer_message(&self) -> String {
        use std::error::Error as _;

        let mut msg = self.to_string();
        if let Self::ExternalTool { stdout, stderr, .. } = self {
            msg.push_str(&format!(
                "\n----- stdout -----\n{}\n----- stderr -----\n{}",
                stdout.trim(),
                stderr.trim()
            ));
        }
        let mut source = self.source();
        while let Some(cause) = source {
            msg.push_str(&format!("\ncaused by: {}", cause));
            source = cause.source();
        }
        msg
    }

    /// Whether this error is scoped to a single job entry or task
    ///
    /// Unit-scoped errors are logged and the unit skipped; siblings continue.
    pub fn is_unit_scoped(&self) -> bool {
        !matches!(self, Self::Interrupted { .. } | Self::Config { .. })
    }
}

/// Type alias for Results using CrabError
pub type Result<T> = std::result::Result<T, CrabError>;

/// Type alias for application Results (using anyhow for flexibility)
pub type AppResult<T> = anyhow::Result<T>;

impl From<std::io::Error> for CrabError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, message) = match err.kind() {
            ErrorKind::NotFound => (ErrorCode::IO_NOT_FOUND, "File or directory not found"),
            ErrorKind::PermissionDenied => (ErrorCode::IO_PERMISSION_DENIED, "Permission denied"),
            ErrorKind::AlreadyExists => (ErrorCode::IO_ALREADY_EXISTS, "Already exists"),
            _ => (ErrorCode::IO_GENERIC, "I/O operation failed"),
        };

        CrabError::Io {
            code,
            message: message.to_string(),
            path: None,
            source: None,
        }
        .with_source(err)
    }
}

impl From<serde_yaml::Error> for CrabError {
    fn from(err: serde_yaml::Error) -> Self {
        CrabError::config_with_code(ErrorCode::CONFIG_INVALID_YAML, "Invalid YAML syntax")
            .with_source(err)
    }
}

impl From<toml::de::Error> for CrabError {
    fn from(err: toml::de::Error) -> Self {
        CrabError::config_with_code(ErrorCode::CONFIG_INVALID_TOML, "Invalid TOML syntax")
            .with_source(err)
    }
}

impl From<serde_json::Error> for CrabError {
    fn from(err: serde_json::Error) -> Self {
        CrabError::parse_with_code(ErrorCode::PARSE_INVALID_JSON, "Invalid JSON").with_source(err)
    }
}
