use thiserror::Error;

/// Failures talking to the console binary.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("bconsole error (exit code {exit_code})")]
    Failed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("{what} not found, tried: {}", candidates.join(", "))]
    NotFound {
        what: String,
        candidates: Vec<String>,
    },

    #[error("unexpected bconsole reply: {reason}")]
    UnexpectedReply { reason: String, reply: String },

    #[error("reply to `{command}` has no field at index {index}")]
    MissingField { command: String, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures in the regression lab itself (variables, helper scripts).
#[derive(Error, Debug)]
pub enum LabError {
    #[error("unknown lab variable: {name}")]
    UnknownVar { name: String },

    #[error("unbalanced brace in template at byte {position}")]
    BadTemplate { position: usize },

    #[error("shell helper `{command}` could not be started: {source}")]
    ShellSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown scenario: {name}")]
    UnknownScenario { name: String },

    #[error("scenario `{scenario}` failed: {details}")]
    ScenarioFailed { scenario: String, details: String },
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Lab(#[from] LabError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TSV parsing error: {0}")]
    TsvError(#[from] csv::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Console,
    Lab,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HarnessError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HarnessError::Console(_) => ErrorCategory::Console,
            HarnessError::Lab(_) => ErrorCategory::Lab,
            HarnessError::ConfigValidationError { .. }
            | HarnessError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            HarnessError::IoError(_)
            | HarnessError::SerializationError(_)
            | HarnessError::TsvError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HarnessError::Console(ConsoleError::UnexpectedReply { .. })
            | HarnessError::Console(ConsoleError::MissingField { .. })
            | HarnessError::TsvError(_) => ErrorSeverity::Medium,
            HarnessError::Console(ConsoleError::Failed { .. })
            | HarnessError::Lab(_)
            | HarnessError::ConfigValidationError { .. }
            | HarnessError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            HarnessError::Console(ConsoleError::NotFound { .. })
            | HarnessError::Console(ConsoleError::Io(_))
            | HarnessError::IoError(_)
            | HarnessError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            HarnessError::Console(ConsoleError::Failed { exit_code, stderr, .. }) => {
                let first = stderr.lines().next().unwrap_or("no stderr output");
                format!("bconsole exited with code {}: {}", exit_code, first)
            }
            HarnessError::Console(ConsoleError::NotFound { what, .. }) => {
                format!("Could not locate the {}", what)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            HarnessError::Console(ConsoleError::NotFound { .. }) => {
                "Pass --bin-path/--conf-path or set [console] in the config file"
            }
            HarnessError::Console(ConsoleError::Failed { .. }) => {
                "Check that the director is running and bconsole.conf is readable"
            }
            HarnessError::Console(_) | HarnessError::TsvError(_) => {
                "Run with --verbose to see the raw bconsole reply"
            }
            HarnessError::Lab(LabError::UnknownVar { .. }) => {
                "Define the variable under [vars] in the config file"
            }
            HarnessError::Lab(LabError::UnknownScenario { .. }) => {
                "Use `bregress scenarios` to list the available scenarios"
            }
            HarnessError::Lab(_) => "Inspect tmp/log1.out and tmp/log2.out in the regress directory",
            HarnessError::ConfigValidationError { .. }
            | HarnessError::InvalidConfigValueError { .. } => "Fix the configuration file and retry",
            HarnessError::IoError(_) | HarnessError::SerializationError(_) => {
                "Check file permissions and free disk space"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
