use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What one bconsole invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ConsoleOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.stderr.is_empty()
    }
}

/// A terminated backup job, as returned by the catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub start_time: String,
    pub level: String,
    pub name: String,
}

/// A `(PathId, name)` or `(FileId, name)` pair from the bvfs listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BvfsEntry {
    pub id: String,
    pub name: String,
}

impl BvfsEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Counters are kept as printed (`46,507`), the console groups thousands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreProgress {
    pub restored: String,
    pub expected: String,
    pub completed: String,
}

impl Default for RestoreProgress {
    fn default() -> Self {
        Self {
            restored: "0".to_string(),
            expected: "0".to_string(),
            completed: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub path: PathBuf,
}

/// Which flavour of console output to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Commands are echoed back line by line.
    Unix,
    /// Each command is acknowledged with a `*` prompt instead of an echo.
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub duration: Duration,
    pub outcome: ScenarioOutcome,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }
}
