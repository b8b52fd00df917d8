//! The regression lab: what a test scenario sees of the regress tree.
//!
//! A lab owns the variables of one test run, a console wired to the tree's
//! `bin/bconsole`, and runs the shell helpers found under `scripts/`.

use crate::core::console::{BConsole, ConsoleOptions};
use crate::core::vars::LabVars;
use crate::domain::model::{ConsoleOutput, Volume};
use crate::utils::error::{HarnessError, LabError, Result};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::Level;

pub type ShellOutput = ConsoleOutput;

pub const DEFAULT_FUNCTIONS: &str = "scripts/functions";

/// Printed by the regress helpers around a failure report.
pub const FAILURE_MARKER: &str = "!!!!!";

#[derive(Debug, Clone)]
pub struct LabOptions {
    pub testname: String,
    pub profile: String,
    pub regress_dir: PathBuf,
    /// Sourced before every shell helper, relative to `regress_dir`.
    pub functions: PathBuf,
    /// Console scripts `tee` their output instead of writing it silently.
    pub debug: bool,
    pub vars: BTreeMap<String, String>,
    pub console: ConsoleOptions,
}

impl LabOptions {
    pub fn new(testname: impl Into<String>, regress_dir: impl Into<PathBuf>) -> Self {
        Self {
            testname: testname.into(),
            profile: "default".to_string(),
            regress_dir: regress_dir.into(),
            functions: PathBuf::from(DEFAULT_FUNCTIONS),
            debug: false,
            vars: BTreeMap::new(),
            console: ConsoleOptions::default(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_console(mut self, console: ConsoleOptions) -> Self {
        self.console = console;
        self
    }
}

/// Why a verdict helper failed, if it did.
fn failure_details(cmd: &str, output: &ShellOutput) -> Option<String> {
    if output.exit_code != 0 {
        return Some(format!("`{}` exited with {}", cmd, output.exit_code));
    }
    output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .find(|line| line.contains(FAILURE_MARKER))
        .map(|line| format!("`{}` reported: {}", cmd, line.trim()))
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

pub struct Lab {
    testname: String,
    profile: String,
    functions: PathBuf,
    vars: LabVars,
    console: BConsole,
    started_at: DateTime<Local>,
}

impl Lab {
    pub fn new(options: LabOptions) -> Result<Self> {
        let LabOptions {
            testname,
            profile,
            regress_dir,
            functions,
            debug,
            vars,
            mut console,
        } = options;

        let vars = LabVars::for_regress_dir(&regress_dir, &testname, &profile, debug, &vars);

        // A lab always talks to the console built inside its own tree.
        if console.bin_path.is_none() {
            console.bin_path = Some(regress_dir.join("bin/bconsole"));
        }
        if console.conf_path.is_none() {
            console.conf_path = Some(regress_dir.join("bin/bconsole.conf"));
        }
        console.regress = true;
        let console = BConsole::new(console)?;

        let functions = if functions.is_absolute() {
            functions
        } else {
            regress_dir.join(functions)
        };

        Ok(Self {
            testname,
            profile,
            functions,
            vars,
            console,
            started_at: Local::now(),
        })
    }

    pub fn testname(&self) -> &str {
        &self.testname
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn vars(&self) -> &LabVars {
        &self.vars
    }

    pub fn console(&self) -> &BConsole {
        &self.console
    }

    /// Lab variable first, then the process environment.
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .map(str::to_string)
            .or_else(|| std::env::var(name).ok())
    }

    pub fn expand(&self, template: &str) -> Result<String> {
        Ok(self.vars.expand(template)?)
    }

    pub fn get_volume(&self, name: &str) -> Volume {
        Volume {
            name: name.to_string(),
            path: self.vars.tmp().join(name),
        }
    }

    /// Logs through `tracing` and appends to `tmp/<testname>.harness.log`.
    pub fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(test = %self.testname, "{}", message),
            Level::WARN => tracing::warn!(test = %self.testname, "{}", message),
            Level::INFO => tracing::info!(test = %self.testname, "{}", message),
            Level::DEBUG => tracing::debug!(test = %self.testname, "{}", message),
            Level::TRACE => tracing::trace!(test = %self.testname, "{}", message),
        }

        let tmp = self.vars.tmp();
        if !tmp.is_dir() {
            return;
        }
        let path = tmp.join(format!("{}.harness.log", self.testname));
        let line = format!(
            "{} {:<5} {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = written {
            tracing::debug!("Cannot append to {}: {}", path.display(), e);
        }
    }

    /// Runs `cmd` with `sh -c` in the regress directory, after sourcing the
    /// helper functions. A non-zero exit is logged, not raised: the helpers
    /// record failures in their own status files.
    pub async fn shell(&self, cmd: &str) -> Result<ShellOutput> {
        let script = if self.functions.is_file() {
            format!(". {}\n{}", shell_quote(&self.functions), cmd)
        } else {
            tracing::debug!("No helper functions at {}", self.functions.display());
            cmd.to_string()
        };

        tracing::info!(test = %self.testname, "$ {}", cmd);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .current_dir(self.vars.cwd())
            .envs(self.vars.iter())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| LabError::ShellSpawn {
                command: cmd.to_string(),
                source,
            })?;

        let output = ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        for line in output.stdout.lines() {
            tracing::debug!("> {}", line);
        }
        if output.exit_code != 0 {
            tracing::warn!(
                test = %self.testname,
                "`{}` exited with {}: {}",
                cmd,
                output.exit_code,
                output.stderr.trim_end()
            );
        }
        Ok(output)
    }

    pub async fn shell_out(&self, cmd: &str) -> Result<String> {
        Ok(self.shell(cmd).await?.stdout)
    }

    pub async fn start_bacula(&self) -> Result<ShellOutput> {
        self.shell("start_bacula").await
    }

    /// `copy-confs`, `start_test`, then the daemons.
    pub async fn start_test(&self) -> Result<()> {
        self.log(Level::INFO, &format!("starting {} (profile {})", self.testname, self.profile));
        self.shell("scripts/copy-confs").await?;
        self.shell("start_test").await?;
        self.start_bacula().await?;
        Ok(())
    }

    /// Like `shell`, but a non-zero exit or a failure marker in the output
    /// fails the scenario.
    pub async fn check(&self, cmd: &str) -> Result<ShellOutput> {
        let output = self.shell(cmd).await?;
        match failure_details(cmd, &output) {
            Some(details) => {
                self.log(Level::ERROR, &details);
                Err(LabError::ScenarioFailed {
                    scenario: self.testname.clone(),
                    details,
                }
                .into())
            }
            None => Ok(output),
        }
    }

    pub async fn end_test(&self) -> Result<()> {
        let verdict = self.check("end_test").await;
        let elapsed = Local::now() - self.started_at;
        self.log(
            Level::INFO,
            &format!("{} finished after {}s", self.testname, elapsed.num_seconds()),
        );
        verdict.map(|_| ())
    }

    /// Runs every check, then `end_test`, and reports all failed ones together.
    pub async fn finish(&self, checks: &[&str]) -> Result<()> {
        let mut verdicts = Vec::with_capacity(checks.len() + 1);
        for cmd in checks {
            verdicts.push(self.check(cmd).await.map(|_| ()));
        }
        verdicts.push(self.end_test().await);

        let mut failures = Vec::new();
        for verdict in verdicts {
            match verdict {
                Ok(()) => {}
                Err(HarnessError::Lab(LabError::ScenarioFailed { details, .. })) => {
                    failures.push(details)
                }
                Err(e) => return Err(e),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LabError::ScenarioFailed {
                scenario: self.testname.clone(),
                details: failures.join("; "),
            }
            .into())
        }
    }

    /// Expands the lab variables in `script` and pipes it to the console.
    pub async fn bconsole_script_out(&self, script: &str) -> Result<ConsoleOutput> {
        let script = self.expand(script)?;
        for line in script.lines() {
            tracing::debug!("< {}", line);
        }
        let output = self.console.raw_run(&[script.as_str()]).await?;
        if !output.is_success() {
            tracing::warn!(
                test = %self.testname,
                "bconsole exited with {}: {}",
                output.exit_code,
                output.stderr.trim_end()
            );
        }
        Ok(output)
    }

    pub async fn bconsole_script(&self, script: &str) -> Result<String> {
        Ok(self.bconsole_script_out(script).await?.stdout)
    }

    pub async fn write_file(&self, path: impl AsRef<Path>, contents: &str) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    pub async fn file_size(&self, path: impl AsRef<Path>) -> Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }
}
