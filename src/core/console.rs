//! Process wrapper around the `bconsole` client.
//!
//! Every call spawns a fresh console, writes a newline separated script to
//! its stdin and collects what it printed. There is no session state kept
//! between calls.

use crate::core::reply;
use crate::domain::model::{BvfsEntry, ConsoleOutput, JobSummary, Platform, RestoreProgress};
use crate::domain::ports::ConsoleSettings;
use crate::utils::error::{ConsoleError, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

const WINDOWS_BIN_PATHS: &[&str] = &[r"C:\Program Files\Bacula\bconsole.exe", r".\bconsole.exe"];
const WINDOWS_CONF_PATHS: &[&str] = &[r"C:\Program Files\Bacula\bconsole.conf", r".\bconsole.conf"];
const REGRESS_BIN_PATHS: &[&str] = &["bin/bconsole"];
const REGRESS_CONF_PATHS: &[&str] = &["bin/bconsole.conf"];
const SYSTEM_BIN_PATHS: &[&str] = &[
    "/usr/bin/bconsole",
    "/usr/local/bin/bconsole",
    "/opt/bacula/bin/bconsole",
    "./bconsole",
];
const SYSTEM_CONF_PATHS: &[&str] = &[
    "/etc/bacula/bconsole.conf",
    "/opt/bacula/etc/bconsole.conf",
    "./bconsole.conf",
];

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct ConsoleOptions {
    pub bin_path: Option<PathBuf>,
    pub conf_path: Option<PathBuf>,
    /// Passed as `-D <director>` when set.
    pub director: Option<String>,
    /// Prefix for the command line, e.g. `sudo`.
    pub launcher: Vec<String>,
    /// Force the `bin/bconsole` layout of a regress tree.
    pub regress: bool,
    /// Defaults to the platform the harness runs on.
    pub platform: Option<Platform>,
    /// Echo the console output to our stdout while it runs.
    pub verbose: bool,
}

impl ConsoleOptions {
    pub fn from_settings(settings: &dyn ConsoleSettings) -> Self {
        Self {
            bin_path: settings.bin_path().map(PathBuf::from),
            conf_path: settings.conf_path().map(PathBuf::from),
            director: settings.director().map(str::to_string),
            launcher: settings.launcher().to_vec(),
            regress: settings.regress(),
            platform: None,
            verbose: false,
        }
    }
}

/// Options for `restore client=.. restoreclient=.. restorejob=.. yes ...`.
#[derive(Debug, Clone, Default)]
pub struct RestoreRequest {
    pub client: String,
    pub restore_client: String,
    pub restore_job: String,
    pub options: Vec<(String, Option<String>)>,
    /// Extra line sent after the restore command, e.g. an answer to a prompt.
    pub input: Option<String>,
}

impl RestoreRequest {
    pub fn new(
        client: impl Into<String>,
        restore_client: impl Into<String>,
        restore_job: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            restore_client: restore_client.into(),
            restore_job: restore_job.into(),
            ..Default::default()
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), Some(value.into())));
        self
    }

    pub fn flag(mut self, key: impl Into<String>) -> Self {
        self.options.push((key.into(), None));
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    fn command(&self) -> String {
        format!(
            "restore client={} restoreclient={} restorejob={} yes {}",
            self.client,
            self.restore_client,
            self.restore_job,
            reply::render_options(&self.options)
        )
    }
}

#[derive(Debug, Clone)]
pub struct BConsole {
    bin_path: PathBuf,
    conf_path: PathBuf,
    director: Option<String>,
    launcher: Vec<String>,
    platform: Platform,
    verbose: bool,
}

/// True when the current directory looks like a configured regress tree.
pub fn is_regress_tree() -> bool {
    env::var_os("BACULA_SOURCE").is_some()
        && env::var_os("BASEPORT").is_some()
        && Path::new("bin/bconsole").is_file()
        && Path::new("bin/bconsole.conf").is_file()
}

fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

fn candidates_for(platform: Platform, regress: bool) -> (&'static [&'static str], &'static [&'static str]) {
    match platform {
        Platform::Windows => (WINDOWS_BIN_PATHS, WINDOWS_CONF_PATHS),
        Platform::Unix if regress || is_regress_tree() => (REGRESS_BIN_PATHS, REGRESS_CONF_PATHS),
        Platform::Unix => (SYSTEM_BIN_PATHS, SYSTEM_CONF_PATHS),
    }
}

fn to_strings(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

async fn drain<R>(mut reader: R, verbose: bool) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut echo = tokio::io::stdout();
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if verbose {
            echo.write_all(&chunk[..n]).await?;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    if verbose {
        echo.flush().await?;
    }
    Ok(buffer)
}

async fn join_reader(
    handle: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> std::io::Result<String> {
    let bytes = handle.await.map_err(std::io::Error::other)??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl BConsole {
    pub fn new(options: ConsoleOptions) -> std::result::Result<Self, ConsoleError> {
        let platform = options.platform.unwrap_or_else(Platform::current);
        let (bin_candidates, conf_candidates) = candidates_for(platform, options.regress);

        let bin_path = match options.bin_path {
            Some(path) => path,
            None => first_existing(bin_candidates).ok_or_else(|| ConsoleError::NotFound {
                what: "bconsole executable".to_string(),
                candidates: to_strings(bin_candidates),
            })?,
        };
        let conf_path = match options.conf_path {
            Some(path) => path,
            None => first_existing(conf_candidates).ok_or_else(|| ConsoleError::NotFound {
                what: "bconsole configuration file".to_string(),
                candidates: to_strings(conf_candidates),
            })?,
        };

        let console = Self {
            bin_path,
            conf_path,
            director: options.director,
            launcher: options.launcher,
            platform,
            verbose: options.verbose,
        };
        tracing::debug!("bconsole initialized: {:?}", console.command_line());
        Ok(console)
    }

    pub fn bin_path(&self) -> &Path {
        &self.bin_path
    }

    pub fn conf_path(&self) -> &Path {
        &self.conf_path
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// `[launcher..] bin -n -c conf [-D director]`
    pub fn command_line(&self) -> Vec<String> {
        let mut line = self.launcher.clone();
        line.push(self.bin_path.display().to_string());
        line.push("-n".to_string());
        line.push("-c".to_string());
        line.push(self.conf_path.display().to_string());
        if let Some(director) = &self.director {
            line.push("-D".to_string());
            line.push(director.clone());
        }
        line
    }

    fn command(program: &str, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn spawn_collect(&self, args: &[String], script: &str) -> std::io::Result<ConsoleOutput> {
        let Some((program, rest)) = args.split_first() else {
            return Err(std::io::Error::other("empty bconsole command line"));
        };
        let mut child = Self::command(program, rest).spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr was not captured"))?;

        // Both pipes must be drained while we write, or a chatty console
        // blocks on a full pipe before it has read all of its input.
        let out_reader = tokio::spawn(drain(stdout, self.verbose));
        let err_reader = tokio::spawn(drain(stderr, self.verbose));

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(script.as_bytes()).await {
                Ok(()) => {}
                // the console may quit before reading everything
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("bconsole closed its stdin early");
                }
                Err(e) => return Err(e),
            }
        }

        let status = child.wait().await?;
        let stdout = join_reader(out_reader).await?;
        let stderr = join_reader(err_reader).await?;

        Ok(ConsoleOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }

    /// Sends `cmds` joined by newlines and returns whatever came back.
    /// The exit status is reported, never raised.
    pub async fn raw_run<S: AsRef<str>>(&self, cmds: &[S]) -> Result<ConsoleOutput> {
        let script = cmds.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");
        let output = self
            .spawn_collect(&self.command_line(), &script)
            .await
            .map_err(ConsoleError::Io)?;
        Ok(output)
    }

    /// Like `raw_run`, but a non-zero exit code or anything on stderr is an error.
    pub async fn checked_run<S: AsRef<str>>(&self, cmds: &[S]) -> Result<ConsoleOutput> {
        tracing::debug!("running bconsole command:");
        for cmd in cmds {
            tracing::debug!("< {}", cmd.as_ref());
        }

        let output = self.raw_run(cmds).await?;

        for line in output.stderr.lines() {
            tracing::debug!("ERR > {}", line);
        }
        for line in output.stdout.lines() {
            tracing::debug!("> {}", line);
        }
        if output.exit_code != 0 {
            tracing::debug!("bconsole exit_code={}", output.exit_code);
        }

        if !output.is_success() {
            return Err(ConsoleError::Failed {
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }
            .into());
        }
        Ok(output)
    }

    /// Runs a single command and returns its reply without banner or echo.
    pub async fn simple_run(&self, cmd: &str, input: Option<&str>) -> Result<Vec<String>> {
        // "gui on" silences the "You have messages" alerts; the trailing empty
        // command keeps the Unix echo from merging with the answer.
        let mut cmds = vec!["gui on", cmd];
        if let Some(input) = input {
            cmds.push(input);
        }
        cmds.push("");

        let output = self.checked_run(&cmds).await?;
        Ok(reply::normalize_reply(&output.stdout, self.platform)?)
    }

    async fn field(&self, cmd: &str, index: usize) -> Result<String> {
        let out = self.simple_run(cmd, None).await?;
        out.get(index).cloned().ok_or_else(|| {
            ConsoleError::MissingField {
                command: cmd.to_string(),
                index,
            }
            .into()
        })
    }

    pub async fn greeting_banner(&self) -> Result<String> {
        let output = self.checked_run(&["gui on", "q", ""]).await?;
        reply::greeting_line(&output.stdout).ok_or_else(|| {
            ConsoleError::UnexpectedReply {
                reason: "no greeting line".to_string(),
                reply: output.stdout.clone(),
            }
            .into()
        })
    }

    pub async fn list_clients(&self, sort: bool) -> Result<Vec<String>> {
        let mut clients = self.simple_run(".clients", None).await?;
        if sort {
            clients.sort();
        }
        Ok(clients)
    }

    /// Terminated backups of `client_name`, newest first.
    pub async fn list_jobs_for_one_client(&self, client_name: &str) -> Result<Vec<JobSummary>> {
        let sql = format!(
            "SELECT JobId, StartTime, Level, Job.Name \
             FROM Job JOIN Client USING (ClientId) \
             WHERE Client.Name = '{}' \
             AND Job.Type = 'B' AND Job.JobStatus IN ('T', 'W') \
             ORDER By JobTDate DESC",
            client_name
        );
        let out = self.simple_run(&format!(".sql query=\"{};\"", sql), None).await?;
        Ok(reply::parse_job_summaries(&out)?)
    }

    pub async fn job_dependencies(&self, jobid: &str) -> Result<String> {
        self.field(&format!(".bvfs_get_jobids jobid={}", jobid), 1).await
    }

    pub async fn bvfs_update(&self, jobids: &str) -> Result<()> {
        self.simple_run(&format!(".bvfs_update jobid={}", jobids), None)
            .await?;
        Ok(())
    }

    fn bvfs_command(verb: &str, jobids: &str, path: Option<&str>, pathid: Option<&str>) -> String {
        let mut cmd = format!("{} jobid={}", verb, jobids);
        if let Some(path) = path {
            cmd.push_str(" path=");
            cmd.push_str(path);
        }
        if let Some(pathid) = pathid {
            cmd.push_str(" pathid=");
            cmd.push_str(pathid);
        }
        cmd
    }

    pub async fn bvfs_lsdirs(
        &self,
        jobids: &str,
        path: Option<&str>,
        pathid: Option<&str>,
    ) -> Result<Vec<BvfsEntry>> {
        let cmd = Self::bvfs_command(".bvfs_lsdirs", jobids, path, pathid);
        let out = self.simple_run(&cmd, None).await?;
        Ok(reply::parse_bvfs_dirs(&out)?)
    }

    pub async fn bvfs_lsfiles(
        &self,
        jobids: &str,
        path: Option<&str>,
        pathid: Option<&str>,
    ) -> Result<Vec<BvfsEntry>> {
        let cmd = Self::bvfs_command(".bvfs_lsfiles", jobids, path, pathid);
        let out = self.simple_run(&cmd, None).await?;
        Ok(reply::parse_bvfs_files(&out)?)
    }

    /// Follows `components` down the bvfs tree and returns the PathId of the
    /// last one. Starts from the root listing unless `pathid` is given.
    pub async fn bvfs_walk_path(
        &self,
        jobids: &str,
        components: &[&str],
        pathid: Option<&str>,
        case_insensitive: bool,
    ) -> Result<Option<String>> {
        if components.is_empty() {
            return Ok(None);
        }

        let fold = |s: &str| {
            if case_insensitive {
                s.to_uppercase()
            } else {
                s.to_string()
            }
        };

        let mut current = pathid.map(str::to_string);
        for component in components {
            let dirs = match &current {
                None => self.bvfs_lsdirs(jobids, Some(""), None).await?,
                Some(id) => self.bvfs_lsdirs(jobids, None, Some(id)).await?,
            };

            let mut wanted = fold(component);
            if !wanted.ends_with('/') {
                wanted.push('/');
            }

            match dirs.into_iter().find(|dir| fold(&dir.name) == wanted) {
                Some(dir) => current = Some(dir.id),
                None => return Ok(None),
            }
        }
        Ok(current)
    }

    /// Returns the queued JobId, or `None` when the console did not start a job.
    pub async fn restore(&self, request: &RestoreRequest) -> Result<Option<String>> {
        let out = self
            .simple_run(&request.command(), request.input.as_deref())
            .await?;
        Ok(reply::extract_queued_job_id(&out))
    }

    /// Restore jobs whose definition carries no RunScript.
    pub async fn search_simple_restore_jobs(&self) -> Result<Vec<String>> {
        let restore_jobs = self.simple_run(".jobs type=R", None).await?;
        let mut simple = Vec::new();
        for job in restore_jobs {
            let description = self.simple_run(&format!("show job={}", job), None).await?;
            if !reply::has_runscript(&description) {
                simple.push(job);
            }
        }
        Ok(simple)
    }

    pub async fn status_restore_job(&self, client_name: &str) -> Result<Option<RestoreProgress>> {
        let out = self
            .simple_run(&format!("status client={}", client_name), None)
            .await?;
        Ok(reply::parse_restore_progress(&out))
    }

    /// Director names known to the console configuration (`bconsole -l`).
    pub async fn list_directors(&self) -> Result<Vec<String>> {
        let mut args = self.launcher.clone();
        args.push(self.bin_path.display().to_string());
        args.push("-c".to_string());
        args.push(self.conf_path.display().to_string());
        args.push("-l".to_string());

        let output = self
            .spawn_collect(&args, "")
            .await
            .map_err(ConsoleError::Io)?;
        if output.exit_code != 0 {
            return Err(ConsoleError::Failed {
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }
            .into());
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
