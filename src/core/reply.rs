//! Scraping helpers for bconsole replies.
//!
//! Everything here is pure: the functions take the text the console printed
//! and return structured values, so they can be exercised without a director.

use crate::domain::model::{BvfsEntry, JobSummary, Platform, RestoreProgress};
use crate::utils::error::ConsoleError;
use regex::Regex;
use std::sync::LazyLock;

/// `Connecting to Director ..`, `1000 OK: ..`, `Enter a period to cancel a command.`
pub const BANNER_LINES: usize = 3;

/// `gui on` plus the command itself.
pub const ECHOED_LINES: usize = 2;

static JOB_QUEUED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Job queued\. JobId=(\d+)").expect("valid regex"));

static RESTORE_PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Files: Restored=([.,0-9]+) Expected=([.,0-9]+) Completed=(\d+)")
        .expect("valid regex")
});

static RUNSCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--> RunScript").expect("valid regex"));

/// Strips the connection banner and the per-platform echo from a reply.
///
/// A Unix console echoes every command it reads, a Windows one prints a
/// `*` prompt per command instead. With the `gui on` / command / empty
/// line script sent by `simple_run`, that gives:
///
/// ```text
/// Unix                      Windows
/// Connecting to ..          Connecting to ..
/// 1000 OK: ..               1000 OK: ..
/// Enter a period ..         Enter a period ..
/// gui on                    **client1-fd
/// .clients                  client2-fd
/// client1-fd                *
/// client2-fd
/// ```
pub fn normalize_reply(raw: &str, platform: Platform) -> Result<Vec<String>, ConsoleError> {
    let mut lines: Vec<String> = raw
        .lines()
        .skip(BANNER_LINES)
        .map(str::to_string)
        .collect();

    match platform {
        Platform::Unix => {
            let echoed = ECHOED_LINES.min(lines.len());
            lines.drain(..echoed);
        }
        Platform::Windows => {
            match lines.first_mut() {
                Some(first) if first.starts_with("**") => {
                    first.drain(..2);
                }
                _ => {
                    return Err(ConsoleError::UnexpectedReply {
                        reason: format!(
                            "expected `**` after the {} connection lines",
                            BANNER_LINES
                        ),
                        reply: raw.to_string(),
                    });
                }
            }
            if lines.last().map(String::as_str) == Some("*") {
                lines.pop();
            } else if let Some(last) = lines.last_mut() {
                // SQL replies leave the prompt glued to the last row
                if last.ends_with('*') {
                    last.pop();
                }
            }
        }
    }

    Ok(lines)
}

/// Second line of the raw greeting, e.g. `1000 OK: 1 zbacula-dir Version: 13.0.1 (05 August 2022)`.
pub fn greeting_line(raw: &str) -> Option<String> {
    raw.lines().nth(1).map(str::to_string)
}

/// Splits tab separated rows. Rows keep every column, including the empty
/// one produced by a trailing tab.
pub fn split_tsv_rows(lines: &[String]) -> Result<Vec<Vec<String>>, csv::Error> {
    let body: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|line| !line.is_empty())
        .collect();
    let joined = body.join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(joined.as_bytes());

    let mut rows = Vec::with_capacity(body.len());
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Parses the `.sql` reply of the per-client job query.
///
/// Line 0 is `Using Catalog "..."`. The remaining rows carry
/// `JobId, StartTime, Level, Name` followed by a trailing tab; the fields
/// are regrouped by four.
pub fn parse_job_summaries(lines: &[String]) -> Result<Vec<JobSummary>, csv::Error> {
    if lines.len() <= 1 {
        return Ok(Vec::new());
    }

    let mut fields = Vec::new();
    for mut row in split_tsv_rows(&lines[1..])? {
        if row.last().is_some_and(|f| f.is_empty()) {
            row.pop();
        }
        fields.extend(row);
    }

    let chunks = fields.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        tracing::warn!(
            "Dropping incomplete job row: {:?}",
            chunks.remainder()
        );
    }

    Ok(chunks
        .map(|c| JobSummary {
            job_id: c[0].clone(),
            start_time: c[1].clone(),
            level: c[2].clone(),
            name: c[3].clone(),
        })
        .collect())
}

fn parse_bvfs_rows(
    lines: &[String],
    id_col: usize,
    name_col: usize,
) -> Result<Vec<BvfsEntry>, csv::Error> {
    if lines.len() <= 1 {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for row in split_tsv_rows(&lines[1..])? {
        match (row.get(id_col), row.get(name_col)) {
            (Some(id), Some(name)) => entries.push(BvfsEntry::new(id.as_str(), name.as_str())),
            _ => tracing::debug!("Skipping short bvfs row: {:?}", row),
        }
    }
    Ok(entries)
}

/// `.bvfs_lsdirs` rows: `PathId .. .. .. .. Name`. Skips `.` and `..`.
pub fn parse_bvfs_dirs(lines: &[String]) -> Result<Vec<BvfsEntry>, csv::Error> {
    Ok(parse_bvfs_rows(lines, 0, 5)?
        .into_iter()
        .filter(|e| e.name != "." && e.name != "..")
        .collect())
}

/// `.bvfs_lsfiles` rows: `.. .. FileId .. .. Name`.
pub fn parse_bvfs_files(lines: &[String]) -> Result<Vec<BvfsEntry>, csv::Error> {
    parse_bvfs_rows(lines, 2, 5)
}

pub fn extract_queued_job_id(lines: &[String]) -> Option<String> {
    let text = lines.join("\n");
    JOB_QUEUED_RE
        .captures(&text)
        .map(|caps| caps[1].to_string())
}

/// `None` when the client has nothing running. A running job without a
/// progress line reports zeros.
pub fn parse_restore_progress(lines: &[String]) -> Option<RestoreProgress> {
    let text = lines.join("\n");
    if text.contains("No Jobs running") {
        return None;
    }

    // Several jobs may run on one client; only the first progress line counts.
    Some(
        RESTORE_PROGRESS_RE
            .captures(&text)
            .map(|caps| RestoreProgress {
                restored: caps[1].to_string(),
                expected: caps[2].to_string(),
                completed: caps[3].to_string(),
            })
            .unwrap_or_default(),
    )
}

pub fn has_runscript(description: &[String]) -> bool {
    RUNSCRIPT_RE.is_match(&description.join("\n"))
}

/// Renders `key` / `key=value` pairs for the tail of a command line.
pub fn render_options(options: &[(String, Option<String>)]) -> String {
    options
        .iter()
        .map(|(key, value)| match value {
            Some(v) => format!("{}={}", key, v),
            None => key.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
