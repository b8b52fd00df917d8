#![allow(dead_code)]

use bregress::domain::model::Platform;
use bregress::ConsoleOptions;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Replies the fake console knows about. Every line it reads is echoed, as a
/// Unix bconsole does, and appended to `sent.log`.
const FAKE_BCONSOLE: &str = r#"
for arg in "$@"; do
  if [ "$arg" = "-l" ]; then
    echo "127.0.0.1-dir"
    echo "backup-dir"
    exit 0
  fi
done

echo "Connecting to Director 127.0.0.1:8101"
echo "1000 OK: 1 127.0.0.1-dir Version: 15.0.2 (21 March 2024)"
echo "Enter a period to cancel a command."

while IFS= read -r line || [ -n "$line" ]; do
  printf '%s\n' "$line" >> "$SENT_LOG"
  printf '%s\n' "$line"
  case "$line" in
    q|quit)
      exit 0 ;;
    ".clients")
      printf 'zozo\nalpha-fd\n' ;;
    ".sql query="*)
      printf 'Using Catalog "MyCatalog"\n12\t2024-03-01 10:00:01\tF\tBackupClient1\t\n9\t2024-02-28 10:00:01\tI\tBackupClient1\t\n' ;;
    ".bvfs_get_jobids jobid="*)
      printf 'Using Catalog "MyCatalog"\n1,9,12\n' ;;
    ".bvfs_lsdirs jobid=12 path=")
      printf 'Using Catalog "MyCatalog"\n1\t0\t0\t0\tA\t.\n7\t0\t0\t0\tA\t/\n' ;;
    ".bvfs_lsdirs jobid=12 pathid=7")
      printf 'Using Catalog "MyCatalog"\n7\t0\t0\t0\tA\t.\n8\t0\t0\t0\tA\tetc/\n9\t0\t0\t0\tA\tusr/\n' ;;
    ".bvfs_lsdirs jobid=12 pathid=8")
      printf 'Using Catalog "MyCatalog"\n10\t0\t0\t0\tA\tbacula/\n' ;;
    ".bvfs_lsfiles jobid=12 pathid=10")
      printf 'Using Catalog "MyCatalog"\n10\t3\t501\t12\tA\tbacula-dir.conf\n10\t4\t502\t12\tA\tbconsole.conf\n' ;;
    "restore client="*)
      printf 'Bootstrap records written to /tmp/restore.bsr\nJob queued. JobId=42\n' ;;
    ".jobs type=R")
      printf 'RestoreFiles\nRestoreWithScript\n' ;;
    "show job=RestoreWithScript")
      printf 'Job: name=RestoreWithScript JobType=82\n  --> RunScript\n' ;;
    "show job="*)
      printf 'Job: name=RestoreFiles JobType=82\n' ;;
    "status client=busy-fd")
      printf 'Running Jobs:\nFiles=46,507 Bytes=12,875,215,455\nFiles: Restored=1,204 Expected=2,000 Completed=60%%\n' ;;
    "status client="*)
      printf 'Running Jobs:\nNo Jobs running.\n' ;;
    "status storage="*)
      if [ -f "$FAKE_DIR/storage-idle" ]; then
        printf 'Device "FileStorage" is mounted with Volume "TestVolume001"\n'
      else
        printf 'Device is BLOCKED waiting to create a volume:\n'
      fi ;;
    "flood")
      yes err | head -n 50000 >&2
      yes out | head -n 50000 ;;
    "break-me")
      echo "Director authorization problem." >&2
      exit 3 ;;
  esac
done
"#;

pub struct FakeConsole {
    pub dir: TempDir,
    pub script: PathBuf,
    pub sent_log: PathBuf,
}

impl FakeConsole {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let sent_log = dir.path().join("sent.log");
        let script = dir.path().join("fake-bconsole.sh");
        let body = format!(
            "FAKE_DIR='{}'\nSENT_LOG='{}'\n{}",
            dir.path().display(),
            sent_log.display(),
            FAKE_BCONSOLE
        );
        std::fs::write(&script, body).unwrap();
        std::fs::write(dir.path().join("bconsole.conf"), "# unused\n").unwrap();
        Self {
            dir,
            script,
            sent_log,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Options that run the script through `/bin/sh`.
    pub fn options(&self) -> ConsoleOptions {
        ConsoleOptions {
            bin_path: Some(self.script.clone()),
            conf_path: Some(self.dir.path().join("bconsole.conf")),
            launcher: vec!["/bin/sh".to_string()],
            platform: Some(Platform::Unix),
            ..Default::default()
        }
    }

    /// From now on `status storage=` reports a mounted device instead of a blocked one.
    pub fn set_storage_idle(&self) {
        std::fs::write(self.dir.path().join("storage-idle"), "").unwrap();
    }

    /// Every line the console received so far.
    pub fn sent(&self) -> Vec<String> {
        std::fs::read_to_string(&self.sent_log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
