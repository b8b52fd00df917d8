//! Sizing and sample-stream descriptors shared by the volume torture tests.

use crate::core::lab::Lab;
use crate::utils::error::Result;
use std::path::PathBuf;

pub const MIB: u64 = 1024 * 1024;

/// A descriptor read by the dedup test plugin to generate a reproducible stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupStream {
    pub size_mb: u64,
    pub start_mb: u64,
}

impl DedupStream {
    pub fn render(&self) -> String {
        format!(
            "global_size=10G\n\
             chunk_min_size=4K\n\
             chunk_max_size=6K\n\
             deviation=10\n\
             seed=1234\n\
             size={}M\n\
             start={}M\n",
            self.size_mb, self.start_mb
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    pub job_size_mb: u64,
    pub job_start_mb: u64,
    pub vol_count: u32,
    pub max_vol_bytes: u64,
}

pub fn force_dedup(lab: &Lab) -> bool {
    matches!(
        lab.get_var("FORCE_DEDUP").as_deref(),
        Some("yes") | Some("1") | Some("on")
    )
}

/// Writes `tmp/stream<i>.dedup` for every backup, each starting further into the data set.
pub async fn write_streams(lab: &Lab, count: u32, sizing: &Sizing) -> Result<Vec<PathBuf>> {
    let tmp = lab.vars().tmp();
    let mut written = Vec::with_capacity(count as usize);
    for i in 0..count {
        let stream = DedupStream {
            size_mb: sizing.job_size_mb,
            start_mb: sizing.job_start_mb * u64::from(i),
        };
        let path = tmp.join(format!("stream{}.dedup", i));
        lab.write_file(&path, &stream.render()).await?;
        written.push(path);
    }
    Ok(written)
}

pub fn volume_name(index: u32) -> String {
    format!("TestVolume{:03}", index)
}

/// One `run` per backup, switching the plugin to the next stream in between.
pub fn backup_script(count: u32) -> String {
    let mut script = String::from(
        "@output /dev/null\n\
         messages\n\
         @{out} {cwd}/tmp/log1.out\n\
         @#\n",
    );
    for _ in 0..count {
        script.push_str("run job=DedupPluginTest level=Full storage={STORAGE} yes\n");
        script.push_str("@exec \"{tmp}/select-cfg.sh next\"\n");
    }
    script.push_str("wait\nmessage\nquit\n");
    script
}

/// Restores jobs 1..=count into `tmp/bacula-restores`.
pub fn restore_script(count: u32) -> String {
    let mut script = String::from(
        "@output /dev/null\n\
         messages\n\
         @{out} {cwd}/tmp/log2.out\n\
         setdebug level=4 storage={STORAGE}\n",
    );
    for jobid in 1..=count {
        script.push_str(&format!(
            "restore jobid={} where={{tmp}}/bacula-restores all storage={{STORAGE}} done yes\n",
            jobid
        ));
    }
    script.push_str("wait\nmessage\nquit\n");
    script
}
