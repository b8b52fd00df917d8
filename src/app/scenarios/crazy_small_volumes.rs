//! Lots of small volumes capped with `MaxVolBytes`, twenty backups in
//! parallel, then a restore of each of them.

use super::streams::{self, Sizing, MIB};
use crate::core::lab::Lab;
use crate::domain::ports::Scenario;
use crate::utils::error::Result;
use async_trait::async_trait;

pub const BACKUPS: u32 = 20;

pub struct CrazySmallVolumesTest;

impl CrazySmallVolumesTest {
    pub fn sizing(force_dedup: bool) -> Sizing {
        if force_dedup {
            Sizing {
                job_size_mb: 500,
                job_start_mb: 100,
                vol_count: 60,
                max_vol_bytes: 2 * MIB,
            }
        } else {
            Sizing {
                job_size_mb: 20,
                job_start_mb: 10,
                vol_count: 220,
                max_vol_bytes: 2 * MIB,
            }
        }
    }

    /// Every volume but the last is capped; the last one takes the overflow.
    pub fn label_script(sizing: &Sizing) -> Vec<String> {
        let mut scripts = Vec::with_capacity(2 * sizing.vol_count as usize);
        for index in 1..sizing.vol_count {
            let volume = streams::volume_name(index);
            scripts.push(format!("label storage={{STORAGE}} volume={}\n", volume));
            scripts.push(format!(
                "update volume={} MaxVolBytes={}\n",
                volume, sizing.max_vol_bytes
            ));
        }
        scripts.push(format!(
            "label storage={{STORAGE}} volume={}\n",
            streams::volume_name(sizing.vol_count)
        ));
        scripts
    }
}

#[async_trait]
impl Scenario for CrazySmallVolumesTest {
    fn name(&self) -> &str {
        "crazy-small-volumes-test"
    }

    fn profile(&self) -> Option<&str> {
        Some("dedup-simple")
    }

    async fn run(&self, lab: &Lab) -> Result<()> {
        lab.start_test().await?;

        let sizing = Self::sizing(streams::force_dedup(lab));
        streams::write_streams(lab, BACKUPS, &sizing).await?;

        for script in Self::label_script(&sizing) {
            lab.bconsole_script(&script).await?;
        }

        lab.shell_out("$tmp/select-cfg.sh 0").await?;
        lab.bconsole_script(&streams::backup_script(BACKUPS)).await?;
        lab.bconsole_script("list media\nquit\n").await?;
        lab.bconsole_script(&streams::restore_script(BACKUPS)).await?;

        lab.shell("check_for_zombie_jobs storage=${STORAGE}").await?;
        lab.finish(&["check_two_logs"]).await
    }
}
