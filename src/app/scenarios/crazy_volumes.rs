//! Two small volumes, ten parallel backups, and a helper that keeps
//! re-enabling whichever volume filled up first. Restores are expected to
//! fail until the storage daemon writes enough JobMedia records to switch
//! volumes in the right order.

use super::enlarger::VolumeEnlarger;
use super::streams::{self, Sizing, MIB};
use crate::core::lab::Lab;
use crate::domain::ports::Scenario;
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::Level;

pub const BACKUPS: u32 = 10;

pub struct CrazyVolumesTest;

impl CrazyVolumesTest {
    pub fn sizing(force_dedup: bool) -> Sizing {
        let (job_size_mb, job_start_mb) = if force_dedup { (500, 100) } else { (10, 10) };
        Sizing {
            job_size_mb,
            job_start_mb,
            vol_count: 2,
            max_vol_bytes: 2 * MIB,
        }
    }
}

#[async_trait]
impl Scenario for CrazyVolumesTest {
    fn name(&self) -> &str {
        "crazy-volumes-test"
    }

    fn profile(&self) -> Option<&str> {
        Some("dedup-simple")
    }

    async fn run(&self, lab: &Lab) -> Result<()> {
        lab.start_test().await?;

        let sizing = Self::sizing(streams::force_dedup(lab));
        streams::write_streams(lab, BACKUPS, &sizing).await?;

        for volume in (1..=sizing.vol_count).map(streams::volume_name) {
            lab.bconsole_script(&format!("label storage={{STORAGE}} volume={}\n", volume))
                .await?;
            lab.bconsole_script(&format!(
                "update volume={} MaxVolBytes={}\n",
                volume, sizing.max_vol_bytes
            ))
            .await?;
        }

        lab.shell_out("$tmp/select-cfg.sh 0").await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let enlarger = VolumeEnlarger::new(
            lab.get_volume(&streams::volume_name(1)),
            lab.get_volume(&streams::volume_name(sizing.vol_count)),
            sizing.max_vol_bytes,
        );
        let backups = async {
            let result = lab.bconsole_script(&streams::backup_script(BACKUPS)).await;
            // the enlarger only matters while backups are writing
            let _ = stop_tx.send(true);
            result
        };
        let (backup_result, enlarger_result) = tokio::join!(backups, enlarger.run(lab, stop_rx));
        backup_result?;
        let enlarger_error = enlarger_result.err();
        if let Some(e) = &enlarger_error {
            lab.log(Level::ERROR, &format!("EnlargeVolume failed: {}", e));
        }

        lab.bconsole_script("list media\nquit\n").await?;
        lab.bconsole_script(&streams::restore_script(BACKUPS)).await?;

        lab.shell("check_for_zombie_jobs storage=${STORAGE}").await?;
        lab.log(
            Level::ERROR,
            "This test is not supposed to succeed, until bacula can restore from \"tortured\" volumes",
        );
        lab.finish(&["check_two_logs"]).await?;

        match enlarger_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
