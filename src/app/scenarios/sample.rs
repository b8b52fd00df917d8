use crate::core::lab::Lab;
use crate::domain::ports::Scenario;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Label a volume, back up `BackupClient1`, restore everything and diff.
pub struct SampleTest;

const SCRIPT: &str = "\
@{out} /dev/null
messages
@{out} {tmp}/log1.out
setdebug level=4 storage=File1
label volume=TestVolume001 storage=File1 pool=File slot=1 drive=0
show job=BackupClient1
run job=BackupClient1 yes
@sleep 1
status storage=File1
@sleep 1
status storage=File1
wait
messages
@#
@# now do a restore
@#
@{out} {tmp}/log2.out
setdebug level=4 storage=File1
restore where={tmp}/bacula-restores select all done
yes
wait
messages
quit
";

#[async_trait]
impl Scenario for SampleTest {
    fn name(&self) -> &str {
        "py-sample-test"
    }

    async fn run(&self, lab: &Lab) -> Result<()> {
        lab.shell("scripts/copy-confs").await?;
        lab.shell("start_test").await?;
        lab.start_bacula().await?;

        lab.bconsole_script(SCRIPT).await?;

        lab.shell("check_for_zombie_jobs storage=File1").await?;
        lab.shell("stop_bacula").await?;

        lab.finish(&["check_two_logs", "check_restore_diff"]).await
    }
}
