//! Keeps two capped volumes alternating while backups are running.
//!
//! Whenever the storage daemon blocks waiting for a new volume, the volume
//! that was filled first gets a bigger `MaxVolBytes`, goes back to `Append`
//! and is mounted again. The enlarger then watches that file until it has
//! grown and settled before polling the storage status again.

use crate::core::lab::Lab;
use crate::domain::model::Volume;
use crate::utils::error::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Level;

pub const BLOCKED_MESSAGE: &str = "Device is BLOCKED waiting to create a volume";

const POLL_STATUS: Duration = Duration::from_secs(5);
const POLL_GROWTH: Duration = Duration::from_millis(100);
const SETTLE: Duration = Duration::from_secs(1);
const AFTER_STABLE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnlargerState {
    WaitingMessage,
    WaitingGrowth,
    WaitingStable,
}

#[derive(Debug)]
pub struct VolumeEnlarger {
    /// Next volume to enlarge.
    current: Volume,
    /// Volume enlarged last, the one being watched.
    previous: Volume,
    size: u64,
    increment: u64,
    observed_size: u64,
    state: EnlargerState,
}

impl VolumeEnlarger {
    pub fn new(first: Volume, second: Volume, max_vol_bytes: u64) -> Self {
        Self {
            current: first,
            previous: second,
            size: max_vol_bytes,
            increment: max_vol_bytes,
            observed_size: 0,
            state: EnlargerState::WaitingMessage,
        }
    }

    pub fn state(&self) -> EnlargerState {
        self.state
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn watched(&self) -> &Volume {
        &self.previous
    }

    /// Does one unit of work and returns how long to wait before the next.
    pub async fn step(&mut self, lab: &Lab) -> Result<Duration> {
        match self.state {
            EnlargerState::WaitingMessage => {
                let status = lab.bconsole_script_out("status storage={STORAGE}\n").await?;
                if !status.stdout.contains(BLOCKED_MESSAGE) {
                    return Ok(POLL_STATUS);
                }

                // grow only every other swap
                if self.current.name < self.previous.name {
                    self.size += self.increment;
                }
                self.observed_size = lab.file_size(&self.current.path).await?;
                lab.log(
                    Level::INFO,
                    &format!(
                        "Device is BLOCKED vol={} sz={}",
                        self.current.name, self.size
                    ),
                );

                let name = &self.current.name;
                lab.bconsole_script(&format!("update volume={} MaxVolBytes={}\n", name, self.size))
                    .await?;
                lab.bconsole_script(&format!("update volume={} volstatus=Append\n", name))
                    .await?;
                lab.bconsole_script("mount storage={STORAGE} drive=0 slot=0\n")
                    .await?;

                std::mem::swap(&mut self.current, &mut self.previous);
                self.state = EnlargerState::WaitingGrowth;
                Ok(Duration::ZERO)
            }
            EnlargerState::WaitingGrowth => {
                let new_size = lab.file_size(&self.previous.path).await?;
                if new_size == self.observed_size {
                    return Ok(POLL_GROWTH);
                }
                lab.log(
                    Level::INFO,
                    &format!(
                        "Volsize changed vol={} oldsize={} newsize={}",
                        self.previous.name, self.observed_size, new_size
                    ),
                );
                self.observed_size = new_size;
                self.state = EnlargerState::WaitingStable;
                Ok(SETTLE)
            }
            EnlargerState::WaitingStable => {
                let new_size = lab.file_size(&self.previous.path).await?;
                if new_size != self.observed_size {
                    self.observed_size = new_size;
                    return Ok(POLL_GROWTH + SETTLE);
                }
                lab.log(
                    Level::INFO,
                    &format!("Volsize stable vol={} size={}", self.previous.name, new_size),
                );
                self.state = EnlargerState::WaitingMessage;
                // leave the director alone for a moment
                Ok(AFTER_STABLE)
            }
        }
    }

    /// Steps until `stop` flips to true or its sender goes away.
    pub async fn run(mut self, lab: &Lab, mut stop: watch::Receiver<bool>) -> Result<()> {
        lab.log(
            Level::INFO,
            &format!(
                "EnlargeVolume started vol1={} vol2={} size={}",
                self.current.name, self.previous.name, self.size
            ),
        );
        while !*stop.borrow() {
            let pause = self.step(lab).await?;
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        lab.log(Level::INFO, "EnlargeVolume ended");
        Ok(())
    }
}
