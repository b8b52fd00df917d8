pub mod console;
pub mod lab;
pub mod reply;
pub mod runner;
pub mod vars;

pub use crate::domain::model::{BvfsEntry, ConsoleOutput, JobSummary, Platform, RestoreProgress};
pub use crate::domain::ports::{ConsoleSettings, Scenario};
pub use crate::utils::error::Result;
