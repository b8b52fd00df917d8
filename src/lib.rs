pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::HarnessConfig;
pub use core::console::{BConsole, ConsoleOptions, RestoreRequest};
pub use core::lab::{Lab, LabOptions};
pub use core::runner::ScenarioRunner;
pub use utils::error::{ConsoleError, HarnessError, LabError, Result};
