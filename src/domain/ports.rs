use crate::core::lab::Lab;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Where the console binary lives and how to launch it.
pub trait ConsoleSettings: Send + Sync {
    fn bin_path(&self) -> Option<&str>;
    fn conf_path(&self) -> Option<&str>;
    fn director(&self) -> Option<&str>;
    fn launcher(&self) -> &[String];
    fn regress(&self) -> bool;
}

/// A regression test: a named sequence of lab operations.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    /// Configuration profile the regress scripts should install.
    fn profile(&self) -> Option<&str> {
        None
    }

    async fn run(&self, lab: &Lab) -> Result<()>;
}
