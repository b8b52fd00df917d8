use crate::config::toml_config::HarnessConfig;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "bregress")]
#[command(about = "Drive bconsole and run backup regression scenarios")]
pub struct CliConfig {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to the bconsole executable
    #[arg(long, global = true)]
    pub bin_path: Option<String>,

    /// Path to bconsole.conf
    #[arg(long, global = true)]
    pub conf_path: Option<String>,

    /// Director to connect to (bconsole -D)
    #[arg(long, global = true)]
    pub director: Option<String>,

    /// Regress tree used by scenarios
    #[arg(long, global = true)]
    pub regress_dir: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Print results as JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the director greeting line
    Banner,
    /// List clients known to the director
    Clients {
        #[arg(long)]
        sort: bool,
    },
    /// List terminated backup jobs of one client
    Jobs { client: String },
    /// List directors from bconsole.conf
    Directors,
    /// Show restore progress on a client
    RestoreStatus { client: String },
    /// Restore jobs that carry no RunScript
    SimpleRestoreJobs,
    /// List the available scenarios
    Scenarios,
    /// Run one or more scenarios
    Run {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

impl CliConfig {
    /// Command line flags win over the file.
    pub fn apply_overrides(&self, config: &mut HarnessConfig) {
        if let Some(bin_path) = &self.bin_path {
            config.console.bin_path = Some(bin_path.clone());
        }
        if let Some(conf_path) = &self.conf_path {
            config.console.conf_path = Some(conf_path.clone());
        }
        if let Some(director) = &self.director {
            config.console.director = Some(director.clone());
        }
        if let Some(regress_dir) = &self.regress_dir {
            config.lab.regress_dir = Some(regress_dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = CliConfig::try_parse_from([
            "bregress",
            "run",
            "py-sample-test",
            "crazy-volumes-test",
            "--regress-dir",
            "/regress",
        ])
        .unwrap();
        match &cli.command {
            Command::Run { names } => assert_eq!(names, &["py-sample-test", "crazy-volumes-test"]),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.regress_dir.as_deref(), Some("/regress"));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let cli = CliConfig::try_parse_from([
            "bregress",
            "--bin-path",
            "/usr/sbin/bconsole",
            "clients",
            "--sort",
        ])
        .unwrap();
        let mut config = HarnessConfig::default();
        config.console.bin_path = Some("/old/bconsole".to_string());
        config.console.director = Some("kept-dir".to_string());
        cli.apply_overrides(&mut config);
        assert_eq!(config.console.bin_path.as_deref(), Some("/usr/sbin/bconsole"));
        assert_eq!(config.console.director.as_deref(), Some("kept-dir"));
        assert!(matches!(cli.command, Command::Clients { sort: true }));
    }

    #[test]
    fn test_run_requires_a_name() {
        assert!(CliConfig::try_parse_from(["bregress", "run"]).is_err());
    }
}
