use crate::core::console::ConsoleOptions;
use crate::core::lab::{LabOptions, DEFAULT_FUNCTIONS};
use crate::domain::ports::ConsoleSettings;
use crate::utils::error::{HarnessError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub lab: LabConfig,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub bin_path: Option<String>,
    pub conf_path: Option<String>,
    pub director: Option<String>,
    #[serde(default)]
    pub launcher: Vec<String>,
    #[serde(default)]
    pub regress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    pub regress_dir: Option<String>,
    pub functions: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            regress_dir: None,
            functions: Some(DEFAULT_FUNCTIONS.to_string()),
            debug: false,
        }
    }
}

impl HarnessConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(HarnessError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| HarnessError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${NAME}` with the environment value; unknown names stay as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures<'_>| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(bin_path) = &self.console.bin_path {
            validation::validate_path("console.bin_path", bin_path)?;
        }
        if let Some(conf_path) = &self.console.conf_path {
            validation::validate_path("console.conf_path", conf_path)?;
        }
        if let Some(director) = &self.console.director {
            validation::validate_non_empty_string("console.director", director)?;
        }
        for part in &self.console.launcher {
            validation::validate_non_empty_string("console.launcher", part)?;
        }
        if let Some(dir) = &self.lab.regress_dir {
            validation::validate_path("lab.regress_dir", dir)?;
        }
        for name in self.vars.keys() {
            validation::validate_var_name("vars", name)?;
        }
        Ok(())
    }

    pub fn regress_dir(&self) -> PathBuf {
        self.lab
            .regress_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn console_options(&self) -> ConsoleOptions {
        ConsoleOptions::from_settings(self)
    }

    /// Lab options for `testname`; the scenario runner fills in the profile.
    pub fn lab_options(&self, testname: &str) -> LabOptions {
        let mut options = LabOptions::new(testname, self.regress_dir());
        if let Some(functions) = &self.lab.functions {
            options.functions = PathBuf::from(functions);
        }
        options.debug = self.lab.debug;
        options.vars = self.vars.clone();
        options.console = self.console_options();
        options
    }
}

impl ConsoleSettings for HarnessConfig {
    fn bin_path(&self) -> Option<&str> {
        self.console.bin_path.as_deref()
    }

    fn conf_path(&self) -> Option<&str> {
        self.console.conf_path.as_deref()
    }

    fn director(&self) -> Option<&str> {
        self.console.director.as_deref()
    }

    fn launcher(&self) -> &[String] {
        &self.console.launcher
    }

    fn regress(&self) -> bool {
        self.console.regress
    }
}

impl Validate for HarnessConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[console]
bin_path = "/opt/bacula/bin/bconsole"
conf_path = "/opt/bacula/etc/bconsole.conf"
director = "main-dir"
launcher = ["sudo"]

[lab]
regress_dir = "/home/build/regress"
debug = true

[vars]
STORAGE = "Dedup"
FORCE_DEDUP = "yes"
"#;

        let config = HarnessConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.bin_path(), Some("/opt/bacula/bin/bconsole"));
        assert_eq!(config.director(), Some("main-dir"));
        assert_eq!(config.launcher(), ["sudo".to_string()]);
        assert_eq!(config.regress_dir(), PathBuf::from("/home/build/regress"));

        let options = config.lab_options("py-sample-test");
        assert!(options.debug);
        assert_eq!(options.functions, PathBuf::from(DEFAULT_FUNCTIONS));
        assert_eq!(options.vars.get("STORAGE").map(String::as_str), Some("Dedup"));
        assert_eq!(options.console.director.as_deref(), Some("main-dir"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = HarnessConfig::from_toml_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.bin_path(), None);
        assert!(config.launcher().is_empty());
        assert_eq!(config.regress_dir(), PathBuf::from("."));
        assert_eq!(config.lab.functions.as_deref(), Some(DEFAULT_FUNCTIONS));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("BREGRESS_TEST_REGRESS_DIR", "/srv/regress");

        let toml_content = r#"
[lab]
regress_dir = "${BREGRESS_TEST_REGRESS_DIR}"

[vars]
UNSET = "${BREGRESS_TEST_NEVER_SET}"
"#;

        let config = HarnessConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.lab.regress_dir.as_deref(), Some("/srv/regress"));
        assert_eq!(
            config.vars.get("UNSET").map(String::as_str),
            Some("${BREGRESS_TEST_NEVER_SET}")
        );

        std::env::remove_var("BREGRESS_TEST_REGRESS_DIR");
    }

    #[test]
    fn test_config_validation() {
        let bad_var = HarnessConfig::from_toml_str("[vars]\n\"my-var\" = \"x\"\n").unwrap();
        assert!(bad_var.validate().is_err());

        let bad_director = HarnessConfig::from_toml_str("[console]\ndirector = \"  \"\n").unwrap();
        assert!(bad_director.validate().is_err());

        assert!(HarnessConfig::from_toml_str("[console\n").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[console]\nbin_path = \"bin/bconsole\"\nregress = true\n")
            .unwrap();

        let config = HarnessConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.bin_path(), Some("bin/bconsole"));
        assert!(config.regress());
    }
}
