use crate::utils::error::LabError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE: &str = "File1";
pub const DEFAULT_CLIENT: &str = "127.0.0.1-fd";

/// Variables a lab exposes to console scripts (`{tmp}`) and shell helpers (`$tmp`).
#[derive(Debug, Clone, Default)]
pub struct LabVars {
    values: BTreeMap<String, String>,
}

impl LabVars {
    /// Builds the standard regress layout rooted at `cwd`, then applies `extra`.
    pub fn for_regress_dir(
        cwd: &Path,
        testname: &str,
        profile: &str,
        debug: bool,
        extra: &BTreeMap<String, String>,
    ) -> Self {
        let mut vars = Self::default();
        let dir = |name: &str| cwd.join(name).display().to_string();

        vars.set("cwd", cwd.display().to_string());
        vars.set("tmp", dir("tmp"));
        vars.set("bin", dir("bin"));
        vars.set("scripts", dir("scripts"));
        vars.set("working", dir("working"));
        vars.set("out", if debug { "tee" } else { "output" });
        vars.set("testname", testname);
        vars.set("profile", profile);
        vars.set("STORAGE", DEFAULT_STORAGE);
        vars.set("CLIENT", DEFAULT_CLIENT);

        for (name, value) in extra {
            vars.set(name.as_str(), value.as_str());
        }
        vars
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn tmp(&self) -> PathBuf {
        PathBuf::from(self.get("tmp").unwrap_or("tmp"))
    }

    pub fn cwd(&self) -> PathBuf {
        PathBuf::from(self.get("cwd").unwrap_or("."))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replaces `{name}` with its value; `{{` and `}}` stand for literal braces.
    pub fn expand(&self, template: &str) -> Result<String, LabError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut offset = 0;

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") {
                out.push('{');
                rest = &tail[2..];
                offset += pos + 2;
            } else if tail.starts_with("}}") {
                out.push('}');
                rest = &tail[2..];
                offset += pos + 2;
            } else if tail.starts_with('{') {
                let end = tail.find('}').ok_or(LabError::BadTemplate {
                    position: offset + pos,
                })?;
                let name = &tail[1..end];
                let value = self.get(name).ok_or_else(|| LabError::UnknownVar {
                    name: name.to_string(),
                })?;
                out.push_str(value);
                rest = &tail[end + 1..];
                offset += pos + end + 1;
            } else {
                return Err(LabError::BadTemplate {
                    position: offset + pos,
                });
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
