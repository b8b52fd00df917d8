use crate::core::lab::{Lab, LabOptions};
use crate::domain::model::{ScenarioOutcome, ScenarioReport};
use crate::domain::ports::Scenario;
use crate::utils::error::{LabError, Result};
use std::collections::HashMap;
use std::time::Instant;

/// Looks scenarios up by name and runs each one in a fresh lab.
pub struct ScenarioRunner {
    scenarios: Vec<Box<dyn Scenario>>,
}

impl ScenarioRunner {
    pub fn new(scenarios: Vec<Box<dyn Scenario>>) -> Self {
        Self { scenarios }
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&dyn Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    /// A failing scenario is reported, not returned as an error; only an
    /// unknown name or a lab that cannot be built is.
    pub async fn run(&self, name: &str, options: LabOptions) -> Result<ScenarioReport> {
        let scenario = self.find(name).ok_or_else(|| LabError::UnknownScenario {
            name: name.to_string(),
        })?;

        let mut options = options;
        options.testname = scenario.name().to_string();
        if let Some(profile) = scenario.profile() {
            options.profile = profile.to_string();
        }
        let lab = Lab::new(options)?;

        tracing::info!("🚀 Running scenario: {} (profile {})", lab.testname(), lab.profile());
        let start_time = Instant::now();
        let outcome = match scenario.run(&lab).await {
            Ok(()) => ScenarioOutcome::Passed,
            Err(e) => {
                tracing::error!("❌ Scenario {} failed: {}", scenario.name(), e);
                ScenarioOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        let duration = start_time.elapsed();

        if outcome == ScenarioOutcome::Passed {
            tracing::info!("✅ Scenario {} finished in {:?}", scenario.name(), duration);
        }

        Ok(ScenarioReport {
            name: scenario.name().to_string(),
            duration,
            outcome,
        })
    }

    pub async fn run_many(&self, names: &[String], options: &LabOptions) -> Result<Vec<ScenarioReport>> {
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            reports.push(self.run(name, options.clone()).await?);
        }
        Ok(reports)
    }

    pub fn summary(reports: &[ScenarioReport]) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        let passed = reports.iter().filter(|r| r.passed()).count();
        let total_duration: std::time::Duration = reports.iter().map(|r| r.duration).sum();

        summary.insert("total".to_string(), serde_json::Value::Number(reports.len().into()));
        summary.insert("passed".to_string(), serde_json::Value::Number(passed.into()));
        summary.insert(
            "failed".to_string(),
            serde_json::Value::Number((reports.len() - passed).into()),
        );
        summary.insert(
            "total_duration_ms".to_string(),
            serde_json::Value::Number((total_duration.as_millis() as u64).into()),
        );
        let failed: Vec<serde_json::Value> = reports
            .iter()
            .filter(|r| !r.passed())
            .map(|r| serde_json::Value::String(r.name.clone()))
            .collect();
        summary.insert("failed_scenarios".to_string(), serde_json::Value::Array(failed));

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::HarnessError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct MockScenario {
        name: String,
        fail: bool,
    }

    #[async_trait]
    impl Scenario for MockScenario {
        fn name(&self) -> &str {
            &self.name
        }

        fn profile(&self) -> Option<&str> {
            Some("mock-profile")
        }

        async fn run(&self, lab: &Lab) -> Result<()> {
            assert_eq!(lab.profile(), "mock-profile");
            assert_eq!(lab.testname(), self.name);
            if self.fail {
                return Err(LabError::ScenarioFailed {
                    scenario: self.name.clone(),
                    details: "restore diff".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(vec![
            Box::new(MockScenario {
                name: "ok-test".to_string(),
                fail: false,
            }),
            Box::new(MockScenario {
                name: "bad-test".to_string(),
                fail: true,
            }),
        ])
    }

    #[tokio::test]
    async fn test_run_reports_outcomes() {
        let runner = runner();
        assert_eq!(runner.names(), vec!["ok-test", "bad-test"]);

        let options = LabOptions::new("ignored", "/regress");
        let ok = runner.run("ok-test", options.clone()).await.unwrap();
        assert!(ok.passed());

        let bad = runner.run("bad-test", options).await.unwrap();
        match bad.outcome {
            ScenarioOutcome::Failed { reason } => assert!(reason.contains("restore diff")),
            ScenarioOutcome::Passed => panic!("bad-test should fail"),
        }
    }

    #[tokio::test]
    async fn test_unknown_scenario_is_an_error() {
        let err = runner()
            .run("missing", LabOptions::new("x", "/regress"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Lab(LabError::UnknownScenario { .. })
        ));
    }

    #[test]
    fn test_summary() {
        let reports = vec![
            ScenarioReport {
                name: "a".to_string(),
                duration: Duration::from_millis(1500),
                outcome: ScenarioOutcome::Passed,
            },
            ScenarioReport {
                name: "b".to_string(),
                duration: Duration::from_millis(500),
                outcome: ScenarioOutcome::Failed {
                    reason: "x".to_string(),
                },
            },
        ];
        let summary = ScenarioRunner::summary(&reports);
        assert_eq!(summary["total"], 2);
        assert_eq!(summary["passed"], 1);
        assert_eq!(summary["total_duration_ms"], 2000);
        assert_eq!(summary["failed_scenarios"], serde_json::json!(["b"]));
    }
}
