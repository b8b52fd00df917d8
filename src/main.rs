use anyhow::Context;
use bregress::app::scenarios;
use bregress::config::Command;
use bregress::domain::model::RestoreProgress;
use bregress::utils::error::ErrorSeverity;
use bregress::utils::{logger, validation, validation::Validate};
use bregress::{BConsole, CliConfig, ConsoleOptions, HarnessConfig, ScenarioRunner};
use clap::Parser;
use serde::Serialize;

fn print_lines<T: Serialize>(json: bool, items: &[T], render: impl Fn(&T) -> String) -> bregress::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{}", render(item));
        }
    }
    Ok(())
}

/// `null` under `--json` when no restore is running.
fn restore_status_text(json: bool, progress: Option<&RestoreProgress>) -> bregress::Result<String> {
    Ok(match (json, progress) {
        (true, progress) => serde_json::to_string_pretty(&progress)?,
        (false, Some(p)) => format!(
            "Restored={} Expected={} Completed={}%",
            p.restored, p.expected, p.completed
        ),
        (false, None) => "No Jobs running".to_string(),
    })
}

fn console(cli: &CliConfig, config: &HarnessConfig) -> bregress::Result<BConsole> {
    if let Some(conf_path) = &config.console.conf_path {
        validation::validate_existing_file("console.conf_path", conf_path)?;
    }
    let options = ConsoleOptions {
        verbose: cli.verbose && !cli.json,
        ..config.console_options()
    };
    Ok(BConsole::new(options)?)
}

/// Returns the process exit code.
async fn execute(cli: &CliConfig, config: &HarnessConfig) -> bregress::Result<i32> {
    match &cli.command {
        Command::Banner => {
            let banner = console(cli, config)?.greeting_banner().await?;
            print_lines(cli.json, &[banner], |line| line.clone())?;
        }
        Command::Clients { sort } => {
            let clients = console(cli, config)?.list_clients(*sort).await?;
            print_lines(cli.json, &clients, |client| client.clone())?;
        }
        Command::Jobs { client } => {
            let jobs = console(cli, config)?.list_jobs_for_one_client(client).await?;
            print_lines(cli.json, &jobs, |job| {
                format!("{}\t{}\t{}\t{}", job.job_id, job.start_time, job.level, job.name)
            })?;
        }
        Command::Directors => {
            let directors = console(cli, config)?.list_directors().await?;
            print_lines(cli.json, &directors, |director| director.clone())?;
        }
        Command::RestoreStatus { client } => {
            let progress = console(cli, config)?.status_restore_job(client).await?;
            println!("{}", restore_status_text(cli.json, progress.as_ref())?);
        }
        Command::SimpleRestoreJobs => {
            let jobs = console(cli, config)?.search_simple_restore_jobs().await?;
            print_lines(cli.json, &jobs, |job| job.clone())?;
        }
        Command::Scenarios => {
            let runner = ScenarioRunner::new(scenarios::all());
            let names: Vec<String> = runner.names().into_iter().map(str::to_string).collect();
            print_lines(cli.json, &names, |name| name.clone())?;
        }
        Command::Run { names } => {
            validation::validate_existing_dir(
                "lab.regress_dir",
                &config.regress_dir().display().to_string(),
            )?;
            let runner = ScenarioRunner::new(scenarios::all());
            let options = config.lab_options("bregress");
            let reports = runner.run_many(names, &options).await?;

            let summary = ScenarioRunner::summary(&reports);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    let status = if report.passed() { "✅ passed" } else { "❌ failed" };
                    println!("{} {} ({:?})", status, report.name, report.duration);
                }
            }
            tracing::info!("📊 Run summary: {:?}", summary);

            if reports.iter().any(|r| !r.passed()) {
                return Ok(1);
            }
        }
    }
    Ok(0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => HarnessConfig::default(),
    };
    cli.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match execute(&cli, &config).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(
                "❌ bregress failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> RestoreProgress {
        RestoreProgress {
            restored: "1,204".to_string(),
            expected: "2,000".to_string(),
            completed: "60".to_string(),
        }
    }

    #[test]
    fn test_restore_status_text() {
        assert_eq!(restore_status_text(false, None).unwrap(), "No Jobs running");
        assert_eq!(
            restore_status_text(false, Some(&progress())).unwrap(),
            "Restored=1,204 Expected=2,000 Completed=60%"
        );
    }

    #[test]
    fn test_restore_status_json_is_null_when_idle() {
        assert_eq!(restore_status_text(true, None).unwrap(), "null");

        let json = restore_status_text(true, Some(&progress())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["completed"], "60");
    }
}
