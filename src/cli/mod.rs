mod logs;
mod problem;
mod run;
mod serve;

use anyhow::{Result, anyhow, bail};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::automation::{AutomationOrchestrator, TaskKind};
use crate::core::config::AppConfig;
use crate::core::llm::LlmManager;
use crate::core::processors::JobProcessors;
use crate::core::store::Store;
use crate::core::terminal::{self, GuideSection};
use crate::logging;

const DEFAULT_LOG_LIMIT: usize = 20;

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Service")
        .command("serve", "Start the API server and the automation scheduler")
        .command(
            "run <task>",
            "Run one task now: generate, synthesize, improve or full",
        )
        .print();

    GuideSection::new("Data")
        .command("logs", "Show recent automation log entries")
        .command("problem add", "Register a problem to seed generation")
        .command("problem list", "List registered problems")
        .command("problem solve <id>", "Mark a problem solved so it stops seeding")
        .print();

    GuideSection::new("Options")
        .command("--config <path>", "Use a specific biosynth.toml")
        .command("--api-host <host>", "Bind address for serve")
        .command("--api-port <port>", "Port for serve")
        .command("--limit <n>", "Number of entries for logs / problem list")
        .command("--task <task>", "Filter logs by task type")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("biosynth").green()
    );
}

/// Pull `--config <path>` out of the argument list wherever it appears.
pub(crate) fn split_global_args(args: &[String]) -> (Option<PathBuf>, Vec<String>) {
    let mut config = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => {
                rest.push(args[i].clone());
                i += 1;
            }
        }
    }
    (config, rest)
}

pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().unwrap_or(api_port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (api_host, api_port)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogsArgs {
    pub limit: usize,
    pub task: Option<String>,
}

pub(crate) fn parse_logs_flags(args: &[String], start: usize) -> LogsArgs {
    let mut limit = DEFAULT_LOG_LIMIT;
    let mut task = None;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-n" => {
                if i + 1 < args.len() {
                    limit = args[i + 1].parse().unwrap_or(DEFAULT_LOG_LIMIT);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--task" | "-t" => {
                if i + 1 < args.len() {
                    task = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    LogsArgs { limit, task }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ProblemArgs {
    pub title: String,
    pub description: String,
    pub domain: String,
    pub priority: String,
}

pub(crate) fn parse_problem_flags(args: &[String], start: usize) -> ProblemArgs {
    let mut parsed = ProblemArgs {
        priority: "high".to_string(),
        ..Default::default()
    };
    let mut i = start;
    while i < args.len() {
        let target = match args[i].as_str() {
            "--title" => Some(&mut parsed.title),
            "--description" | "--desc" => Some(&mut parsed.description),
            "--domain" => Some(&mut parsed.domain),
            "--priority" | "-p" => Some(&mut parsed.priority),
            _ => None,
        };
        match target {
            Some(field) if i + 1 < args.len() => {
                *field = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    parsed
}

/// Handles shared by every command that talks to the model.
pub(crate) struct Runtime {
    pub store: Store,
    pub processors: Arc<JobProcessors>,
    pub orchestrator: Arc<AutomationOrchestrator>,
}

pub(crate) async fn build_runtime(config: &AppConfig) -> Result<Runtime> {
    let store = Store::open(config.database_path()).await?;
    let llm = Arc::new(LlmManager::from_config(config)?);
    let processors = Arc::new(JobProcessors::new(llm, store.clone()));
    let orchestrator = Arc::new(AutomationOrchestrator::new(
        store.clone(),
        processors.clone(),
        config.automation.clone(),
    ));
    Ok(Runtime {
        store,
        processors,
        orchestrator,
    })
}

pub async fn run_main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, args) = split_global_args(&raw);
    let command = args.first().map(String::as_str).unwrap_or("help");

    match command {
        "serve" => {
            let (log_tx, _) = tokio::sync::broadcast::channel::<String>(500);
            logging::init_logging(log_tx.clone(), false);
            let mut config = AppConfig::load(config_path.as_deref())?;
            let (api_host, api_port) = parse_api_server_flags(
                &args,
                1,
                config.server.host.clone(),
                config.server.port,
            );
            config.server.host = api_host;
            config.server.port = api_port;
            serve::run_serve(config, log_tx).await
        }
        "run" => {
            let task = args
                .get(1)
                .ok_or_else(|| anyhow!("Usage: biosynth run <generate|synthesize|improve|full>"))?;
            let kind = task.parse::<TaskKind>().map_err(|e| anyhow!(e))?;
            let (log_tx, _) = tokio::sync::broadcast::channel::<String>(16);
            logging::init_logging(log_tx, false);
            let config = AppConfig::load(config_path.as_deref())?;
            run::run_task(&config, kind).await
        }
        "logs" => {
            let config = AppConfig::load(config_path.as_deref())?;
            logs::show_logs(&config, parse_logs_flags(&args, 1)).await
        }
        "problem" => {
            let config = AppConfig::load(config_path.as_deref())?;
            match args.get(1).map(String::as_str) {
                Some("add") => problem::add_problem(&config, parse_problem_flags(&args, 2)).await,
                Some("list") | Some("ls") => {
                    problem::list_problems(&config, parse_logs_flags(&args, 2).limit).await
                }
                Some("solve") => {
                    let id = args
                        .get(2)
                        .and_then(|raw| raw.parse::<i64>().ok())
                        .ok_or_else(|| anyhow!("Usage: biosynth problem solve <id>"))?;
                    problem::solve_problem(&config, id).await
                }
                _ => {
                    println!(
                        "{}",
                        style("Usage: biosynth problem <add|list|solve> [options]").bold()
                    );
                    println!(
                        "  Example: biosynth problem add --title \"Grid balancing\" --description \"...\" --domain \"Energy Systems\" --priority critical"
                    );
                    Ok(())
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("biosynth {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_help();
            bail!("Unknown command '{}'", other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn config_flag_is_removed_from_any_position() {
        let (config, rest) = split_global_args(&args(&["run", "--config", "/tmp/b.toml", "full"]));
        assert_eq!(config, Some(PathBuf::from("/tmp/b.toml")));
        assert_eq!(rest, args(&["run", "full"]));

        let (config, rest) = split_global_args(&args(&["logs", "--config"]));
        assert_eq!(config, None);
        assert_eq!(rest, args(&["logs"]));
    }

    #[test]
    fn api_server_flags_override_defaults() {
        let (host, port) = parse_api_server_flags(
            &args(&["serve", "--api-host", "0.0.0.0", "--api-port", "9000"]),
            1,
            "127.0.0.1".into(),
            17890,
        );
        assert_eq!(host, "0.0.0.0");
        assert_eq!(port, 9000);

        let (_, port) =
            parse_api_server_flags(&args(&["serve", "--api-port", "nope"]), 1, "h".into(), 17890);
        assert_eq!(port, 17890);
    }

    #[test]
    fn logs_flags_parse_limit_and_task() {
        assert_eq!(
            parse_logs_flags(&args(&["logs", "--limit", "5", "--task", "improve"]), 1),
            LogsArgs {
                limit: 5,
                task: Some("improve".into())
            }
        );
        assert_eq!(parse_logs_flags(&args(&["logs", "-n"]), 1).limit, DEFAULT_LOG_LIMIT);
    }

    #[test]
    fn problem_flags_default_to_high_priority() {
        let parsed = parse_problem_flags(
            &args(&[
                "problem",
                "add",
                "--title",
                "Grid balancing",
                "--domain",
                "Energy Systems",
                "--description",
                "peaks",
            ]),
            2,
        );
        assert_eq!(parsed.title, "Grid balancing");
        assert_eq!(parsed.domain, "Energy Systems");
        assert_eq!(parsed.description, "peaks");
        assert_eq!(parsed.priority, "high");
    }
}
