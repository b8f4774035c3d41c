use anyhow::{Result, anyhow, bail};
use console::style;

use super::ProblemArgs;
use crate::core::config::AppConfig;
use crate::core::store::Store;
use crate::core::store::types::{NewProblem, ProblemPriority};
use crate::core::terminal::{print_info, print_success};

pub(crate) fn validate_problem(args: ProblemArgs) -> Result<NewProblem> {
    if args.title.trim().is_empty() || args.description.trim().is_empty() {
        bail!(
            "Usage: biosynth problem add --title <title> --description <text> --domain <domain> [--priority low|medium|high|critical]"
        );
    }
    let priority = args
        .priority
        .parse::<ProblemPriority>()
        .map_err(|e| anyhow!(e))?;
    let domain = match args.domain.trim() {
        "" => "General".to_string(),
        d => d.to_string(),
    };
    Ok(NewProblem {
        title: args.title.trim().to_string(),
        description: args.description.trim().to_string(),
        domain,
        priority,
    })
}

pub async fn add_problem(config: &AppConfig, args: ProblemArgs) -> Result<()> {
    let problem = validate_problem(args)?;
    let store = Store::open(config.database_path()).await?;
    let id = store.add_problem(&problem).await?;
    print_success(&format!(
        "Added problem #{} '{}' ({})",
        id, problem.title, problem.priority
    ));
    if problem.priority < ProblemPriority::High {
        print_info("Only high and critical problems seed automated generation.");
    }
    Ok(())
}

pub async fn list_problems(config: &AppConfig, limit: usize) -> Result<()> {
    let store = Store::open(config.database_path()).await?;
    let problems = store.list_problems(limit).await?;
    if problems.is_empty() {
        print_info("No problems registered.");
        return Ok(());
    }
    for p in problems {
        let state = if p.solved {
            style("solved").dim()
        } else {
            style("open").green()
        };
        println!(
            "#{:<4} {:<9} {:<7} {}  {}",
            p.id,
            p.priority,
            state,
            style(&p.title).bold(),
            style(&p.domain).dim()
        );
    }
    Ok(())
}

pub async fn solve_problem(config: &AppConfig, id: i64) -> Result<()> {
    let store = Store::open(config.database_path()).await?;
    if !store.mark_problem_solved(id).await? {
        bail!("Problem #{} not found", id);
    }
    print_success(&format!("Problem #{} marked solved", id));
    Ok(())
}
