
use e2e_harness::{TestResult, Workspace};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn version_and_help_need_no_configuration() -> TestResult<()> {
    let workspace = Workspace::new("http://127.0.0.1:9/v1")?;

    let version = workspace.cli(&["--version"])?;
    assert!(version.status.success());
    assert!(stdout(&version).contains(env!("CARGO_PKG_VERSION")));

    let help = workspace.cli(&["help"])?;
    assert!(help.status.success());
    assert!(stdout(&help).contains("serve"));
    Ok(())
}

#[test]
fn unknown_command_exits_non_zero() -> TestResult<()> {
    let workspace = Workspace::new("http://127.0.0.1:9/v1")?;
    let out = workspace.cli(&["levitate"])?;
    assert!(!out.status.success());
    Ok(())
}

#[test]
fn problems_and_logs_work_offline() -> TestResult<()> {
    let workspace = Workspace::new("http://127.0.0.1:9/v1")?;

    let empty = workspace.cli(&["logs"])?;
    assert!(empty.status.success());
    assert!(stdout(&empty).contains("No automation log entries"));

    let added = workspace.cli(&[
        "problem",
        "add",
        "--title",
        "Cold chain routing",
        "--description",
        "Keep vaccines below 8C",
        "--domain",
        "Healthcare",
    ])?;
    assert!(added.status.success());
    assert!(stdout(&added).contains("Cold chain routing"));

    let bad = workspace.cli(&[
        "problem",
        "add",
        "--title",
        "x",
        "--description",
        "y",
        "--priority",
        "urgent",
    ])?;
    assert!(!bad.status.success());

    let listed = workspace.cli(&["problem", "list"])?;
    assert!(listed.status.success());
    let text = stdout(&listed);
    assert!(text.contains("Cold chain routing"));
    assert!(text.contains("high"));

    let solved = workspace.cli(&["problem", "solve", "1"])?;
    assert!(solved.status.success());
    assert!(stdout(&workspace.cli(&["problem", "list"])?).contains("solved"));

    let missing = workspace.cli(&["problem", "solve", "404"])?;
    assert!(!missing.status.success());
    Ok(())
}

#[test]
fn run_without_api_key_fails_fast() -> TestResult<()> {
    let workspace = Workspace::new("http://127.0.0.1:9/v1")?;
    let config = std::fs::read_to_string(&workspace.config_path)?
        .replace("api_key = \"test-key\"\n", "");
    std::fs::write(&workspace.config_path, config)?;

    let out = workspace.cli(&["run", "generate"])?;
    assert!(!out.status.success());
    Ok(())
}
