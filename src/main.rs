//! Stack teardown CLI entrypoint.
//!
//! This is the main entrypoint for the stack-teardown command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stack_teardown::backend::{CloudFormationBackend, ResourceBackend};
use stack_teardown::cli::{
    Cli, Commands, LogFormat, OutputFormatter, Presence, StackPresence,
};
use stack_teardown::config::{find_config_file, ConfigParser, ConfigValidator, TeardownConfig};
use stack_teardown::error::{Result, TeardownError};
use stack_teardown::handler::SelfDestructHandler;
use stack_teardown::teardown::TokioClock;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Word the operator must type to confirm a run.
const CONFIRMATION_WORD: &str = "destroy";

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force).map(|()| ExitCode::SUCCESS),
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Plan => cmd_plan(config_path, &formatter).map(|()| ExitCode::SUCCESS),
        Commands::Status => cmd_status(config_path, &formatter)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Run { yes, expect_plan } => {
            cmd_run(config_path, yes, expect_plan.as_deref(), &formatter).await
        }
    }
}

/// Write a starter configuration.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing teardown configuration in: {}", path.display());

    let config_path = path.join("teardown.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/teardown.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let missing: Vec<&str> = [".env", ".teardown/"]
            .into_iter()
            .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
            .collect();

        if !missing.is_empty() {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Stack teardown")?;
            for entry in missing {
                writeln!(file, "{entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".env\n.teardown/\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nNext steps:");
    eprintln!("  1. Edit teardown.yaml with your stack names");
    eprintln!("  2. Run 'stack-teardown validate' to check your configuration");
    eprintln!("  3. Run 'stack-teardown plan' to see what will be destroyed");
    eprintln!("  4. Run 'stack-teardown run' to destroy the stacks");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&Path>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let result = ConfigValidator::new().check(&config);

    print_stdout(&formatter.format_validation(&result, show_warnings))?;

    Ok(if result.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Show the teardown plan.
fn cmd_plan(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<()> {
    let config = load_valid_config(config_path)?;
    let plan = stack_teardown::planner::TeardownPlanner::new(&config.stacks).plan();

    print_stdout(&formatter.format_plan(&plan))
}

/// Show which planned stacks still exist.
async fn cmd_status(config_path: Option<&Path>, formatter: &OutputFormatter) -> Result<()> {
    let config = load_valid_config(config_path)?;
    let plan = stack_teardown::planner::TeardownPlanner::new(&config.stacks).plan();
    let backend = CloudFormationBackend::new(config.backend.region.as_deref()).await;

    let labelled = plan
        .stacks
        .iter()
        .map(|p| (p.slot.to_string(), &p.stack))
        .chain(
            plan.self_stack
                .iter()
                .map(|stack| (String::from("self"), stack)),
        );

    let mut stacks = Vec::with_capacity(plan.len());
    for (slot, stack) in labelled {
        let presence = match backend.exists(stack).await {
            Ok(true) => Presence::Present,
            Ok(false) => Presence::Absent,
            Err(e) => {
                warn!("Could not check stack {stack}: {e}");
                Presence::Unknown(e.to_string())
            }
        };
        stacks.push(StackPresence {
            slot,
            stack: stack.clone(),
            presence,
        });
    }

    print_stdout(&formatter.format_status(&stacks))
}

/// Run the self-destruct sequence.
async fn cmd_run(
    config_path: Option<&Path>,
    auto_approve: bool,
    expect_plan: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config = load_valid_config(config_path)?;
    let backend = CloudFormationBackend::new(config.backend.region.as_deref()).await;
    let clock = TokioClock::new();
    let handler = SelfDestructHandler::new(&config, &backend, &clock);

    let plan = handler.plan();
    if plan.is_empty() {
        eprintln!("No stacks configured. Nothing to destroy.");
        return Ok(ExitCode::SUCCESS);
    }

    let fingerprint = plan.fingerprint();
    if let Some(expected) = expect_plan {
        if expected != fingerprint {
            return Err(TeardownError::internal(format!(
                "Plan fingerprint mismatch: expected {expected}, got {fingerprint}"
            )));
        }
    }

    eprintln!("{}", formatter.format_plan(&plan));

    if !auto_approve {
        eprint!("\nThis action is IRREVERSIBLE. Type '{CONFIRMATION_WORD}' to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != CONFIRMATION_WORD {
            eprintln!("Teardown cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let report = handler.execute(&plan).await?;
    print_stdout(&formatter.format_report(&report))?;

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Resolves the configuration file: the explicit path, or the nearest
/// `teardown.yaml` upwards from the current directory.
fn resolve_config_path(config_path: Option<&Path>) -> Option<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Some(path.to_path_buf()))
}

/// Loads configuration from file, `.env` and the environment.
fn load_config(config_path: Option<&Path>) -> Result<TeardownConfig> {
    let config_file = resolve_config_path(config_path);
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    debug!("Configuration base directory: {}", base_dir.display());

    let parser = ConfigParser::new().with_base_path(base_dir);
    parser.load_dotenv()?;
    parser.load_with_env(config_file.as_deref())
}

/// Loads configuration and rejects it if invalid.
fn load_valid_config(config_path: Option<&Path>) -> Result<TeardownConfig> {
    let config = load_config(config_path)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    Ok(config)
}

/// Writes command output to stdout.
fn print_stdout(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    stdout.flush()?;
    Ok(())
}
