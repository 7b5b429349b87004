use std::sync::Arc;

/// Reset SIGPIPE to default behavior so piping (e.g. `sqlprov list | head`) exits cleanly
/// instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use sqlprov::admin::http::HttpSqlAdminClient;
use sqlprov::admin::SqlAdminApi;
use sqlprov::config::parser::load_config;
use sqlprov::config::types::{ScriptSpec, YamlConfig};
use sqlprov::config::validator::{resolve_scripts, PROJECT_ENV};
use sqlprov::executor::parallel::{apply_plan, execute_destroy};
use sqlprov::output::formatter;
use sqlprov::planner::plan::ExecutionPlan;
use sqlprov::provision::Provisioner;
use sqlprov::state::lock::InstanceLockManager;
use sqlprov::state::store::StateStore;

/// sqlprov - run one-shot SQL provision scripts against managed database instances
#[derive(Parser)]
#[command(name = "sqlprov", version, about, long_about = None)]
struct Cli {
    /// Path to config directory or YAML file
    #[arg(short, long, default_value = ".")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Working directory for state (overrides settings.working_dir)
    #[arg(short, long)]
    working_dir: Option<String>,

    /// Maximum number of scripts executed at once (overrides settings.parallelism)
    #[arg(short, long)]
    parallelism: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the working directory and state database
    Init,

    /// Validate configuration without contacting the API
    Validate,

    /// Show which scripts would run, change, or be forgotten
    Plan,

    /// Run pending scripts
    Apply {
        /// Apply only specific script address(es)
        #[arg(short, long)]
        target: Vec<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// Forget tracked scripts. Their remote effects are left in place.
    Destroy {
        /// Forget only specific script address(es)
        #[arg(short, long)]
        target: Vec<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },

    /// List tracked scripts
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => cmd_init(&cli),
        Commands::Validate => cmd_validate(&cli),
        Commands::Plan => cmd_plan(&cli),
        Commands::Apply {
            ref target,
            auto_approve,
        } => cmd_apply(&cli, target, auto_approve).await,
        Commands::Destroy {
            ref target,
            auto_approve,
        } => cmd_destroy(&cli, target, auto_approve),
        Commands::List => cmd_list(&cli),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn load_specs(cli: &Cli) -> Result<(YamlConfig, Vec<ScriptSpec>)> {
    let config = load_config(&cli.config)?;
    let env_project = std::env::var(PROJECT_ENV).ok();
    let specs = resolve_scripts(&config, env_project.as_deref())?;
    Ok((config, specs))
}

/// Working directory: CLI flag, then config settings, then the default.
fn working_dir(cli: &Cli, config: Option<&YamlConfig>) -> String {
    if let Some(dir) = &cli.working_dir {
        return dir.clone();
    }
    match config {
        Some(c) => c.project.settings.working_dir.clone(),
        None => load_config(&cli.config)
            .map(|c| c.project.settings.working_dir)
            .unwrap_or_else(|_| ".sqlprov".to_string()),
    }
}

fn open_store(working_dir: &str) -> Result<StateStore> {
    let store = StateStore::open(working_dir)?;
    store.initialize()?;
    Ok(store)
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("\n{} Only '{}' will be accepted.", prompt, "yes".bold());
    print!("  Enter a value: ");
    use std::io::Write;
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "yes")
}

// ─── Commands ────────────────────────────────────────────────────────────────

fn cmd_init(cli: &Cli) -> Result<()> {
    let dir = working_dir(cli, None);
    open_store(&dir)?;
    formatter::print_success(&format!("Initialized state in {}", dir));
    Ok(())
}

fn cmd_validate(cli: &Cli) -> Result<()> {
    let (config, specs) = load_specs(cli)?;
    formatter::print_success(&format!(
        "Configuration '{}' is valid ({} script(s)).",
        config.project.name,
        specs.len()
    ));
    Ok(())
}

fn cmd_plan(cli: &Cli) -> Result<()> {
    let (config, specs) = load_specs(cli)?;
    let store = open_store(&working_dir(cli, Some(&config)))?;
    let plan = ExecutionPlan::build(&specs, &store.list_scripts()?);
    formatter::print_plan(&plan);
    Ok(())
}

async fn cmd_apply(cli: &Cli, targets: &[String], auto_approve: bool) -> Result<()> {
    let (config, specs) = load_specs(cli)?;
    let settings = &config.project.settings;
    let store = open_store(&working_dir(cli, Some(&config)))?;

    let plan = ExecutionPlan::build(&specs, &store.list_scripts()?);
    formatter::print_plan(&plan);
    if !plan.has_changes() {
        return Ok(());
    }

    if !auto_approve && !confirm("Do you want to perform these actions?")? {
        println!("\n{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    let token = std::env::var(&settings.access_token_env).ok();
    if token.is_none() {
        tracing::warn!(
            env = settings.access_token_env.as_str(),
            "No access token set, calling the API unauthenticated"
        );
    }
    let admin: Arc<dyn SqlAdminApi> = Arc::new(
        HttpSqlAdminClient::with_base_url(&settings.api_endpoint, token)
            .context("Failed to create admin API client")?,
    );
    let locks = Arc::new(InstanceLockManager::new());
    let provisioner = Arc::new(Provisioner::new(
        admin,
        locks,
        settings.provision_timeouts(),
    ));

    let parallelism = cli.parallelism.unwrap_or(settings.parallelism);
    let summary = apply_plan(provisioner, &store, &plan, parallelism, targets).await?;
    formatter::print_apply_summary(&summary);

    if summary.failed > 0 {
        bail!("{} script(s) failed", summary.failed);
    }
    Ok(())
}

fn cmd_destroy(cli: &Cli, targets: &[String], auto_approve: bool) -> Result<()> {
    let store = open_store(&working_dir(cli, None))?;
    let count = store.list_scripts()?.len();
    if count == 0 {
        println!("{}", "No scripts in state.".dimmed());
        return Ok(());
    }

    if !auto_approve
        && !confirm("Forget tracked scripts? Remote effects are abandoned, not reverted.")?
    {
        println!("\n{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    let forgotten = execute_destroy(&store, targets)?;
    for address in &forgotten {
        formatter::print_success(&format!("{}: forgotten", address));
    }
    println!("\nDestroy complete! Scripts: {} forgotten.", forgotten.len());
    Ok(())
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let store = open_store(&working_dir(cli, None))?;
    formatter::print_script_list(&store.list_scripts()?);
    Ok(())
}
