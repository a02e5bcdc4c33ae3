mod display;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use pipewarden_core::{
    resolve_selection, ConfigStore, LocalConnector, RuleCatalog, ScanContext, ScanOutcome,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "pipewarden",
    version,
    about = "Pipewarden — CI/CD pipeline compliance scanner",
    long_about = "Scan GitHub Actions, GitLab CI and JFrog pipeline definitions \
                  against a catalog of compliance rules."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate pipelines against the compliance rule catalog
    Validate {
        /// Local directory to scan instead of previously fetched snapshots
        path: Option<PathBuf>,

        /// Output format (pretty, csv)
        #[arg(short, long, default_value = "pretty")]
        output: String,

        /// Run default rules only, ignoring any stored entitlement token
        #[arg(long)]
        ignore_token: bool,
    },

    /// Read or write persistent configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Store a configuration value (e.g. the entitlement token)
    Set { key: String, value: String },
    /// Print a configuration value
    Get { key: String },
    /// Remove a configuration value
    Clear { key: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(violations_found) => {
            if violations_found {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Validate {
            path,
            output,
            ignore_token,
        } => cmd_validate(path, &output, ignore_token),
        Commands::Config { command } => {
            cmd_config(command)?;
            Ok(false)
        }
    }
}

fn cmd_validate(path: Option<PathBuf>, output: &str, ignore_token: bool) -> Result<bool> {
    let store = ConfigStore::new()?;
    let catalog = RuleCatalog::new(store.clone());
    catalog.sync_defaults()?;
    let selection = resolve_selection(&store, ignore_token)?;

    let context = match path {
        Some(path) => {
            let data = LocalConnector::new(path)?.collect()?;
            ScanContext::from_local(data, catalog, selection)
        }
        None => ScanContext::from_snapshots(&store, catalog, selection)?,
    };

    let outcome = context.run()?;
    render(&outcome, output)?;
    Ok(outcome.violations_found())
}

fn render(outcome: &ScanOutcome, output: &str) -> Result<()> {
    match output {
        "pretty" => display::print_outcome(outcome),
        "csv" => display::print_csv(outcome)?,
        other => anyhow::bail!("unknown output format '{other}' (expected pretty or csv)"),
    }
    Ok(())
}

fn cmd_config(command: ConfigCommands) -> Result<()> {
    let store = ConfigStore::new()?;
    match command {
        ConfigCommands::Set { key, value } => store.set(&key, &value)?,
        ConfigCommands::Get { key } => match store.get(&key)? {
            Some(value) => println!("{value}"),
            None => println!("{key} is not set"),
        },
        ConfigCommands::Clear { key } => store.clear(&key)?,
    }
    Ok(())
}
