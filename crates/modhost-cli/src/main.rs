//! Command-line interface for the modhost module system.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modhost_core::{env_vars, HostConfig, ModuleHost};

/// modhost - load and manage native modules.
#[derive(Parser, Debug)]
#[command(name = "modhost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Host configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print a module's descriptor without initializing it.
    Inspect {
        /// Path to the module library.
        path: PathBuf,

        /// Print JSON.
        #[arg(long)]
        json: bool,
    },

    /// Load modules in order, list them, then unload everything.
    Load {
        /// Module libraries, dependencies first.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print JSON.
        #[arg(long)]
        json: bool,
    },

    /// Load modules and keep them running until Ctrl-C.
    Run {
        /// Extra module directories to scan.
        #[arg(short, long)]
        dir: Vec<PathBuf>,

        /// Module libraries to load after the directories.
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Inspect { path, json } => inspect(config, &path, json),
        Command::Load { paths, json } => load(config, &paths, json),
        Command::Run { dir, paths } => run(config, dir, &paths).await,
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested (for production/container environments)
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "modhost_core={level},modhost={level},warn",
            level = default_level
        ))
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<HostConfig> {
    let config = match path {
        Some(path) => HostConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HostConfig::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid environment override")
}

fn inspect(config: HostConfig, path: &Path, json: bool) -> Result<()> {
    let host = ModuleHost::new(config)?;
    let descriptor = host
        .inspect_module(path)
        .with_context(|| format!("Failed to inspect {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
        return Ok(());
    }

    println!("Name:         {}", descriptor.name);
    println!("Version:      {}", descriptor.version);
    println!("Type:         {}", descriptor.module_type);
    println!("Author:       {}", descriptor.author);
    println!("Description:  {}", descriptor.description);
    if descriptor.dependencies.is_empty() {
        println!("Dependencies: (none)");
    } else {
        println!("Dependencies: {}", descriptor.dependencies.join(", "));
    }
    match &descriptor.host_requirement {
        Some(req) => println!("Requires:     host {}", req),
        None => println!("Requires:     any host"),
    }
    Ok(())
}

fn load(config: HostConfig, paths: &[PathBuf], json: bool) -> Result<()> {
    let host = ModuleHost::new(config)?;
    for path in paths {
        host.load_module(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
    }

    print_modules(&host, json)?;

    host.shutdown_all()?;
    Ok(())
}

async fn run(config: HostConfig, extra_dirs: Vec<PathBuf>, paths: &[PathBuf]) -> Result<()> {
    let host = ModuleHost::new(config)?;

    for (dir, result) in host.load_configured_dirs() {
        report_directory(&dir, result);
    }
    for dir in extra_dirs {
        let result = host.load_directory(&dir);
        report_directory(&dir, result);
    }
    for path in paths {
        if let Err(e) = host.load_module(path) {
            tracing::error!(path = %path.display(), error = %e, "Failed to load module");
        }
    }

    print_modules(&host, false)?;
    println!("\nPress Ctrl-C to unload all modules and exit.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    host.shutdown_all()?;
    Ok(())
}

fn report_directory(
    dir: &Path,
    result: std::result::Result<modhost_core::DirectoryLoadReport, modhost_core::LoadError>,
) {
    match result {
        Ok(report) => {
            for (path, e) in &report.failed {
                tracing::warn!(path = %path.display(), error = %e, "Module skipped");
            }
            tracing::info!(
                dir = %dir.display(),
                loaded = report.loaded.len(),
                failed = report.failed.len(),
                "Directory scanned"
            );
        }
        Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "Cannot scan module directory"),
    }
}

fn print_modules(host: &ModuleHost, json: bool) -> Result<()> {
    let modules = host.module_summaries();
    if json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    if modules.is_empty() {
        println!("No modules loaded.");
        return Ok(());
    }

    println!("{:<24} {:<10} {:<10} {:<14} DEPENDENCIES", "NAME", "VERSION", "TYPE", "STATE");
    for module in modules {
        let desc = &module.descriptor;
        println!(
            "{:<24} {:<10} {:<10} {:<14} {}",
            desc.name,
            desc.version.to_string(),
            desc.module_type.as_str(),
            module.state.as_str(),
            desc.dependencies.join(", ")
        );
    }
    Ok(())
}
