//! apiplan CLI - compile OpenAPI/Swagger documents into HTTP test plans

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use apiplan_compiler::{compile_document, load_document};
use apiplan_core::{Config, generate_schema, to_http_file};

const CONFIG_FILE: &str = ".apiplan.toml";

#[derive(Parser)]
#[command(name = "apiplan")]
#[command(about = "Generate HTTP-level regression test plans from OpenAPI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Strict mode (warnings fail the run)
    #[arg(long, global = true)]
    strict: bool,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the API document into a test plan
    Plan {
        /// Config file (default: .apiplan.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// API document (overrides `spec` from config)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Also write every scenario as a runnable .http file
        #[arg(long)]
        http_file: Option<PathBuf>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the test plan format
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Plan {
            config,
            spec,
            http_file,
        } => {
            let cfg = match &config {
                Some(path) => Config::load(path)?,
                None => Config::load_default()?,
            };
            let spec_path = spec.unwrap_or_else(|| cfg.spec.clone());

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  spec:     {}", spec_path.display());
                eprintln!("  base_url: {}", cfg.base_url);
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                if !cfg.path_params.is_empty() {
                    eprintln!("  path_params: {} configured", cfg.path_params.len());
                }
                eprintln!();
            }

            let raw = load_document(&spec_path)?;
            let plan = compile_document(&raw, &cfg)
                .with_context(|| format!("cannot model {}", spec_path.display()))?;
            info!(
                operations = plan.operations.len(),
                scenarios = plan.scenario_count(),
                skipped = plan.skipped.len(),
                "compiled test plan"
            );

            // Nothing to plan at all: tool error
            if plan.operations.is_empty() && plan.skipped.is_empty() {
                eprintln!(
                    "Error: No operations found in {}. Check the `paths` section.",
                    spec_path.display()
                );
                return Ok(3);
            }

            match cli.output {
                OutputFormat::Terminal => println!("{}", plan.to_terminal()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Silent => {}
            }

            if let Some(path) = &http_file {
                write_http_file(path, &cfg, &plan)?;
                if cli.output != OutputFormat::Silent {
                    eprintln!("HTTP file: {}", path.display());
                }
            }

            Ok(plan.exit_code(cli.strict))
        }

        Commands::Init => {
            if Path::new(CONFIG_FILE).exists() {
                eprintln!("{CONFIG_FILE} already exists");
                return Ok(1);
            }

            std::fs::write(CONFIG_FILE, Config::example())?;
            println!("Created {CONFIG_FILE}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI document");
            println!("  - base_url: default for {{{{base_url}}}} in .http output");
            println!("  - credentials: tokens for secured operations");
            println!("  - path_params: entity IDs known to exist");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", generate_schema());
            Ok(0)
        }
    }
}

fn write_http_file(path: &Path, cfg: &Config, plan: &apiplan_core::TestPlan) -> Result<()> {
    let content = format!(
        "@base_url = {}\n\n{}",
        cfg.base_url,
        to_http_file(plan, "base_url")
    );
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))
}
