use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contextweave::cli::CommandContext;
use contextweave::cli::commands::{self, demo::DemoArgs, load::LoadArgs, load::LoadFlags};
use contextweave::types::{DocumentType, WeaveError};

#[derive(Parser)]
#[command(name = "contextweave")]
#[command(
    version,
    about = "Context budgeting and assembly for LLM-generated project documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this file only (skips global/project layering)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the context payload for a target document
    Load {
        #[arg(help = "Project identifier")]
        project: String,
        #[arg(long, short, default_value = "other", help = "Target document type")]
        target: DocumentType,
        #[command(flatten)]
        flags: LoadFlags,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, payload"
        )]
        format: String,
        #[arg(long, short, help = "Write the assembled payload to this file")]
        output: Option<PathBuf>,
    },

    /// Import markdown documents into the document store
    Import {
        #[arg(help = "Project identifier")]
        project: String,
        #[arg(required = true, help = "Glob patterns, e.g. 'docs/**/*.md'")]
        patterns: Vec<String>,
    },

    /// Run the pipeline against a synthetic corpus
    Demo {
        #[arg(short = 'n', long, default_value = "500", help = "Number of documents")]
        documents: usize,
        #[arg(long, default_value = "42", help = "Corpus seed")]
        seed: u64,
        #[arg(long, short, default_value = "risk-register", help = "Target document type")]
        target: DocumentType,
        #[command(flatten)]
        flags: LoadFlags,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, payload"
        )]
        format: String,
    },

    /// List configured providers and their input budgets
    Providers {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mContextWeave encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Default hook prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Tag errors that belong to the load-issue taxonomy
            let message = match e.downcast_ref::<WeaveError>().and_then(|w| w.issue_kind()) {
                Some(kind) => kind.tag(&e),
                None => e.to_string(),
            };
            eprintln!("\x1b[31mError:\x1b[0m {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Path and init must work even when the current config is invalid
    match cli.command {
        Commands::Config {
            action: ConfigAction::Path,
        } => commands::config::path(&cli.root)?,
        Commands::Config {
            action: ConfigAction::Init { global, force },
        } => {
            if global {
                commands::config::init_global(force)?;
            } else {
                commands::config::init_project(&cli.root, force)?;
            }
        }
        command => {
            let ctx = CommandContext::load(&cli.root, cli.config.as_deref())?;
            run_command(&ctx, command)?;
        }
    }
    Ok(())
}

fn run_command(ctx: &CommandContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Load {
            project,
            target,
            flags,
            format,
            output,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::load::run(
                ctx,
                LoadArgs {
                    project,
                    target,
                    flags,
                    format,
                    output,
                },
            ))?;
        }
        Commands::Import { project, patterns } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::import::run(ctx, &project, &patterns))?;
        }
        Commands::Demo {
            documents,
            seed,
            target,
            flags,
            format,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::demo::run(
                ctx,
                DemoArgs {
                    documents,
                    seed,
                    target,
                    flags,
                    format,
                },
            ))?;
        }
        Commands::Providers { format } => {
            commands::providers::run(ctx, &format)?;
        }
        Commands::Config { action } => {
            if let ConfigAction::Show { global, format } = action {
                commands::config::show(ctx, global, &format)?;
            }
        }
    }
    Ok(())
}
