//! evo — developer workflow helper.
//!
//! Conventional commits, make target passthrough, and interactive test
//! loops that re-run a single test whenever its file is saved.

mod commands;
mod config;
mod finder;
mod style;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use commands::test_loop::TestLoopArgs;
use style::Palette;

/// evo — developer workflow helper
#[derive(Parser)]
#[command(name = "evo", version, about = "Developer workflow helper: commits, make targets and test loops")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Commit staged changes with a conventional, branch-prefixed message
    Cm {
        /// Skip the pre-commit and pre-push hooks
        #[arg(long)]
        no_verify: bool,

        /// Commit message words
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Run a test class or method, re-running it when its file is saved
    #[command(visible_alias = "tl")]
    TestLoop {
        /// Test class or test method name
        name: String,

        /// Project directory containing testing/ or tests/
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Restart on the configured hotkey instead of file writes
        #[arg(long)]
        hotkey: bool,

        /// Keep earlier runs alive when restarting
        #[arg(long)]
        overlap: bool,
    },

    /// List make targets
    Targets,

    /// Get inspired by a random quote
    Inspire,

    /// Any other subcommand runs as a make target
    #[command(external_subcommand)]
    Make(Vec<String>),
}

fn init_tracing(verbose: bool) {
    let (default_filter, with_target) = if verbose {
        ("evo=debug,evo_cli=debug,evo_core=debug", true)
    } else {
        ("evo=warn,evo_cli=warn,evo_core=warn", false)
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(with_target)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Load config file.
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config::default_path().to_string_lossy().to_string());
    let cfg = config::Config::load(&config_path).unwrap_or_else(|e| {
        warn!("{e:#}, using defaults");
        config::Config::default()
    });

    let palette = Palette::detect(cli.no_color);

    let result = match cli.command {
        Command::Cm { no_verify, message } => {
            commands::commit::run(&message, no_verify, palette).await
        }
        Command::TestLoop { name, dir, hotkey, overlap } => {
            let args = TestLoopArgs { name, dir, hotkey, overlap };
            commands::test_loop::run(args, &cfg, palette).await
        }
        Command::Targets => commands::make::run_list(&cfg.makefile_path, palette),
        Command::Inspire => commands::inspire::run(palette),
        Command::Make(target_and_args) => {
            commands::make::run_target(&cfg.makefile_path, &target_and_args).await
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("evo: {e:#}");
            std::process::exit(1);
        }
    }
}
