mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quest")]
#[command(about = "Quest CLI - Run learner submissions through the execution core", long_about = None)]
struct Cli {
    /// Executor config file (defaults to config/executor.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a source file and print the JSON response
    Run {
        /// Source file, or - for stdin
        file: PathBuf,

        /// Language (python, javascript, java, csharp, or selenium)
        #[arg(short, long)]
        language: String,

        /// Concrete language when --language is selenium
        #[arg(short, long)]
        sub_language: Option<String>,

        /// Test framework (e.g. pytest, unittest, Cucumber, TestNG)
        #[arg(short, long)]
        framework: Option<String>,

        /// Run through the framework executor
        #[arg(long, default_value = "false")]
        framework_run: bool,
    },

    /// Execute a request payload in the frontend JSON format
    Request {
        /// JSON file, or - for stdin
        file: PathBuf,
    },

    /// Check which configured toolchains are available
    Toolchains,

    /// Write a default executor config
    Init {
        /// Project path
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing config
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Logs go to stderr; stdout carries the JSON response
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Run {
            file,
            language,
            sub_language,
            framework,
            framework_run,
        } => {
            let options = commands::RunOptions {
                language,
                sub_language,
                framework,
                framework_run,
            };
            commands::run_file(cli.config.as_deref(), &file, options).await?;
        }
        Commands::Request { file } => {
            commands::run_request(cli.config.as_deref(), &file).await?;
        }
        Commands::Toolchains => {
            commands::check_toolchains(cli.config.as_deref()).await?;
        }
        Commands::Init { path, force } => {
            commands::init_config(&path, force)?;
        }
    }

    Ok(())
}
