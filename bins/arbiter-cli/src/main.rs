mod commands;

use anyhow::Result;
use arbiter_common::types::Verdict;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arbiter-cli")]
#[command(
    about = "Arbiter CLI - Judge solutions locally and check the problem catalog",
    long_about = None
)]
struct Cli {
    /// Problem catalog (JSON)
    #[arg(long, global = true, env = "CATALOG_PATH", default_value = "config/problems.json")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge a source file against a problem's test cases
    Judge {
        /// Problem id (e.g., two-sum)
        #[arg(short, long)]
        problem: String,

        /// Source file with the solution
        #[arg(short, long)]
        file: PathBuf,

        /// Language (java, python, cpp); inferred from the extension when omitted
        #[arg(short, long)]
        language: Option<String>,

        /// Per-case timeout in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Print the judgement as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print the starter template of a problem
    Template {
        #[arg(short, long)]
        problem: String,

        #[arg(short, long)]
        language: String,
    },

    /// Check that every reference solution is accepted
    Validate,

    /// Show the normalized form of a solution method
    Normalize {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        language: Option<String>,

        /// Method name to extract
        #[arg(short, long)]
        entry_point: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Judge {
            problem,
            file,
            language,
            timeout_ms,
            json,
        } => {
            let verdict = commands::judge_file(
                &cli.catalog,
                &problem,
                &file,
                language.as_deref(),
                timeout_ms,
                json,
            )
            .await?;
            if verdict != Verdict::Accepted {
                std::process::exit(1);
            }
        }
        Commands::Template { problem, language } => {
            commands::print_template(&cli.catalog, &problem, &language)?;
        }
        Commands::Validate => {
            commands::validate(&cli.catalog).await?;
        }
        Commands::Normalize {
            file,
            language,
            entry_point,
        } => {
            commands::print_normalized(&file, language.as_deref(), &entry_point)?;
        }
    }

    Ok(())
}
