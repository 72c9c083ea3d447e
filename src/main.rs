//! # creview CLI
//!
//! ## Usage
//!
//! ```bash
//! creview --config ./config/creview.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `creview review <file>` | Retrieval-augmented review of one file |
//! | `creview agents <file>` | Multi-agent review over `g*.json` guideline subsets |
//! | `creview match <file>` | Print the guidelines retrieved for each chunk |
//! | `creview chunks <file>` | Print chunk boundaries |
//! | `creview guidelines list` | Print the guideline store |
//! | `creview serve` | Start the guideline editing API |
//!
//! Logs go to stderr (`RUST_LOG` controls the level); results go to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use creview::config::{self, Config};
use creview::guidelines::{load_subset_dir, JsonGuidelineStore};
use creview::review::{review_source_with_agents, ReviewSettings, Reviewer};
use creview::{embedding, llm, report, server, source};
use creview_core::chunk::chunk_source;
use creview_core::index::Matcher;
use creview_core::models::Report;
use creview_core::store::GuidelineStore;
use creview_core::ReviewError;

/// Guideline-driven review of C source files.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "creview",
    about = "creview — guideline-driven review of C source files",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/creview.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a file against the guidelines retrieved for each chunk.
    ///
    /// Writes the JSON report to `[report].json_path` (or `--output`) and
    /// prints a one-line summary.
    Review {
        /// Path to a `.c` or `.h` file.
        file: PathBuf,

        /// Model identifier; overrides `[llm].model`.
        #[arg(long)]
        model: Option<String>,

        /// JSON report path; overrides `[report].json_path`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write an HTML report here; overrides `[report].html_path`.
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Review a file with one concurrent agent per guideline subset file.
    Agents {
        /// Path to a `.c` or `.h` file.
        file: PathBuf,

        /// Directory holding `g*.json` subsets; overrides `[guidelines].agents_dir`.
        #[arg(long)]
        guidelines_dir: Option<PathBuf>,

        /// Model identifier; overrides `[llm].model`.
        #[arg(long)]
        model: Option<String>,

        /// JSON report path; overrides `[report].json_path`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the top-ranked guidelines for each chunk. No model calls.
    Match {
        /// Path to a `.c` or `.h` file.
        file: PathBuf,

        /// Guidelines per chunk; overrides `[retrieval].top_k`.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print the chunks a file is split into.
    Chunks {
        /// Path to a `.c` or `.h` file.
        file: PathBuf,
    },

    /// Inspect the guideline store.
    Guidelines {
        #[command(subcommand)]
        action: GuidelinesAction,
    },

    /// Start the guideline editing HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum GuidelinesAction {
    /// List all guidelines.
    List,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Load the config file, or fall back to defaults when it does not exist.
fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

async fn build_matcher(cfg: &Config, top_k: usize) -> anyhow::Result<Matcher> {
    let store = JsonGuidelineStore::new(cfg.guidelines.path.clone());
    let records = store.load_all()?;
    let provider = embedding::create_provider(&cfg.embedding)?;
    let matcher = Matcher::build_batched(records, provider, top_k, cfg.embedding.batch_size)
        .await
        .context("Failed to build guideline index")?;
    Ok(matcher)
}

fn print_summary(report: &Report, json_path: &Path) {
    println!(
        "Reviewed {}: {} chunks, {} remarks, {} referenced files → {}",
        report.file,
        report.summary.chunks_reviewed,
        report.summary.total_remarks,
        report.summary.referenced_files,
        json_path.display()
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = format!("{:#}", err);
            let input = err
                .downcast_ref::<ReviewError>()
                .is_some_and(ReviewError::is_input_error);
            if input {
                tracing::error!(error = %message, "invalid input");
            } else {
                tracing::error!(error = %message, "command failed");
            }
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Review {
            file,
            model,
            output,
            html,
        } => {
            let text = source::read_source(&file)?;
            let matcher = build_matcher(&cfg, cfg.retrieval.top_k).await?;
            let caller = llm::create_caller(&cfg.llm)?;
            let settings = ReviewSettings::from_config(&cfg).with_model(model);
            let reviewer = Reviewer::new(matcher, caller, settings);

            let report = reviewer
                .review_source(&file.display().to_string(), &text)
                .await?;

            let json_path = output.unwrap_or_else(|| cfg.report.json_path.clone());
            report::write_json(&report, &json_path)?;
            if let Some(html_path) = html.or_else(|| cfg.report.html_path.clone()) {
                report::write_html(&report, &html_path)?;
            }
            print_summary(&report, &json_path);
        }
        Commands::Agents {
            file,
            guidelines_dir,
            model,
            output,
        } => {
            let text = source::read_source(&file)?;
            let dir = guidelines_dir.unwrap_or_else(|| cfg.guidelines.agents_dir.clone());
            let subsets = load_subset_dir(&dir)?;
            let caller = llm::create_caller(&cfg.llm)?;
            let settings = ReviewSettings::from_config(&cfg).with_model(model);

            let label = file.display().to_string();
            let report =
                review_source_with_agents(&label, &text, &subsets, caller, &settings).await?;

            let json_path = output.unwrap_or_else(|| cfg.report.json_path.clone());
            report::write_json(&report, &json_path)?;
            print_summary(&report, &json_path);
        }
        Commands::Match { file, top_k } => {
            let text = source::read_source(&file)?;
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            let matcher = build_matcher(&cfg, top_k).await?;
            for unit in chunk_source(&text, cfg.chunking.window_lines) {
                println!(
                    "chunk {} (line {}, {}):",
                    unit.index,
                    unit.start_line,
                    unit.origin.as_str()
                );
                for m in matcher.match_chunk(&unit.text).await? {
                    println!(
                        "  {:.4}  {} [{}] {}",
                        m.score, m.guideline.id, m.guideline.severity, m.guideline.rule
                    );
                }
            }
        }
        Commands::Chunks { file } => {
            let text = source::read_source(&file)?;
            let units = chunk_source(&text, cfg.chunking.window_lines);
            for unit in &units {
                println!(
                    "chunk {}  line {}  {} lines  {}",
                    unit.index,
                    unit.start_line,
                    unit.line_count(),
                    unit.origin.as_str()
                );
            }
            println!("{} chunks", units.len());
        }
        Commands::Guidelines {
            action: GuidelinesAction::List,
        } => {
            let store = JsonGuidelineStore::new(cfg.guidelines.path.clone());
            let records = store.load_all()?;
            for g in &records {
                println!("{}  [{}]  {}  {}", g.id, g.severity, g.category, g.rule);
            }
            println!("{} guidelines", records.len());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
