//! TSVA CLI - Command-line interface
//!
//! Usage:
//!   tsva analyze <video> [--prompt <text> | --prompt-file <path>]
//!   tsva ask <question>
//!   tsva index <captions.json>
//!   tsva search <query> [-k N]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tsva_core::AppConfig;
use tsva_rag::SceneAnalyzer;

#[derive(Parser)]
#[command(name = "tsva")]
#[command(about = "Traffic Scene Violation Analyzer CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample, caption and index a traffic video
    Analyze {
        /// Video file
        video: PathBuf,

        /// Instruction for the vision-language model
        #[arg(long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the instruction from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Print every caption as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },
    /// Ask a question about the analyzed video
    Ask {
        /// Question to ask
        question: String,
    },
    /// Build and save the index from a caption file
    Index {
        /// JSON array of caption records
        captions: PathBuf,
    },
    /// Show the captions nearest to a query
    Search {
        query: String,

        /// Number of results
        #[arg(short, long)]
        k: Option<usize>,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.clone()).context("Failed to load configuration")?;
    init_tracing(&config);

    let mut analyzer = SceneAnalyzer::from_config(&config)?;

    match cli.command {
        Commands::Analyze {
            video,
            prompt,
            prompt_file,
            json,
        } => {
            let prompt = match prompt_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => prompt,
            };

            let report = analyzer.analyze_video(&video, prompt.as_deref()).await?;
            if report.fps_fallback {
                eprintln!(
                    "warning: frame rate unavailable, timestamps assume {} fps",
                    report.fps
                );
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report.records)?);
            } else {
                println!("{}\n", report.status);
                println!("{}", report.summary);
            }
        }
        Commands::Ask { question } => {
            if !analyzer.restore()? {
                anyhow::bail!("No saved index found; run `tsva analyze` or `tsva index` first");
            }
            let answer = analyzer.ask(&question).await?;
            println!("{answer}");
        }
        Commands::Index { captions } => {
            let count = analyzer.index_captions(&captions).await?;
            println!(
                "Indexed {count} captions into {}",
                config.index.index_path.display()
            );
        }
        Commands::Search { query, k } => {
            if !analyzer.restore()? {
                anyhow::bail!("No saved index found; run `tsva analyze` or `tsva index` first");
            }
            let top_k = k.unwrap_or(config.index.default_top_k);
            for hit in analyzer.search(&query, top_k).await? {
                println!(
                    "{:.4}  [{}] {}  ({})",
                    hit.distance,
                    hit.record.timestamp(),
                    hit.record.caption(),
                    hit.record.image_id()
                );
            }
        }
    }

    Ok(())
}
