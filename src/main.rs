//! # deep-explorer
//!
//! Command-line front end for the recursive research engine.
//!
//! ## Quick Start
//! ```bash
//! export TAVILY_API_KEY=tvly-...
//! deep-explorer explore "State of WebAssembly component model" --breadth 4 --depth 2
//! deep-explorer entities "GLP-1 obesity drugs in development" --format json -o drugs.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deep_explorer::entity::{EntityObserver, EntityProgress, EntityResearcher, EntitySettings};
use deep_explorer::llm::{ExtractionBackend, RigExtractor};
use deep_explorer::output::{JsonReportWriter, MarkdownReportWriter, ReportWriter};
use deep_explorer::search::{SearchBackend, TavilySearch};
use deep_explorer::{
    Config, ExplorationRequest, Explorer, ProgressObserver, ProgressSnapshot, ReportSynthesizer,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "deep-explorer",
    version,
    about = "Recursive web research with local or hosted LLMs",
    long_about = r#"
deep-explorer plans search queries for a topic, searches the web (Tavily),
distills learnings and follow-up questions with an LLM, and recurses on the
follow-ups with halving breadth until the requested depth is reached.

PREREQUISITES:
  1. TAVILY_API_KEY in the environment or a .env file
  2. Ollama running locally (default) or LLM_PROVIDER=openai with OPENAI_API_KEY
"#
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model to use (overrides LLM_MODEL / OLLAMA_MODEL)
    #[arg(short = 'm', long = "model", global = true)]
    model: Option<String>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recursively research a topic and write a report
    Explore {
        #[arg(value_name = "QUERY")]
        query: String,

        /// Queries planned at the top level; halves at each level
        #[arg(short = 'b', long, default_value_t = 4)]
        breadth: usize,

        /// Levels of recursion
        #[arg(short = 'd', long, default_value_t = 2)]
        depth: usize,

        /// Produce a short answer instead of a full report
        #[arg(long, default_value = "false")]
        answer: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Discover the entities behind a topic and research each one
    Entities {
        #[arg(value_name = "TOPIC")]
        topic: String,

        /// Discovery queries to plan
        #[arg(long, default_value_t = 3)]
        discovery_queries: usize,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Write the result to this file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    path: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Json,
}

impl OutputArgs {
    fn writer(&self) -> Box<dyn ReportWriter> {
        match self.format {
            OutputFormat::Markdown => Box::new(MarkdownReportWriter),
            OutputFormat::Json => Box::new(JsonReportWriter),
        }
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    init_logging(cli.verbose, &config.log_level)?;

    if let Some(model) = cli.model {
        info!(model = %model, "Using model from command line");
        config.model = model;
    }
    config.validate()?;

    info!(
        provider = %config.llm_provider,
        model = %config.model,
        concurrency = config.concurrency_limit,
        "Configuration loaded"
    );

    let search: Arc<dyn SearchBackend> = Arc::new(
        TavilySearch::new(config.require_tavily_key()?)
            .with_base_url(config.tavily_base_url.clone())
            .with_depth(config.search_depth),
    );
    let extraction: Arc<dyn ExtractionBackend> = Arc::new(RigExtractor::from_config(&config)?);

    let outcome = match cli.command {
        Command::Explore {
            query,
            breadth,
            depth,
            answer,
            output,
        } => {
            run_explore(
                &config, search, extraction, &query, breadth, depth, answer, &output,
            )
            .await
        }
        Command::Entities {
            topic,
            discovery_queries,
            output,
        } => {
            run_entities(&config, search, extraction, &topic, discovery_queries, &output).await
        }
    };

    if let Err(e) = &outcome {
        error!(error = %e, "Research failed");
        if e.to_string().contains("connection refused") {
            eprintln!("\nTip: make sure Ollama is running: ollama serve");
        }
    }
    outcome
}

#[allow(clippy::too_many_arguments)]
async fn run_explore(
    config: &Config,
    search: Arc<dyn SearchBackend>,
    extraction: Arc<dyn ExtractionBackend>,
    query: &str,
    breadth: usize,
    depth: usize,
    answer: bool,
    output: &OutputArgs,
) -> Result<()> {
    let explorer = Explorer::from_config(search, extraction.clone(), config);
    let observer: ProgressObserver = Arc::new(|snapshot: &ProgressSnapshot| {
        info!(progress = %snapshot, "Research progress");
    });

    let result = explorer
        .explore(ExplorationRequest::new(query, breadth, depth), Some(observer))
        .await?;

    let synthesizer = ReportSynthesizer::new(extraction).with_timeout(config.extraction_timeout);
    let report = if answer {
        synthesizer.write_answer(query, &result).await
    } else {
        synthesizer.write_report(query, &result).await
    }
    .context("Failed to synthesize the final report")?;

    match &output.path {
        Some(path) => {
            output
                .writer()
                .write_exploration(&result, Some(report.as_str()), path)
                .await?;
            println!("Report written to {}", path.display());
        }
        None => println!("\n{}", report),
    }
    Ok(())
}

async fn run_entities(
    config: &Config,
    search: Arc<dyn SearchBackend>,
    extraction: Arc<dyn ExtractionBackend>,
    topic: &str,
    discovery_queries: usize,
    output: &OutputArgs,
) -> Result<()> {
    let researcher = EntityResearcher::new(
        search,
        extraction,
        EntitySettings::from_config(config, discovery_queries),
    );
    let observer: EntityObserver = Arc::new(|progress: &EntityProgress| {
        info!(progress = %progress, "Entity research progress");
    });

    let records = researcher.run(topic, Some(observer)).await?;
    info!(records = records.len(), "Entity research finished");

    match &output.path {
        Some(path) => {
            output.writer().write_records(&records, path).await?;
            println!("Records written to {}", path.display());
        }
        None => match output.format {
            OutputFormat::Markdown => {
                println!("\n{}", MarkdownReportWriter::render_records(&records))
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        },
    }
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// `--verbose` forces debug output; otherwise `RUST_LOG` (default `info`).
fn init_logging(verbose: bool, log_level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explore_defaults() {
        let cli = Cli::parse_from(["test", "explore", "What is Rust?"]);
        assert!(!cli.verbose);
        match cli.command {
            Command::Explore {
                query,
                breadth,
                depth,
                answer,
                output,
            } => {
                assert_eq!(query, "What is Rust?");
                assert_eq!(breadth, 4);
                assert_eq!(depth, 2);
                assert!(!answer);
                assert!(output.path.is_none());
                assert_eq!(output.format, OutputFormat::Markdown);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_explore_with_flags() {
        let cli = Cli::parse_from([
            "test",
            "explore",
            "--breadth",
            "6",
            "-d",
            "3",
            "--answer",
            "--format",
            "json",
            "-o",
            "out.json",
            "--verbose",
            "--model",
            "qwen2.5",
            "Test query",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.model.as_deref(), Some("qwen2.5"));
        match cli.command {
            Command::Explore {
                breadth,
                depth,
                answer,
                output,
                ..
            } => {
                assert_eq!((breadth, depth), (6, 3));
                assert!(answer);
                assert_eq!(output.format, OutputFormat::Json);
                assert_eq!(output.path, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_entities_args() {
        let cli = Cli::parse_from([
            "test",
            "-v",
            "entities",
            "--discovery-queries",
            "5",
            "GLP-1 drugs",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Command::Entities {
                topic,
                discovery_queries,
                ..
            } => {
                assert_eq!(topic, "GLP-1 drugs");
                assert_eq!(discovery_queries, 5);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["test"]).is_err());
    }
}
