//! Interactive question answering over restaurant reviews.
//!
//! Indexes the review corpus on first run, then answers questions typed at
//! the prompt until `q`, `quit`, `exit`, Ctrl-C or end of input.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reviewrag_retrieval::engine::{cached_provider, ollama_provider};
use reviewrag_retrieval::{
    Answer, BootstrapReport, OllamaGenerator, RetrievalError, ReviewQa, ReviewRagConfig,
};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Parser)]
#[command(name = "reviewrag")]
#[command(about = "Answer questions about a restaurant from its customer reviews")]
#[command(version)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Review corpus (CSV with Title, Review, Rating and Date columns).
    #[arg(long, value_name = "PATH")]
    corpus: Option<PathBuf>,

    /// Directory holding the persisted index.
    #[arg(long, value_name = "PATH")]
    index_dir: Option<PathBuf>,

    /// Number of reviews retrieved per question.
    #[arg(short, long)]
    k: Option<usize>,

    /// Delete the existing index and rebuild it from the corpus.
    #[arg(long)]
    reset: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn load_config(&self) -> Result<ReviewRagConfig> {
        let mut config = match &self.config {
            Some(path) => ReviewRagConfig::load(path)?,
            None => ReviewRagConfig::default(),
        };

        if let Some(corpus) = &self.corpus {
            config = config.with_corpus_path(corpus);
        }
        if let Some(index_dir) = &self.index_dir {
            config = config.with_index_dir(index_dir);
        }
        if let Some(k) = self.k {
            config = config.with_k(k);
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "q" | "quit" | "exit")
}

fn print_answer(answer: &Answer) {
    match &answer.text {
        None => println!("No relevant reviews found for your question."),
        Some(text) => {
            println!("Found {} relevant review(s)\n", answer.reviews.len());
            println!("{}", "-".repeat(RULE_WIDTH));
            println!("Answer:");
            println!("{text}\n");
        }
    }
}

async fn start(config: ReviewRagConfig, reset: bool) -> Result<ReviewQa> {
    let ollama = ollama_provider(&config.embedding)?;
    ollama
        .ensure_model()
        .await
        .context("embedding model check failed")?;

    let generator = OllamaGenerator::new(&config.answer)?;
    generator
        .ensure_model()
        .await
        .context("answer model check failed")?;

    let provider = cached_provider(ollama, &config.embedding);
    let qa = ReviewQa::builder()
        .with_config(config)
        .with_provider(provider)
        .with_generator(Arc::new(generator))
        .build()
        .await
        .context("failed to open the review index")?;

    if reset {
        qa.reset().await.context("failed to reset the review index")?;
    }

    let report = qa
        .bootstrap()
        .await
        .context("failed to build the review index")?;
    match report {
        BootstrapReport::Skipped { existing } => info!("Loaded index with {existing} reviews"),
        BootstrapReport::Populated { documents } => info!("Indexed {documents} reviews"),
    }

    Ok(qa)
}

/// Decode one line of input without its line ending; `None` when it is not
/// valid UTF-8.
fn decode_line(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes)
        .ok()
        .map(|line| line.trim_end_matches(['\n', '\r']))
}

async fn answer_question(qa: &ReviewQa, question: &str) {
    println!("\nSearching through reviews...");
    match qa.ask(question).await {
        Ok(answer) => print_answer(&answer),
        Err(RetrievalError::InvalidQuery(reason)) => println!("{reason}\n"),
        Err(e) => {
            warn!("Question failed: {e}");
            println!("\nAn error occurred: {e}");
            println!("Please try again or type 'q' to quit.\n");
        }
    }
}

async fn run_loop(qa: &ReviewQa) -> Result<()> {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Restaurant Review Q&A");
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Ask anything about the restaurant based on customer reviews.");
    println!("Type 'q' or 'quit' to exit.\n");

    let mut input = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    loop {
        println!("{}", "-".repeat(RULE_WIDTH));
        print!("Your question: ");
        std::io::stdout().flush()?;

        buf.clear();
        let read = tokio::select! {
            read = input.read_until(b'\n', &mut buf) => read?,
            _ = signal::ctrl_c() => {
                println!("\n\nGoodbye!");
                break;
            }
        };
        if read == 0 {
            println!();
            break;
        }

        let Some(line) = decode_line(&buf) else {
            println!("Could not read that line as text; please try again.\n");
            continue;
        };
        let question = line.trim();

        if is_exit_command(question) {
            println!("\nGoodbye!");
            break;
        }
        if question.is_empty() {
            println!("Please enter a question.\n");
            continue;
        }

        tokio::select! {
            () = answer_question(qa, question) => {}
            _ = signal::ctrl_c() => {
                println!("\n\nGoodbye!");
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.load_config()?;
    let qa = start(config, cli.reset).await?;
    run_loop(&qa).await
}
