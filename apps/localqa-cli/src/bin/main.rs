use std::io;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use localqa_cli::{answer_one, run_repl, ReplOptions};
use localqa_core::Settings;
use localqa_rag::QueryService;
use tracing_subscriber::EnvFilter;

/// Ask questions to your documents without an internet connection, using the power of LLMs.
#[derive(Parser, Debug)]
#[command(name = "localqa", version)]
struct Args {
    /// Disable printing of source documents used for answers.
    #[arg(short = 'S', long)]
    hide_source: bool,
    /// Disable streaming the answer to stdout while it is generated.
    #[arg(short = 'M', long)]
    mute_stream: bool,
    /// Number of chunks to retrieve (defaults to TARGET_SOURCE_CHUNKS).
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
    /// Answer a single question and exit.
    #[arg(short = 'q', long)]
    query: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let rt = tokio::runtime::Runtime::new()?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("loading {} and opening {}", settings.embeddings_model_name, settings.persist_directory.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let service = rt.block_on(QueryService::from_settings(&settings));
    spinner.finish_and_clear();
    let service = service.context("failed to start the query pipeline")?;

    let opts = ReplOptions { hide_source: args.hide_source, mute_stream: args.mute_stream, top_k: args.top_k };
    let mut out = io::stdout();
    match args.query {
        Some(question) => answer_one(&rt, &service, &question, &opts, &mut out),
        None => run_repl(&rt, &service, &opts, io::stdin().lock(), &mut out),
    }
}
