//! cosmic-query CLI.
//!
//! Batch mode (the default) reads one topic from stdin, prints the raw model
//! reply and the structured result, and saves when the topic mentions "save".
//! The `interactive` subcommand renders full reports in a loop.

use clap::Parser;
use cosmic_query::{
    Assistant, AssistantConfig, Presenter, PromptConfig, RecoveryOutcome, ResearchQuery,
    SaveTool, ToolsConfig,
};
use dialoguer::{Confirm, Input};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Research any topic with Wikipedia, web search and an LLM
#[derive(Parser, Debug)]
#[command(name = "cosmic-query", version, about, long_about = None)]
struct Cli {
    /// LLM model to use (overrides GROQ_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Fetch more context per source (7 results / 12000 chars)
    #[arg(long)]
    extended: bool,

    /// Ask for a 500-word summary instead of the full 8-section report
    #[arg(long)]
    brief: bool,

    /// Where saved research is written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Research topics one after another with full rendered reports
    Interactive,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;
    let presenter = Presenter::new(SaveTool::new(&config.output_path));
    let assistant = Assistant::new(config).verbose(true);

    match cli.command {
        Some(Commands::Interactive) => run_interactive(&assistant, &presenter).await,
        None => run_batch(&assistant, &presenter).await,
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<AssistantConfig> {
    let mut config = AssistantConfig::from_env()?;
    if let Some(model) = &cli.model {
        config = config.model(model.clone());
    }
    if let Some(t) = cli.temperature {
        config = config.temperature(t);
    }
    if cli.extended {
        config = config.tools(ToolsConfig::extended());
    }
    if cli.brief {
        config = config.prompt(PromptConfig::brief());
    }
    if let Some(path) = &cli.output {
        config = config.output_path(path.clone());
    }
    Ok(config)
}

async fn run_batch(assistant: &Assistant, presenter: &Presenter) -> anyhow::Result<()> {
    print!("What can I help you research? ");
    std::io::stdout().flush()?;

    let mut topic = String::new();
    std::io::stdin().lock().read_line(&mut topic)?;
    let query = ResearchQuery::new(&topic)?;

    let run = assistant.research(query.as_str()).await?;

    println!("\n===== RAW MODEL OUTPUT =====\n");
    println!("{}", run.raw);

    match run.outcome.to_saved_json() {
        Some(json) => {
            println!("\n===== STRUCTURED OUTPUT =====\n");
            println!("{}", json);

            if query.requests_save()
                && let Some(saved) = presenter.save(&run.outcome)
            {
                println!("\n{}", saved?);
            }
        }
        None => {
            println!("\n Parsing failed");
            if let RecoveryOutcome::Failed(failure) = &run.outcome {
                println!("{}", failure.report());
            }
        }
    }

    Ok(())
}

async fn run_interactive(assistant: &Assistant, presenter: &Presenter) -> anyhow::Result<()> {
    loop {
        let topic: String = Input::new()
            .with_prompt("Research topic (empty to quit)")
            .allow_empty(true)
            .interact_text()?;
        if topic.trim().is_empty() {
            return Ok(());
        }

        let save = Confirm::new()
            .with_prompt("Save to file?")
            .default(false)
            .interact()?;

        eprintln!("Exploring the universe of knowledge...");
        let run = match assistant.research(&topic).await {
            Ok(run) => run,
            Err(e) => {
                eprintln!("Research failed: {}", e);
                continue;
            }
        };

        let presentation = presenter.present(&run.outcome, save);
        if run.outcome.is_full() {
            println!("Research completed successfully!\n");
        }
        println!("{}\n", presentation.view);
        if let Some(notice) = presentation.notice() {
            println!("{}\n", notice);
        }
    }
}
