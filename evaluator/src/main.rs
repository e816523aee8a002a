use clap::{Parser, Subcommand, ValueEnum};
use evaluator::{load_suite, BrowserSession, ChatSurface, EvalConfig, Runner};
use scoring::{EmbeddingConfig, OllamaEmbedder, SharedEmbedder};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "evaluator")]
#[command(about = "Browser-driven answer quality evaluation for web chat assistants")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// The fixed set of evaluation suites.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SuiteName {
    Core,
    Adversarial,
    Bias,
}

impl SuiteName {
    fn as_str(&self) -> &'static str {
        match self {
            SuiteName::Core => "core",
            SuiteName::Adversarial => "adversarial",
            SuiteName::Bias => "bias",
        }
    }
}

/// The fixed set of target environments.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConfigName {
    Prod,
    Candidate,
}

impl ConfigName {
    fn as_str(&self) -> &'static str {
        match self {
            ConfigName::Prod => "prod",
            ConfigName::Candidate => "candidate",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a suite against a configured environment
    Run {
        /// Suite to evaluate
        #[arg(short, long)]
        suite: SuiteName,
        /// Environment configuration
        #[arg(short, long)]
        config: ConfigName,
    },
    /// Load and validate a configuration without starting a browser
    CheckConfig {
        /// Environment configuration
        #[arg(short, long)]
        config: ConfigName,
    },
    /// List the known suites and configurations
    List,
}

fn config_path(name: ConfigName) -> PathBuf {
    PathBuf::from("configs").join(format!("{}.yml", name.as_str()))
}

fn suite_path(name: SuiteName) -> PathBuf {
    PathBuf::from("data").join(format!("{}.jsonl", name.as_str()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { suite, config } => {
            run_suite(suite, config).await?;
        }
        Commands::CheckConfig { config } => {
            let loaded = EvalConfig::load(config_path(config))?;
            println!("✓ Config '{}' is valid.", config.as_str());
            println!("  base_url: {}", loaded.base_url);
            println!(
                "  similarity_threshold: {}",
                loaded.metrics.similarity_threshold
            );
            println!("  sink: {}", if loaded.sink.is_some() { "configured" } else { "none" });
        }
        Commands::List => {
            println!("Suites:");
            for suite in [SuiteName::Core, SuiteName::Adversarial, SuiteName::Bias] {
                println!("  - {}", suite.as_str());
            }
            println!("Configs:");
            for config in [ConfigName::Prod, ConfigName::Candidate] {
                println!("  - {}", config.as_str());
            }
        }
    }

    Ok(())
}

async fn run_suite(
    suite: SuiteName,
    config_name: ConfigName,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EvalConfig::load(config_path(config_name))?;
    let items = load_suite(suite_path(suite))?;
    info!(
        suite = suite.as_str(),
        config = config_name.as_str(),
        n_items = items.len(),
        "loaded suite and config"
    );

    let embedder: SharedEmbedder = Arc::new(OllamaEmbedder::new(EmbeddingConfig {
        base_url: config.embedding.base_url.clone(),
        model: config.embedding.model.clone(),
        timeout: config.embedding.timeout,
    })?);
    // One embedding backend per process, shared read-only by all scoring.
    let embedder = scoring::embedding::init_global(embedder).clone();

    let session = BrowserSession::launch(&config.base_url).await?;
    if let Err(e) = session.open_chat_from_home(&config).await {
        error!("could not reach the chat entry point: {}", e);
        let _ = session
            .screenshot(std::path::Path::new("navigation_failure.png"))
            .await;
        session.close().await.ok();
        return Err(e.into());
    }

    let runner = Runner::new(config, config_name.as_str(), embedder)?;
    let result = runner.run(&session, &items, suite.as_str()).await;
    session.close().await.ok();

    let outcome = result?;
    println!("Run {} complete.", outcome.run_id);
    println!(
        "  items: {} scored, {} failed",
        outcome.aggregate.n_items,
        outcome.outcomes.len() - outcome.aggregate.n_items
    );
    println!("  correctness_avg: {:.3}", outcome.aggregate.correctness_avg);
    println!("  relevance_avg: {:.3}", outcome.aggregate.relevance_avg);
    println!("  safety_violations: {}", outcome.aggregate.safety_violations);
    println!("  artifact: {}", outcome.artifact_path.display());
    println!("  report: {}", outcome.report_path.display());

    Ok(())
}
