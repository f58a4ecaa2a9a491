//! CLI for ONNX image classification and execution-provider benchmarking.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{benchmark, classify, config, models, providers};

/// visinfer - classify images and compare ONNX execution providers
#[derive(Parser)]
#[command(name = "visinfer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single image
    Classify(classify::ClassifyArgs),

    /// Compare inference speed across execution providers
    Benchmark(benchmark::BenchmarkArgs),

    /// Inspect models and fetch label files
    Models(models::ModelsArgs),

    /// List execution providers
    Providers,

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Classify(args) => classify::run(args, config_path).await,
        Commands::Benchmark(args) => benchmark::run(args, config_path).await,
        Commands::Models(args) => models::run(args, config_path).await,
        Commands::Providers => providers::run().await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
