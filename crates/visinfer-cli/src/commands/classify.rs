//! Classify command - run a model on a single image.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use serde_json::json;
use tracing::info;

use visinfer_core::{Classification, ModelManager, ProviderPreference};

use super::{ModelSelection, create_engine, load_config};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Image file (JPEG, PNG or WebP)
    #[arg(required = true)]
    image: PathBuf,

    #[command(flatten)]
    model: ModelSelection,

    /// Execution provider: auto, cpu, xnnpack or cuda
    #[arg(short, long)]
    provider: Option<ProviderPreference>,

    /// Number of predictions to show
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text ranking
    Text,
}

pub async fn run(args: ClassifyArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(provider) = args.provider {
        config.inference.execution_provider = provider;
    }
    if let Some(k) = args.top_k {
        if k == 0 {
            anyhow::bail!("--top-k must be at least 1");
        }
        config.inference.top_k = k;
    }

    if !args.image.exists() {
        anyhow::bail!("Input file not found: {}", args.image.display());
    }

    let files = args.model.resolve(&config)?;
    let request = files.load_request(&config)?;

    let mut manager = ModelManager::new(create_engine());
    let load_start = Instant::now();
    let loaded = manager.reload(request)?;
    let input_size = loaded.input_size();
    info!(
        "Loaded {} in {:.0?} (input {:?})",
        files.name,
        load_start.elapsed(),
        loaded.input_shape()
    );

    let preprocessor = config.image.preprocessor().with_target_size(input_size);
    let image = preprocessor.load_file(&args.image)?;
    let tensor = preprocessor.to_planar(&image);

    let start = Instant::now();
    let classification = manager.run(&tensor)?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let providers = manager
        .current()
        .map(|m| m.providers().to_vec())
        .unwrap_or_default();

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "image": args.image.display().to_string(),
            "model": classification.model_name,
            "providers": providers,
            "inference_ms": elapsed_ms,
            "predictions": classification.predictions,
        }))?,
        OutputFormat::Text => format_text(&args.image, &classification, elapsed_ms),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_text(image: &Path, classification: &Classification, elapsed_ms: f64) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} {} ({})\n\n",
        style("Classification").bold(),
        image.display(),
        classification.model_name
    ));

    for (rank, prediction) in classification.predictions.iter().enumerate() {
        out.push_str(&format!(
            "  {:>2}. {:<40} {:>10.4}  [{}]\n",
            rank + 1,
            prediction.label,
            prediction.score,
            prediction.index
        ));
    }

    out.push_str(&format!("\nInference time: {:.2}ms", elapsed_ms));
    out
}
