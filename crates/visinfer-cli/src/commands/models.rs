//! Models command - inspect the model catalogue and fetch label files.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use visinfer_core::models::available_models;
use visinfer_core::models::registry::IMAGENET_LABELS;
use visinfer_core::{LabelTable, ModelManager};

use super::{ModelSelection, create_engine, format_size, load_config};

/// ImageNet synset listing the label table is built from.
const SYNSET_URL: &str =
    "https://raw.githubusercontent.com/onnx/models/main/vision/classification/synset.txt";

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List built-in models and whether their files are present
    List,

    /// Load a model and show its inputs and outputs
    Info(InfoArgs),

    /// Download ImageNet labels and save them as JSON
    Labels(LabelsArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Built-in model name
    name: Option<String>,

    /// Path to an ONNX model file
    #[arg(long)]
    model_path: Option<PathBuf>,
}

#[derive(Args)]
struct LabelsArgs {
    /// Output path (default: <model_dir>/imagenet_classes.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,

    /// Source URL of the synset listing
    #[arg(long, default_value = SYNSET_URL)]
    url: String,
}

pub async fn run(args: ModelsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::List => list_models(config_path),
        ModelsCommand::Info(info_args) => show_info(info_args, config_path),
        ModelsCommand::Labels(labels_args) => download_labels(labels_args, config_path).await,
    }
}

fn list_models(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let model_dir = &config.models.model_dir;

    println!("{}", style("Available Models").bold());
    println!("Model directory: {}", model_dir.display());
    println!();

    for spec in available_models() {
        let is_default = spec.name.eq_ignore_ascii_case(&config.models.default_model);
        let default_marker = if is_default { " (default)" } else { "" };

        println!(
            "{} {}{}",
            style(format!("▸ {}", spec.name)).bold().cyan(),
            style(spec.description).dim(),
            style(default_marker).green().bold()
        );
        println!("    input {}x{}", spec.input_size, spec.input_size);

        for path in [spec.model_path(model_dir), spec.labels_path(model_dir)] {
            let (status, size_str) = match fs::metadata(&path) {
                Ok(metadata) => (style("✓").green(), format_size(metadata.len())),
                Err(_) => (style("✗").red(), "missing".to_string()),
            };
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("    {} {:<28} {:>10}", status, file_name, size_str);
        }
        println!();
    }

    println!("Commands:");
    println!("  visinfer models labels          Download ImageNet labels");
    println!("  visinfer models info <name>     Show model inputs and outputs");

    Ok(())
}

fn show_info(args: InfoArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let selection = ModelSelection {
        model: args.name,
        model_path: args.model_path,
        labels: None,
    };
    let files = selection.resolve(&config)?;
    let request = files.load_request(&config)?;

    let mut manager = ModelManager::new(create_engine());
    manager.reload(request)?;
    let info = manager.model_info()?;

    println!("{}", style(&info.model_name).bold());
    println!("  File:        {}", files.model_path.display());
    println!(
        "  Providers:   {}",
        info.providers
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Inputs:      {}", info.input_names.join(", "));
    println!("  Input shape: {:?}", info.input_shape);
    println!("  Outputs:     {}", info.output_names.join(", "));
    println!("  Labels:      {}", info.label_count);

    Ok(())
}

async fn download_labels(args: LabelsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let output_path = args
        .output
        .unwrap_or_else(|| config.model_path(IMAGENET_LABELS));

    if output_path.exists() && !args.force {
        println!(
            "  {} {} (already exists, use --force to replace)",
            style("✓").green(),
            output_path.display()
        );
        return Ok(());
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    println!(
        "{} Downloading labels to {}",
        style("ℹ").blue(),
        output_path.display()
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("visinfer-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} {msg:<20} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")?
            .progress_chars("=>-"),
    );
    pb.set_message("synset.txt");

    let text = match fetch_text(&client, &args.url, &pb).await {
        Ok(text) => {
            pb.finish_with_message(format!("{} synset.txt", style("✓").green()));
            text
        }
        Err(e) => {
            pb.finish_with_message(format!("{} synset.txt - {}", style("✗").red(), e));
            return Err(e);
        }
    };

    let labels = LabelTable::from_synset(&text);
    if labels.is_empty() {
        anyhow::bail!("No labels found in {}", args.url);
    }
    fs::write(&output_path, labels.to_json()?)?;

    println!(
        "{} Saved {} labels to {}",
        style("✓").green().bold(),
        labels.len(),
        output_path.display()
    );

    Ok(())
}

async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    pb: &ProgressBar,
) -> anyhow::Result<String> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    let mut stream = response.bytes_stream();
    let mut body = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
        pb.set_position(body.len() as u64);
    }

    Ok(String::from_utf8(body)?)
}
