//! Benchmark command - compare execution providers on one image.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use visinfer_core::benchmark::{
    BenchmarkEvent, CSV_HEADER, InstantClock, ProcessMemoryProbe,
};
use visinfer_core::{
    BenchmarkReport, BenchmarkRequest, BenchmarkRunner, BenchmarkStatus, CancelFlag,
    ExecutionProvider, ModelManager,
};

use super::{ModelSelection, create_engine, load_config};

/// Arguments for the benchmark command.
#[derive(Args)]
pub struct BenchmarkArgs {
    /// Image file (JPEG, PNG or WebP)
    #[arg(required = true)]
    image: PathBuf,

    #[command(flatten)]
    model: ModelSelection,

    /// Inference runs per provider (1-50)
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Comma-separated providers to compare (default: all available)
    #[arg(short, long, value_delimiter = ',')]
    providers: Vec<ExecutionProvider>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON report
    Json,
    /// CSV table
    Csv,
    /// Plain text table
    Text,
}

pub async fn run(args: BenchmarkArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = create_engine();

    let iterations = args.iterations.unwrap_or(config.benchmark.iterations);
    let providers = if !args.providers.is_empty() {
        args.providers.clone()
    } else if !config.benchmark.providers.is_empty() {
        config.benchmark.providers.clone()
    } else {
        engine.available_providers()
    };
    let request = BenchmarkRequest::new(providers, iterations);
    request.validate()?;

    if !args.image.exists() {
        anyhow::bail!("Input file not found: {}", args.image.display());
    }

    let files = args.model.resolve(&config)?;
    let load_request = files
        .load_request(&config)?
        .with_provider(ExecutionProvider::Cpu);

    let mut manager = ModelManager::new(engine);
    let input_size = manager.reload(load_request)?.input_size();

    let preprocessor = config.image.preprocessor().with_target_size(input_size);
    let image = preprocessor.load_file(&args.image)?;
    let tensor = preprocessor.to_planar(&image);

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping after the current iteration");
        handler_flag.cancel();
    })?;

    let runner = BenchmarkRunner::new(InstantClock::new(), ProcessMemoryProbe)
        .with_cancel_flag(cancel);

    let total_runs = (request.providers.len() * request.iterations) as u64;
    let pb = ProgressBar::new(total_runs);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let results = runner.run_with_progress(&mut manager, &request, &tensor, |event| match event {
        BenchmarkEvent::CandidateStarted { provider, .. } => {
            pb.set_message(provider.to_string());
        }
        BenchmarkEvent::Iteration { .. } => pb.inc(1),
        BenchmarkEvent::CandidateFinished(result) => {
            if result.status != BenchmarkStatus::Success {
                // Skipped iterations still count towards the bar
                let done = pb.position() % request.iterations as u64;
                pb.inc(request.iterations as u64 - done);
            }
            pb.println(format!(
                "  {} {}",
                status_marker(result.status),
                result.provider
            ));
        }
    })?;
    pb.finish_and_clear();

    let report = BenchmarkReport::new(files.name.clone(), request.iterations, results)
        .with_image(args.image.display().to_string());
    info!("Benchmark finished with {} result(s)", report.results.len());

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };

    match args.format {
        OutputFormat::Json => {
            writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        OutputFormat::Csv => write_csv(&report, &mut writer)?,
        OutputFormat::Text => write_text(&report, &mut writer)?,
    }
    writer.flush()?;

    if let Some(path) = &args.output {
        println!(
            "{} Report written to {}",
            style("✓").green(),
            path.display()
        );
    }

    if report
        .results
        .iter()
        .any(|r| r.status == BenchmarkStatus::Cancelled)
    {
        eprintln!("{} Benchmark cancelled", style("⚠").yellow());
    }

    Ok(())
}

fn status_marker(status: BenchmarkStatus) -> console::StyledObject<&'static str> {
    match status {
        BenchmarkStatus::Success => style("✓").green(),
        BenchmarkStatus::Error => style("✗").red(),
        BenchmarkStatus::Cancelled => style("⚠").yellow(),
    }
}

fn write_csv(report: &BenchmarkReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for record in report.csv_records() {
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_text(report: &BenchmarkReport, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(
        writer,
        "{} {} ({} iterations, {})",
        style("Benchmark").bold(),
        report.model_name,
        report.iterations,
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(writer)?;
    writeln!(
        writer,
        "  {:<10} {:>12} {:>12} {:>12} {:>12}  {}",
        "Provider", "Avg (ms)", "Std (ms)", "Mem (MB)", "Peak (MB)", "Status"
    )?;

    let fastest = report.fastest().map(|r| r.provider);
    let mb = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}", v));

    for result in &report.results {
        let marker = if Some(result.provider) == fastest { " *" } else { "" };
        writeln!(
            writer,
            "  {:<10} {:>12.2} {:>12.2} {:>12} {:>12}  {}{}",
            result.provider.to_string(),
            result.avg_ms,
            result.std_dev_ms,
            mb(result.memory_used_mb()),
            mb(result.memory_peak_mb()),
            result.status,
            marker
        )?;
        if let Some(error) = &result.error {
            writeln!(writer, "  {:<10} {}", "", style(error).red())?;
        }
    }

    if let Some(best) = report.fastest() {
        writeln!(writer)?;
        writeln!(
            writer,
            "Fastest: {} ({:.2}ms)",
            style(best.provider.to_string()).green().bold(),
            best.avg_ms
        )?;
    }

    Ok(())
}
