//! Config command - read and edit settings one key at a time.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use console::style;

use visinfer_core::models::find_model;
use visinfer_core::{AppConfig, ExecutionProvider, ValidationError};

use super::default_config_path;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show every setting
    Show {
        /// Print the raw JSON document instead
        #[arg(long)]
        json: bool,
    },

    /// Write a configuration file with default settings
    Init(InitArgs),

    /// Print one setting
    Get {
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Change one setting
    Set {
        #[arg(value_enum)]
        key: ConfigKey,
        /// New value ("none" clears optional numbers, "" clears lists)
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

/// A single editable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigKey {
    #[value(name = "models.model_dir")]
    ModelDir,
    #[value(name = "models.default_model")]
    DefaultModel,
    #[value(name = "inference.execution_provider")]
    ExecutionProvider,
    #[value(name = "inference.optimization_level")]
    OptimizationLevel,
    #[value(name = "inference.intra_threads")]
    IntraThreads,
    #[value(name = "inference.top_k")]
    TopK,
    #[value(name = "inference.honor_model_shape")]
    HonorModelShape,
    #[value(name = "image.target_size")]
    TargetSize,
    #[value(name = "image.max_file_size")]
    MaxFileSize,
    #[value(name = "benchmark.iterations")]
    Iterations,
    #[value(name = "benchmark.providers")]
    BenchmarkProviders,
}

impl ConfigKey {
    fn name(self) -> String {
        self.to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default()
    }

    fn get(self, config: &AppConfig) -> String {
        match self {
            ConfigKey::ModelDir => config.models.model_dir.display().to_string(),
            ConfigKey::DefaultModel => config.models.default_model.clone(),
            ConfigKey::ExecutionProvider => config.inference.execution_provider.to_string(),
            ConfigKey::OptimizationLevel => {
                format!("{:?}", config.inference.optimization_level).to_lowercase()
            }
            ConfigKey::IntraThreads => config
                .inference
                .intra_threads
                .map_or_else(|| "none".to_string(), |n| n.to_string()),
            ConfigKey::TopK => config.inference.top_k.to_string(),
            ConfigKey::HonorModelShape => config.inference.honor_model_shape.to_string(),
            ConfigKey::TargetSize => config.image.target_size.to_string(),
            ConfigKey::MaxFileSize => config.image.max_file_size.to_string(),
            ConfigKey::Iterations => config.benchmark.iterations.to_string(),
            ConfigKey::BenchmarkProviders => config
                .benchmark
                .providers
                .iter()
                .map(ExecutionProvider::as_str)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Parse `value` into the field this key names.
    fn set(self, config: &mut AppConfig, value: &str) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidValue {
            field: self.name(),
            reason,
        };
        let number = |value: &str| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(format!("'{}' is not a whole number", value)))
        };

        match self {
            ConfigKey::ModelDir => config.models.model_dir = PathBuf::from(value),
            ConfigKey::DefaultModel => {
                let spec = find_model(value)
                    .ok_or_else(|| invalid(format!("'{}' is not a built-in model", value)))?;
                config.models.default_model = spec.name.to_string();
            }
            ConfigKey::ExecutionProvider => {
                config.inference.execution_provider = value.parse().map_err(invalid)?;
            }
            ConfigKey::OptimizationLevel => {
                config.inference.optimization_level = value.parse().map_err(invalid)?;
            }
            ConfigKey::IntraThreads => {
                config.inference.intra_threads = match value.trim() {
                    "" | "none" | "auto" => None,
                    other => Some(number(other)? as usize),
                };
            }
            ConfigKey::TopK => config.inference.top_k = number(value)? as usize,
            ConfigKey::HonorModelShape => {
                config.inference.honor_model_shape = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("'{}' is not true or false", value)))?;
            }
            ConfigKey::TargetSize => {
                config.image.target_size = u32::try_from(number(value)?)
                    .map_err(|_| invalid("too large".to_string()))?;
            }
            ConfigKey::MaxFileSize => config.image.max_file_size = number(value)?,
            ConfigKey::Iterations => config.benchmark.iterations = number(value)? as usize,
            ConfigKey::BenchmarkProviders => {
                config.benchmark.providers = value
                    .split(',')
                    .filter(|p| !p.trim().is_empty())
                    .map(str::parse)
                    .collect::<Result<_, String>>()
                    .map_err(invalid)?;
            }
        }

        config.validate()
    }
}

pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show { json } => show_config(&config_path, json),
        ConfigCommand::Init(init_args) => init_config(init_args, &config_path),
        ConfigCommand::Get { key } => {
            println!("{}", key.get(&read_or_default(&config_path)?));
            Ok(())
        }
        ConfigCommand::Set { key, value } => set_config(key, &value, &config_path),
        ConfigCommand::Path => show_path(&config_path),
    }
}

fn read_or_default(config_path: &Path) -> anyhow::Result<AppConfig> {
    if config_path.exists() {
        Ok(AppConfig::from_file(config_path)?)
    } else {
        Ok(AppConfig::default())
    }
}

fn show_config(config_path: &Path, json: bool) -> anyhow::Result<()> {
    if !config_path.exists() {
        eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
    }
    let config = read_or_default(config_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    for key in ConfigKey::value_variants() {
        println!("{:<30} {}", style(key.name()).cyan(), key.get(&config));
    }

    Ok(())
}

fn init_config(args: InitArgs, config_path: &Path) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(|| config_path.to_path_buf());

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    AppConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn set_config(key: ConfigKey, value: &str, config_path: &Path) -> anyhow::Result<()> {
    let mut config = read_or_default(config_path)?;
    key.set(&mut config, value)?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(config_path)?;

    println!(
        "{} {} = {}",
        style("✓").green(),
        key.name(),
        key.get(&config)
    );

    Ok(())
}

fn show_path(config_path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", config_path.display());

    if config_path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'visinfer config init' to create a configuration file.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use visinfer_core::ProviderPreference;

    #[test]
    fn test_every_key_round_trips_defaults() {
        let defaults = AppConfig::default();
        for key in ConfigKey::value_variants() {
            let mut config = AppConfig::default();
            key.set(&mut config, &key.get(&defaults)).unwrap();
            assert_eq!(config, defaults, "{}", key.name());
        }
    }

    #[test]
    fn test_set_typed_values() {
        let mut config = AppConfig::default();

        ConfigKey::ExecutionProvider.set(&mut config, "xnnpack").unwrap();
        assert_eq!(
            config.inference.execution_provider,
            ProviderPreference::Explicit(ExecutionProvider::Xnnpack)
        );

        ConfigKey::BenchmarkProviders.set(&mut config, "cpu, xnnpack").unwrap();
        assert_eq!(
            config.benchmark.providers,
            vec![ExecutionProvider::Cpu, ExecutionProvider::Xnnpack]
        );

        ConfigKey::IntraThreads.set(&mut config, "4").unwrap();
        assert_eq!(config.inference.intra_threads, Some(4));
        ConfigKey::IntraThreads.set(&mut config, "none").unwrap();
        assert_eq!(config.inference.intra_threads, None);

        ConfigKey::DefaultModel.set(&mut config, "resnet18-simplified").unwrap();
        assert_eq!(config.models.default_model, "ResNet18-Simplified");
    }

    #[test]
    fn test_errors_name_the_field() {
        let mut config = AppConfig::default();

        let err = ConfigKey::TopK.set(&mut config, "many").unwrap_err();
        assert!(err.to_string().contains("inference.top_k"));

        let err = ConfigKey::TopK.set(&mut config, "0").unwrap_err();
        assert!(err.to_string().contains("inference.top_k"));

        let err = ConfigKey::DefaultModel.set(&mut config, "vgg16").unwrap_err();
        assert!(err.to_string().contains("models.default_model"));

        let err = ConfigKey::Iterations.set(&mut config, "99").unwrap_err();
        assert!(matches!(err, ValidationError::IterationsOutOfRange { value: 99, .. }));
    }
}
