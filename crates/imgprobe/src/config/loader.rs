use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::analyzer::AnalyzerKind;
use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// `<config_dir>/imgprobe/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("imgprobe").join("config.json"))
}

/// Loads `path` if given, else the per-user config file if it exists, else
/// the built-in defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            log::info!("Using config file {}", path.display());
            load_config(&path)
        }
        _ => {
            log::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let transforms = &config.transforms;
    let factors = [
        ("brightness", transforms.brightness),
        ("contrast", transforms.contrast),
        ("gamma", transforms.gamma),
        ("color_balance.red", transforms.color_balance.red),
        ("color_balance.green", transforms.color_balance.green),
        ("color_balance.blue", transforms.color_balance.blue),
    ];
    for (name, value) in factors {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Validation {
                message: format!("Transform factor '{}' must be positive, got {}", name, value),
            });
        }
    }

    if !(1..=100).contains(&config.artifacts.jpeg_quality) {
        return Err(ConfigError::Validation {
            message: format!(
                "JPEG quality must be between 1 and 100, got {}",
                config.artifacts.jpeg_quality
            ),
        });
    }

    if config.max_concurrent_tasks == 0 {
        return Err(ConfigError::Validation {
            message: "max_concurrent_tasks must be at least 1".to_string(),
        });
    }

    if config.max_finished_tasks == 0 {
        return Err(ConfigError::Validation {
            message: "max_finished_tasks must be at least 1".to_string(),
        });
    }

    if config.task_timeout_secs == 0 || config.analyzer_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "Timeouts must be at least one second".to_string(),
        });
    }

    let mut seen_names = HashSet::new();
    for analyzer in &config.analyzers {
        if !seen_names.insert(&analyzer.name) {
            return Err(ConfigError::InvalidAnalyzer {
                name: analyzer.name.clone(),
                reason: "Duplicate analyzer name".to_string(),
            });
        }

        if analyzer.kind == AnalyzerKind::Custom
            && analyzer.program.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::InvalidAnalyzer {
                name: analyzer.name.clone(),
                reason: "Custom analyzers need a program".to_string(),
            });
        }

        if analyzer.targets.is_empty() {
            return Err(ConfigError::InvalidAnalyzer {
                name: analyzer.name.clone(),
                reason: "At least one target artifact is required".to_string(),
            });
        }

        let mut seen_targets = HashSet::new();
        if let Some(target) = analyzer.targets.iter().find(|t| !seen_targets.insert(**t)) {
            return Err(ConfigError::InvalidAnalyzer {
                name: analyzer.name.clone(),
                reason: format!("Target '{}' is listed more than once", target),
            });
        }
    }

    Ok(())
}
