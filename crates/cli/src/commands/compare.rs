use std::fs;
use std::path::{Path, PathBuf};

use procurely_core::config::{AppConfig, LoadOptions};
use procurely_core::domain::boq::Boq;
use procurely_core::domain::quote::Quote;
use procurely_core::errors::ComparisonError;
use procurely_core::{ComparisonRuntime, DefaultComparisonEngine};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_VALIDATION};

pub fn run(boq_path: &Path, quote_paths: &[PathBuf]) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "compare",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let engine = match DefaultComparisonEngine::from_policy_config(&config.policy) {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::failure("compare", "config_validation", error.to_string(), EXIT_CONFIG);
        }
    };

    let boq: Boq = match read_json(boq_path) {
        Ok(boq) => boq,
        Err(message) => return CommandResult::failure("compare", "input", message, EXIT_INPUT),
    };

    let mut quotes = Vec::new();
    for path in quote_paths {
        match read_quotes(path) {
            Ok(batch) => quotes.extend(batch),
            Err(message) => return CommandResult::failure("compare", "input", message, EXIT_INPUT),
        }
    }

    let comparison = match engine.compare(&boq, &quotes) {
        Ok(comparison) => comparison,
        Err(error @ ComparisonError::Validation(_)) => {
            return CommandResult::failure("compare", "validation", error.to_string(), EXIT_VALIDATION);
        }
        Err(error @ ComparisonError::Configuration(_)) => {
            return CommandResult::failure("compare", "config_validation", error.to_string(), EXIT_CONFIG);
        }
    };

    let summary = format!(
        "compared {} quote(s) for {}: best vendor {}, route {}",
        comparison.vendor_scores.len(),
        comparison.boq_id.0,
        comparison.best_vendor,
        comparison.approval_route.as_str()
    );

    match serde_json::to_value(&comparison) {
        Ok(data) => CommandResult::success_with_data("compare", summary, Some(data)),
        Err(error) => CommandResult::failure(
            "compare",
            "serialization",
            format!("comparison could not be serialized: {error}"),
            EXIT_VALIDATION,
        ),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("could not read `{}`: {error}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| format!("could not parse `{}`: {error}", path.display()))
}

/// A quote file holds either one vendor quote or an array of them.
fn read_quotes(path: &Path) -> Result<Vec<Quote>, String> {
    let value: Value = read_json(path)?;
    let parsed = if value.is_array() {
        serde_json::from_value::<Vec<Quote>>(value)
    } else {
        serde_json::from_value::<Quote>(value).map(|quote| vec![quote])
    };
    parsed.map_err(|error| format!("could not parse `{}`: {error}", path.display()))
}
