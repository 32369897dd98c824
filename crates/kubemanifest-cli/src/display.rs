//! Display formatting for CLI output

use clap::ValueEnum;
use console::style;
use kubemanifest_kube::{PatchDescriptor, ResourceObject};

use crate::error::{CliError, Result};

/// How objects are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Render an object in the requested format
pub fn render_object(object: &ResourceObject, format: OutputFormat) -> Result<String> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(object.body()).map_err(internal)?,
        OutputFormat::Json => serde_json::to_string_pretty(object.body()).map_err(internal)?,
    };
    Ok(rendered)
}

pub fn print_object(object: &ResourceObject, format: OutputFormat) -> Result<()> {
    let rendered = render_object(object, format)?;
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Progress line on stderr, keeping stdout for data
pub fn step(message: impl std::fmt::Display) {
    eprintln!("{} {}", style("→").blue().bold(), message);
}

pub fn success(message: impl std::fmt::Display) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

/// Print the tracking key on stdout so scripts can capture it
pub fn print_key(key: &str) {
    println!("{key}");
}

/// Show a planned patch
pub fn print_patch(key: &str, patch: &PatchDescriptor) -> Result<()> {
    if patch.is_empty() {
        success(format!("{} is up to date", style(key).cyan()));
        return Ok(());
    }

    eprintln!(
        "{} {} ({} patch)",
        style("~").yellow().bold(),
        style(key).cyan(),
        patch.strategy
    );
    let value = patch.to_value().map_err(internal)?;
    println!("{}", serde_json::to_string_pretty(&value).map_err(internal)?);
    Ok(())
}

fn internal(err: impl std::fmt::Display) -> CliError {
    CliError::Internal {
        message: err.to_string(),
    }
}
