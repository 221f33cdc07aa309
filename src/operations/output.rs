//! Machine-readable output of forms and status

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::str::FromStr;

/// Output format for printed documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// YAML document
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(format!("Invalid format: {s}. Use 'json' or 'yaml'")),
        }
    }
}

/// Serialize a value in the requested format
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
#[inline]
pub fn format_output<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).context("Failed to serialize output as YAML")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("YAML".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_output() {
        let value = json!({"configured": true});
        assert!(format_output(&value, OutputFormat::Json).unwrap().contains("\"configured\": true"));
        assert_eq!(format_output(&value, OutputFormat::Yaml).unwrap(), "configured: true\n");
    }
}
