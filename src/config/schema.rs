//! JSON Schema validation for form schema documents

use jsonschema::{Draft, Validator};
use serde_json::Value;
use anyhow::{Result, anyhow};

/// Get the embedded JSON schema describing form schema documents
pub fn get_schema() -> Result<Validator> {
    let schema_str = include_str!("../../docs/form.schema.json");
    let schema: Value = serde_json::from_str(schema_str)
        .map_err(|e| anyhow!("Failed to parse embedded JSON schema: {}", e))?;

    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(&schema)
        .map_err(|e| anyhow!("Failed to compile JSON schema: {}", e))
}

/// Validate a form schema document against the JSON schema
pub fn validate_against_schema(form: &Value) -> Result<()> {
    let schema = get_schema()?;

    let error_messages: Vec<String> = schema
        .iter_errors(form)
        .map(|e| format!("  - {e}"))
        .collect();

    if !error_messages.is_empty() {
        return Err(anyhow!(
            "Form schema validation failed:\n{}",
            error_messages.join("\n")
        ));
    }

    Ok(())
}
