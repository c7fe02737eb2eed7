//! JSON Schema generation and runtime validation for the result document

use std::sync::LazyLock;

use schemars::schema_for;
use serde_json::Value;

use super::types::SimulationOutput;

static SCHEMA: LazyLock<schemars::Schema> = LazyLock::new(|| schema_for!(SimulationOutput));

/// Returns the JSON Schema as a pretty-printed JSON string.
pub fn schema_json_pretty() -> String {
    serde_json::to_string_pretty(&*SCHEMA).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Validate a JSON value against the SimulationOutput schema.
///
/// Returns `Ok(())` if valid, or `Err` with a description of all validation errors.
pub fn validate(value: &Value) -> Result<(), String> {
    let schema_val = serde_json::to_value(&*SCHEMA).map_err(|e| format!("Failed to serialize schema: {}", e))?;
    let validator = jsonschema::validator_for(&schema_val)
        .map_err(|e| format!("Failed to compile schema: {}", e))?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("  - {}: {}", e.instance_path, e))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "Output JSON failed schema validation ({} errors):\n{}",
            errors.len(),
            errors.join("\n")
        ))
    }
}

/// Always true in debug builds. In release builds, true only if `FUSIM_VALIDATE_OUTPUT=1`.
pub fn should_validate() -> bool {
    if cfg!(debug_assertions) {
        true
    } else {
        std::env::var("FUSIM_VALIDATE_OUTPUT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputCollector;

    #[test]
    fn test_schema_generation() {
        let schema = schema_json_pretty();
        let parsed: Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(parsed.get("type").and_then(|v| v.as_str()), Some("object"));
        assert!(schema.contains("fusion_type"));
    }

    #[test]
    fn test_validate_minimal_output() {
        let output = OutputCollector::new().build();
        let value = serde_json::to_value(&output).unwrap();
        assert!(validate(&value).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_fusion_type() {
        let mut value = serde_json::to_value(OutputCollector::new().build()).unwrap();
        value["fusions"] = serde_json::json!([{
            "name": "A-B",
            "fusion_type": "quad_fusion",
            "options": [],
            "sides": []
        }]);
        assert!(validate(&value).is_err());
        assert!(validate(&serde_json::json!({"bogus": true})).is_err());
    }
}
