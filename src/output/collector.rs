//! Output collector for assembling the result document
//!
//! The `OutputCollector` gathers run inputs, parameters and the simulated
//! fusions into a `SimulationOutput` and writes it as JSON.

use std::fs::File;

use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::pipeline::SimulationResult;

use super::types::{FusionRecord, RunInputs, SimulationOutput, SummaryOutput, TypeCount};

/// Builder for the JSON result document
pub struct OutputCollector {
    output: SimulationOutput,
}

impl OutputCollector {
    /// Create a new output collector with version and timestamp
    pub fn new() -> Self {
        Self {
            output: SimulationOutput {
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: crate::utils::time::utc_now_iso8601(),
                ..Default::default()
            },
        }
    }

    pub fn with_inputs(mut self, gene_model: &str, background: Option<&str>, reference: Option<&str>) -> Self {
        self.output.inputs = Some(RunInputs {
            gene_model: gene_model.to_string(),
            background: background.map(str::to_string),
            reference: reference.map(str::to_string),
        });
        self
    }

    pub fn with_parameters(mut self, config: &SimulationConfig) -> Self {
        self.output.parameters = Some(config.clone());
        self
    }

    /// Set the fusions and summary counts from a finished run
    pub fn with_result(mut self, result: &SimulationResult) -> Self {
        self.output.summary = Some(SummaryOutput {
            requested: result.requested,
            generated: result.fusions.len(),
            skipped: result.skipped,
            per_type: result
                .generated
                .iter()
                .map(|(&fusion_type, &count)| TypeCount { fusion_type, count })
                .collect(),
        });
        self.output.fusions = result.fusions.iter().map(FusionRecord::from).collect();
        self
    }

    pub fn build(self) -> SimulationOutput {
        self.output
    }

    pub fn output(&self) -> &SimulationOutput {
        &self.output
    }

    /// Write JSON to the specified path, validating it against the schema
    /// when `should_validate()` says so.
    pub fn write_json(&self, path: &str) -> Result<()> {
        if super::schema::should_validate() {
            let value = serde_json::to_value(&self.output).map_err(std::io::Error::other)?;
            if let Err(msg) = super::schema::validate(&value) {
                log::warn!("Schema validation failed for {}: {}", path, msg);
                if cfg!(debug_assertions) {
                    return Err(Error::Resource(msg));
                }
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &self.output).map_err(std::io::Error::other)?;
        Ok(())
    }

    /// Creates "{prefix}.result.json"
    pub fn write_to_prefix(&self, prefix: &str) -> Result<String> {
        let path = format!("{}.result.json", prefix);
        self.write_json(&path)?;
        Ok(path)
    }
}

impl Default for OutputCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationOutput {
    /// Load a result document from a JSON file
    pub fn load_json(path: &str) -> Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(|e| Error::Parse(format!("{}: {}", path, e)))
    }
}
