//! Simulation outputs
//!
//! This module provides:
//! - `SimulationOutput`: the JSON result document with its schema
//! - `OutputCollector`: a builder that fills it from a finished run
//! - tab-separated and FASTA writers for the fusions themselves
//!
//! # Example
//!
//! ```ignore
//! use fusim::output::OutputCollector;
//!
//! OutputCollector::new()
//!     .with_inputs("refFlat.txt", None, None)
//!     .with_parameters(&config)
//!     .with_result(&result)
//!     .write_to_prefix("sim")?;
//! ```

use std::fmt;

use clap::ValueEnum;

use crate::error::{Error, Result};

pub mod collector;
pub mod schema;
pub mod text;
pub mod types;

pub use collector::OutputCollector;
pub use text::{write_depth_tsv, write_fasta, write_txt};
pub use types::{FusionRecord, FusionSideRecord, SimulationOutput, SummaryOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum OutputFormat {
    Txt,
    Fasta,
    Json,
}

impl OutputFormat {
    /// File name suffix appended to the output prefix.
    pub fn suffix(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "fusions.txt",
            OutputFormat::Fasta => "fusions.fa",
            OutputFormat::Json => "result.json",
        }
    }

    pub fn requires_reference(&self) -> bool {
        matches!(self, OutputFormat::Fasta)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Fasta => "fasta",
            OutputFormat::Json => "json",
        };
        write!(f, "{}", s)
    }
}

/// FASTA output needs a reference to fetch sequence from.
pub fn check_formats(formats: &[OutputFormat], reference: Option<&str>) -> Result<()> {
    if formats.is_empty() {
        return Err(Error::Config("at least one output format is required".into()));
    }
    if reference.is_none()
        && let Some(f) = formats.iter().find(|f| f.requires_reference())
    {
        return Err(Error::Config(format!(
            "{} output requires a reference genome (--reference)",
            f
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fasta_needs_reference() {
        assert!(check_formats(&[OutputFormat::Txt, OutputFormat::Json], None).is_ok());
        let err = check_formats(&[OutputFormat::Fasta], None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(check_formats(&[OutputFormat::Fasta], Some("hg19.fa")).is_ok());
        assert!(check_formats(&[], Some("hg19.fa")).is_err());
    }
}
