//! Run configuration for fusim.
//!
//! A `SimulationConfig` can be loaded from JSON; every field has a default so
//! an empty object is a valid (if useless) file. Command-line flags are merged
//! on top by the binary before `validate()` runs.

use std::fs::File;
use std::io::BufReader;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sim::fusion::{FusionOptions, FusionType};
use crate::sim::sampler::SelectionMethod;
use crate::sim::select::Filter;

// ============================================================================
// Event Counts
// ============================================================================

/// Number of fusions requested per topology.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EventCounts {
    pub hybrid: usize,
    pub self_fusion: usize,
    pub tri_fusion: usize,
    pub intra_chromosome: usize,
    pub read_through: usize,
}

impl EventCounts {
    pub fn get(&self, fusion_type: FusionType) -> usize {
        match fusion_type {
            FusionType::Hybrid => self.hybrid,
            FusionType::SelfFusion => self.self_fusion,
            FusionType::TriFusion => self.tri_fusion,
            FusionType::IntraChromosome => self.intra_chromosome,
            FusionType::ReadThrough => self.read_through,
        }
    }

    pub fn set(&mut self, fusion_type: FusionType, n: usize) {
        let slot = match fusion_type {
            FusionType::Hybrid => &mut self.hybrid,
            FusionType::SelfFusion => &mut self.self_fusion,
            FusionType::TriFusion => &mut self.tri_fusion,
            FusionType::IntraChromosome => &mut self.intra_chromosome,
            FusionType::ReadThrough => &mut self.read_through,
        };
        *slot = n;
    }

    pub fn total(&self) -> usize {
        FusionType::ALL.iter().map(|&t| self.get(t)).sum()
    }
}

// ============================================================================
// Simulation Configuration
// ============================================================================

fn default_rpkm_cutoff() -> f64 { 0.2 }
fn default_threads() -> usize { 1 }
fn default_foreign_insertion_max_len() -> usize { 50 }

/// Everything that shapes a simulation run apart from input and output paths.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    #[serde(flatten)]
    pub events: EventCounts,
    /// Gene selection method
    #[serde(default)]
    pub method: SelectionMethod,
    #[serde(flatten)]
    pub options: FusionOptions,
    /// Transcripts at or below this RPKM are dropped in background mode
    #[serde(default = "default_rpkm_cutoff")]
    pub rpkm_cutoff: f64,
    /// Threads for background read depth estimation
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Longest random sequence inserted at a junction
    #[serde(default = "default_foreign_insertion_max_len")]
    pub foreign_insertion_max_len: usize,
    /// Seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    /// Gene ids, transcript ids or chromosomes allowed in the first slot
    #[serde(default)]
    pub gene1: Vec<String>,
    #[serde(default)]
    pub gene2: Vec<String>,
    #[serde(default)]
    pub gene3: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            events: EventCounts::default(),
            method: SelectionMethod::default(),
            options: FusionOptions::default(),
            rpkm_cutoff: default_rpkm_cutoff(),
            threads: default_threads(),
            foreign_insertion_max_len: default_foreign_insertion_max_len(),
            seed: None,
            gene1: vec![],
            gene2: vec![],
            gene3: vec![],
        }
    }
}

pub fn check_rpkm_cutoff(cutoff: f64) -> Result<()> {
    if !cutoff.is_finite() || cutoff < 0.0 {
        return Err(Error::Config(format!("rpkm cutoff must be a finite value >= 0, got {}", cutoff)));
    }
    Ok(())
}

impl SimulationConfig {
    /// Load simulation configuration from a JSON file
    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: SimulationConfig = serde_json::from_reader(reader)
            .map_err(|e| Error::Config(format!("{}: {}", path, e)))?;
        Ok(config)
    }

    /// Filter for slot `slot` (0-based), if one was given.
    pub fn filter(&self, slot: usize) -> Option<Filter> {
        let keys = match slot {
            0 => &self.gene1,
            1 => &self.gene2,
            2 => &self.gene3,
            _ => return None,
        };
        let filter = Filter::new(keys.iter().cloned());
        (!filter.is_empty()).then_some(filter)
    }

    pub fn has_filters(&self) -> bool {
        (0..3).any(|slot| self.filter(slot).is_some())
    }

    /// Reject settings that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        check_rpkm_cutoff(self.rpkm_cutoff)?;
        if self.threads == 0 {
            return Err(Error::Config("threads must be at least 1".into()));
        }
        if self.events.total() == 0 {
            return Err(Error::Config(
                "no fusion events requested; set at least one of hybrid, self_fusion, \
                 tri_fusion, intra_chromosome or read_through"
                    .into(),
            ));
        }
        if self.options.foreign_insertion && self.foreign_insertion_max_len == 0 {
            return Err(Error::Config("foreign insertion length must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_uses_defaults() {
        let cfg: SimulationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, SimulationConfig::default());
        assert_eq!(cfg.rpkm_cutoff, 0.2);
        assert_eq!(cfg.threads, 1);
        assert_eq!(cfg.foreign_insertion_max_len, 50);
        assert_eq!(cfg.method, SelectionMethod::Uniform);
    }

    #[test]
    fn test_flat_fields() {
        let json = r#"{
            "hybrid": 10,
            "read_through": 2,
            "method": "empirical-sturges",
            "cds_only": true,
            "keep_exon_boundary": true,
            "seed": 42,
            "gene1": ["BCR"]
        }"#;
        let cfg: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.events.get(FusionType::Hybrid), 10);
        assert_eq!(cfg.events.total(), 12);
        assert_eq!(cfg.method, SelectionMethod::EmpiricalSturges);
        assert!(cfg.options.cds_only && cfg.options.keep_exon_boundary);
        assert!(!cfg.options.out_of_frame);
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.filter(0).unwrap().to_string(), "[BCR]");
        assert!(cfg.filter(1).is_none());
        assert!(cfg.has_filters());
    }

    #[test]
    fn test_validate() {
        let mut cfg = SimulationConfig::default();
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        cfg.events.set(FusionType::SelfFusion, 3);
        assert!(cfg.validate().is_ok());

        cfg.rpkm_cutoff = -1.0;
        assert!(cfg.validate().is_err());
        cfg.rpkm_cutoff = f64::NAN;
        assert!(cfg.validate().is_err());
        cfg.rpkm_cutoff = 0.0;
        cfg.threads = 0;
        assert!(cfg.validate().is_err());
        cfg.threads = 4;
        cfg.options.foreign_insertion = true;
        cfg.foreign_insertion_max_len = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rpkm_cutoff_bounds() {
        assert!(check_rpkm_cutoff(0.0).is_ok());
        assert!(check_rpkm_cutoff(3.5).is_ok());
        for bad in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(check_rpkm_cutoff(bad), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_unknown_method_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut f = File::create(&path).unwrap();
        write!(f, r#"{{"method": "weighted"}}"#).unwrap();
        let err = SimulationConfig::load(&path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
