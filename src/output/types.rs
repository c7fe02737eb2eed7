//! Serializable result document for a simulation run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::sim::fusion::{FusionGene, FusionOption, FusionSide, FusionType};

/// Top-level result document written to `<prefix>.result.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SimulationOutput {
    /// fusim version
    pub version: String,

    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,

    /// Input files used for the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<RunInputs>,

    /// Effective simulation parameters after merging file and flags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<SimulationConfig>,

    /// Requested, generated and skipped event counts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryOutput>,

    /// Generated fusions in output order
    #[serde(default)]
    pub fusions: Vec<FusionRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunInputs {
    /// refFlat gene model
    pub gene_model: String,

    /// Background alignments used for depth-weighted selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,

    /// Indexed reference FASTA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SummaryOutput {
    pub requested: usize,
    pub generated: usize,
    pub skipped: usize,
    /// Generated count per requested fusion type
    pub per_type: Vec<TypeCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TypeCount {
    pub fusion_type: FusionType,
    pub count: usize,
}

// ============================================================================
// Fusions
// ============================================================================

/// One simulated fusion gene
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FusionRecord {
    /// Gene ids joined by '-'
    pub name: String,

    pub fusion_type: FusionType,

    /// Options in effect when the fusion was built
    pub options: Vec<FusionOption>,

    /// Contributing transcripts in 5' to 3' fusion order
    pub sides: Vec<FusionSideRecord>,

    /// Foreign bases inserted after each side but the last
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insertions: Vec<String>,

    /// Assembled nucleotide sequence, when a reference was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FusionSideRecord {
    pub transcript_id: String,
    pub gene_id: String,
    pub chrom: String,
    /// "+" or "-"
    pub strand: String,
    /// Indices into the exon (or coding exon) list, ascending
    pub exons: Vec<usize>,
    /// Genomic segments, 0-based half-open
    pub segments: Vec<Segment>,
    /// `chrom:start-end,...` with 1-based starts
    pub region: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub start: u32,
    pub end: u32,
}

impl From<&FusionSide> for FusionSideRecord {
    fn from(side: &FusionSide) -> Self {
        let t = &side.transcript;
        Self {
            transcript_id: t.transcript_id.clone(),
            gene_id: t.gene_id.clone(),
            chrom: t.chrom.clone(),
            strand: t.strand.to_string(),
            exons: side.breakpoint.exon_indices.clone(),
            segments: side
                .breakpoint
                .segments
                .iter()
                .map(|&(start, end)| Segment { start, end })
                .collect(),
            region: side.breakpoint.region_string(&t.chrom),
        }
    }
}

impl From<&FusionGene> for FusionRecord {
    fn from(f: &FusionGene) -> Self {
        Self {
            name: f.name(),
            fusion_type: f.fusion_type,
            options: f.options.enabled(),
            sides: f.sides.iter().map(FusionSideRecord::from).collect(),
            insertions: f
                .insertions
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
            sequence: f.sequence.as_ref().map(|s| String::from_utf8_lossy(s).into_owned()),
        }
    }
}
