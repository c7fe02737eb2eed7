//! Transcript annotation model.
//!
//! Exon intervals are 0-based half-open and always stored in ascending
//! genomic order. The strand only changes the *logical* order: a reverse
//! strand transcript starts (5′) at its last genomic exon.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Forward),
            '-' => Some(Strand::Reverse),
            _ => None,
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Strand::Reverse)
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

impl FromStr for Strand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Strand::from_char(c)
                .ok_or_else(|| Error::Parse(format!("Invalid strand '{}'", s))),
            _ => Err(Error::Parse(format!("Invalid strand '{}'", s))),
        }
    }
}

/// Half-open genomic interval `[start, end)`.
pub type Interval = (u32, u32);

pub fn interval_len(iv: &Interval) -> u32 {
    iv.1.saturating_sub(iv.0)
}

/// One annotated transcript plus the depth score assigned by background
/// estimation (0 until scored).
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub gene_id: String,
    pub transcript_id: String,
    pub chrom: String,
    pub strand: Strand,
    pub tx_start: u32,
    pub tx_end: u32,
    pub cds_start: u32,
    pub cds_end: u32,
    pub depth_score: f64,
    exons: Vec<Interval>,
    coding_exons: Vec<Interval>,
    exon_bases: u64,
    cds_exon_bases: u64,
}

impl Transcript {
    /// Build a transcript and derive its coding exons.
    ///
    /// Each exon is intersected with `[cds_start, cds_end]`. The overlap falls in
    /// one of four cases: exon fully inside the CDS, exon clipped on the left by
    /// `cds_start`, clipped on the right by `cds_end`, or containing the whole
    /// CDS. Exons outside the CDS, and empty intersections (non-coding
    /// transcripts have `cds_start == cds_end`), contribute nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gene_id: &str,
        transcript_id: &str,
        chrom: &str,
        strand: Strand,
        tx_start: u32,
        tx_end: u32,
        cds_start: u32,
        cds_end: u32,
        exons: Vec<Interval>,
    ) -> Result<Self> {
        if exons.is_empty() {
            return Err(Error::Parse(format!("Transcript {} has no exons", transcript_id)));
        }
        for (i, e) in exons.iter().enumerate() {
            if e.0 > e.1 {
                return Err(Error::Parse(format!(
                    "Transcript {} exon {} has start {} after end {}",
                    transcript_id, i, e.0, e.1
                )));
            }
            if i > 0 && exons[i - 1].1 > e.0 {
                return Err(Error::Parse(format!(
                    "Transcript {} exons are not sorted or overlap at exon {}",
                    transcript_id, i
                )));
            }
        }

        let exon_bases = exons.iter().map(|e| interval_len(e) as u64).sum();
        let coding_exons: Vec<Interval> = exons
            .iter()
            .filter(|&&(start, end)| start <= cds_end && end >= cds_start)
            .map(|&(start, end)| (start.max(cds_start), end.min(cds_end)))
            .filter(|&(start, end)| start < end)
            .collect();
        let cds_exon_bases = coding_exons.iter().map(|e| interval_len(e) as u64).sum();

        Ok(Self {
            gene_id: gene_id.to_string(),
            transcript_id: transcript_id.to_string(),
            chrom: chrom.to_string(),
            strand,
            tx_start,
            tx_end,
            cds_start,
            cds_end,
            depth_score: 0.0,
            exons,
            coding_exons,
            exon_bases,
            cds_exon_bases,
        })
    }

    pub fn exons(&self) -> &[Interval] {
        &self.exons
    }

    pub fn coding_exons(&self) -> &[Interval] {
        &self.coding_exons
    }

    /// Exon set used for breakpoints: coding exons when `cds_only`.
    pub fn exon_set(&self, cds_only: bool) -> &[Interval] {
        if cds_only { &self.coding_exons } else { &self.exons }
    }

    pub fn exon_bases(&self) -> u64 {
        self.exon_bases
    }

    pub fn cds_exon_bases(&self) -> u64 {
        self.cds_exon_bases
    }

    pub fn is_coding(&self) -> bool {
        !self.coding_exons.is_empty()
    }

    /// Map a logical (5′→3′) position to the genomic index within a set of `n` exons.
    pub fn genomic_index(&self, logical: usize, n: usize) -> usize {
        if self.strand.is_reverse() { n - 1 - logical } else { logical }
    }

    pub fn with_depth_score(mut self, score: f64) -> Self {
        self.depth_score = score;
        self
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}:{}-{} {}",
            self.transcript_id, self.gene_id, self.chrom, self.tx_start, self.tx_end, self.strand
        )
    }
}
