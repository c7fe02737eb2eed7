//! Indexed BAM and FASTA inputs via noodles.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, Seek};
use std::path::Path;

use anyhow::{Context, anyhow, bail};
use log::debug;

use noodles::bam;
use noodles::bgzf;
use noodles::core::{Position, Region};
use noodles::csi::binning_index::ReferenceSequence as _;
use noodles::fasta;
use noodles::sam;

use crate::error::Result;
use crate::sequence::SequenceSource;
use crate::sim::depth::{AlignmentSource, AlignmentSourceFactory};

/// Build a 1-based inclusive region from a 0-based half-open interval.
fn region_for(chrom: &str, start: u32, end: u32) -> anyhow::Result<Region> {
    let first = Position::new(start as usize + 1)
        .ok_or_else(|| anyhow!("Invalid start {} for {}", start, chrom))?;
    let last = Position::new(end as usize)
        .ok_or_else(|| anyhow!("Invalid end {} for {}", end, chrom))?;
    Ok(Region::new(chrom, first..=last))
}

// ============================================================================
// Alignments
// ============================================================================

/// Indexed BAM handle counting reads over exon intervals.
pub struct BamAlignmentSource {
    reader: bam::io::IndexedReader<bgzf::io::Reader<File>>,
    header: sam::Header,
    refs: HashSet<String>,
    mapped_reads: u64,
}

impl BamAlignmentSource {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let index_path = format!("{}.bai", path);
        if !Path::new(&index_path).exists() {
            bail!(
                "Index file not found for '{}'. Expected '{}'. \
                 Create one with 'samtools index'.",
                path,
                index_path
            );
        }

        let index = bam::bai::fs::read(&index_path)
            .with_context(|| format!("Failed to read BAM index {}", index_path))?;
        let mapped_reads = index
            .reference_sequences()
            .iter()
            .filter_map(|rs| rs.metadata())
            .map(|m| m.mapped_record_count())
            .sum();

        let mut reader = bam::io::indexed_reader::Builder::default()
            .set_index(index)
            .build_from_path(path)
            .with_context(|| format!("Failed to open BAM {}", path))?;
        let header = reader
            .read_header()
            .with_context(|| format!("Failed to read BAM header {}", path))?;
        let refs = header
            .reference_sequences()
            .keys()
            .map(|name| String::from_utf8_lossy(name).to_string())
            .collect();

        Ok(Self { reader, header, refs, mapped_reads })
    }

    fn count(&mut self, chrom: &str, start: u32, end: u32) -> anyhow::Result<u64> {
        if end <= start || !self.refs.contains(chrom) {
            return Ok(0);
        }
        let region = region_for(chrom, start, end)?;
        let mut count = 0;
        for result in self.reader.query(&self.header, &region)? {
            let record = result?;
            let flags = record.flags();
            // A record counts unless both it and its mate are unmapped.
            if !flags.is_unmapped() || !flags.is_mate_unmapped() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl AlignmentSource for BamAlignmentSource {
    fn mapped_read_count(&self) -> u64 {
        self.mapped_reads
    }

    fn count_overlapping(&mut self, chrom: &str, start: u32, end: u32) -> Result<u64> {
        self.count(chrom, start, end)
            .with_context(|| format!("Failed to query {}:{}-{}", chrom, start + 1, end))
            .map_err(Into::into)
    }
}

/// Opens one independent BAM handle per depth worker.
#[derive(Debug, Clone)]
pub struct BamSourceFactory {
    path: String,
}

impl BamSourceFactory {
    /// Fails early if the BAM or its index cannot be opened.
    pub fn new(path: &str) -> Result<Self> {
        let source = BamAlignmentSource::open(path)?;
        debug!("{}: {} mapped reads in index", path, source.mapped_reads);
        Ok(Self { path: path.to_string() })
    }
}

impl AlignmentSourceFactory for BamSourceFactory {
    type Source = BamAlignmentSource;

    fn open(&self) -> Result<Self::Source> {
        Ok(BamAlignmentSource::open(&self.path)?)
    }
}

// ============================================================================
// Reference sequence
// ============================================================================

pub struct IndexedFastaSource<R> {
    reader: fasta::io::IndexedReader<R>,
}

/// Open a FASTA with a `.fai` index next to it.
pub fn open_reference(path: &str) -> Result<IndexedFastaSource<impl BufRead + Seek + use<>>> {
    let fai_path = format!("{}.fai", path);
    if !Path::new(&fai_path).exists() {
        return Err(anyhow!(
            "Missing FASTA index {}. Index the reference with 'samtools faidx {}'",
            fai_path,
            path
        )
        .into());
    }
    let reader = fasta::io::indexed_reader::Builder::default()
        .build_from_path(path)
        .with_context(|| format!("Failed to open FASTA reference {}", path))?;
    Ok(IndexedFastaSource { reader })
}

impl<R: BufRead + Seek> SequenceSource for IndexedFastaSource<R> {
    fn fetch(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        if end < start {
            return Ok(Vec::new());
        }
        let region = region_for(chrom, start.saturating_sub(1), end)?;
        let record = self
            .reader
            .query(&region)
            .with_context(|| format!("Failed to fetch {}:{}-{}", chrom, start, end))?;
        Ok(record.sequence().as_ref().to_vec())
    }
}
