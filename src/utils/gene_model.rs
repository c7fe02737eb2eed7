//! UCSC refFlat gene model reader.
//!
//! Columns: geneName, name, chrom, strand, txStart, txEnd, cdsStart, cdsEnd,
//! exonCount, exonStarts, exonEnds. Extra trailing columns are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};

use crate::error::{Error, Result};
use crate::transcript::{Strand, Transcript};

const MIN_FIELDS: usize = 11;

pub fn open_gene_model(path: &str) -> Result<GeneModelReader<BufReader<File>>> {
    let file = File::open(path)
        .map_err(|e| Error::Resource(format!("Error opening gene model {}: {}", path, e)))?;
    Ok(GeneModelReader::new(BufReader::new(file)))
}

/// Streams transcripts from a refFlat file, skipping blank and `#` lines.
pub struct GeneModelReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> GeneModelReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0 }
    }
}

impl<R: BufRead> Iterator for GeneModelReader<R> {
    type Item = Result<Transcript>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            return Some(parse_ref_flat_line(&line).map_err(|e| {
                Error::Parse(format!("Malformed gene model line {}: {}", self.line_no, e))
            }));
        }
    }
}

pub fn parse_ref_flat_line(line: &str) -> Result<Transcript> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < MIN_FIELDS {
        return Err(Error::Parse(format!(
            "expected at least {} columns, got {}",
            MIN_FIELDS,
            parts.len()
        )));
    }

    let strand: Strand = parts[3].parse()?;
    let tx_start = parse_u32(parts[4], "txStart")?;
    let tx_end = parse_u32(parts[5], "txEnd")?;
    let cds_start = parse_u32(parts[6], "cdsStart")?;
    let cds_end = parse_u32(parts[7], "cdsEnd")?;
    let exon_count = parts[8]
        .parse::<usize>()
        .map_err(|e| Error::Parse(format!("invalid exonCount '{}': {}", parts[8], e)))?;
    let starts = parse_coord_list(parts[9], "exonStarts")?;
    let ends = parse_coord_list(parts[10], "exonEnds")?;

    if starts.len() != ends.len() || starts.len() != exon_count {
        return Err(Error::Parse(format!(
            "exonCount {} does not match {} starts and {} ends",
            exon_count,
            starts.len(),
            ends.len()
        )));
    }

    let exons = starts.into_iter().zip(ends).collect();
    Transcript::new(parts[0], parts[1], parts[2], strand, tx_start, tx_end, cds_start, cds_end, exons)
}

fn parse_u32(s: &str, field: &str) -> Result<u32> {
    s.trim()
        .parse()
        .map_err(|e| Error::Parse(format!("invalid {} '{}': {}", field, s, e)))
}

/// Comma list with an optional trailing comma, e.g. `100,300,`.
fn parse_coord_list(s: &str, field: &str) -> Result<Vec<u32>> {
    s.trim()
        .trim_end_matches(',')
        .split(',')
        .filter(|v| !v.is_empty())
        .map(|v| parse_u32(v, field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TP53: &str = "TP53\tNM_000546\tchr17\t-\t7565096\t7590856\t7565256\t7579912\t3\t7565096,7577498,7579838,\t7565332,7577608,7590856,";

    #[test]
    fn test_parse_ref_flat_line() {
        let t = parse_ref_flat_line(TP53).unwrap();
        assert_eq!(t.gene_id, "TP53");
        assert_eq!(t.transcript_id, "NM_000546");
        assert_eq!(t.chrom, "chr17");
        assert_eq!(t.strand, Strand::Reverse);
        assert_eq!(t.exons().len(), 3);
        assert_eq!(t.exons()[1], (7577498, 7577608));
        assert_eq!(t.coding_exons()[0], (7565256, 7565332));
        assert_eq!(t.coding_exons()[2], (7579838, 7579912));
    }

    #[test]
    fn test_reader_skips_comments_and_blank_lines() {
        let data = format!("#geneName\tname\n\n{}\n{}\n", TP53, TP53.replace("NM_000546", "NM_001126112"));
        let transcripts = GeneModelReader::new(Cursor::new(data)).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(transcripts.len(), 2);
        assert_eq!(transcripts[1].transcript_id, "NM_001126112");
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let data = format!("{}\nchr1\t100\n", TP53);
        let err = GeneModelReader::new(Cursor::new(data)).collect::<Result<Vec<_>>>().unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[test]
    fn test_exon_count_mismatch() {
        let bad = TP53.replace("\t3\t", "\t4\t");
        assert!(parse_ref_flat_line(&bad).is_err());
    }

    #[test]
    fn test_invalid_strand() {
        let bad = TP53.replace("\t-\t", "\t.\t");
        assert!(parse_ref_flat_line(&bad).is_err());
    }
}
