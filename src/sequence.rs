//! Nucleotide helpers and the reference sequence lookup used to render fusions.

use std::collections::HashMap;

use rand::Rng;

use crate::error::{Error, Result};

const BASES: &[u8; 4] = b"ACTG";

/// Forward-strand reference lookup. Coordinates are 1-based inclusive.
pub trait SequenceSource {
    fn fetch(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<u8>>;
}

/// Reverse complement, preserving case. Bases other than ACGT are kept as is.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        other => other,
    }
}

/// Random `ACTG` sequence with a length drawn from `1..=max_len`.
pub fn random_sequence<R: Rng + ?Sized>(rng: &mut R, max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(1..=max_len.max(1));
    (0..len).map(|_| BASES[rng.gen_range(0..BASES.len())]).collect()
}

/// Sequences held in memory, keyed by chromosome.
#[derive(Debug, Default, Clone)]
pub struct InMemorySequence {
    contigs: HashMap<String, Vec<u8>>,
}

impl InMemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contig(mut self, name: &str, seq: &[u8]) -> Self {
        self.contigs.insert(name.to_string(), seq.to_vec());
        self
    }
}

impl SequenceSource for InMemorySequence {
    fn fetch(&mut self, chrom: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        let contig = self
            .contigs
            .get(chrom)
            .ok_or_else(|| Error::Resource(format!("Contig {} not found in reference", chrom)))?;
        if start == 0 || start > end + 1 || end as usize > contig.len() {
            return Err(Error::Resource(format!(
                "Region {}:{}-{} is outside the reference ({} bp)",
                chrom,
                start,
                end,
                contig.len()
            )));
        }
        Ok(contig[(start - 1) as usize..end as usize].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_reverse_complement_preserves_case() {
        assert_eq!(reverse_complement(b"AACGt"), b"aCGTT".to_vec());
        assert_eq!(reverse_complement(b"ACNGT"), b"ACNGT".to_vec());
    }

    #[test]
    fn test_reverse_complement_involution() {
        let seq = b"GATTACAgattacaNNCCGG";
        assert_eq!(reverse_complement(&reverse_complement(seq)), seq.to_vec());
    }

    #[test]
    fn test_random_sequence_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let s = random_sequence(&mut rng, 12);
            assert!(!s.is_empty() && s.len() <= 12);
            assert!(s.iter().all(|b| BASES.contains(b)));
        }
        assert_eq!(random_sequence(&mut rng, 1).len(), 1);
    }

    #[test]
    fn test_in_memory_fetch_one_based() {
        let mut src = InMemorySequence::new().with_contig("chr1", b"ACGTACGTAA");
        assert_eq!(src.fetch("chr1", 1, 4).unwrap(), b"ACGT".to_vec());
        assert_eq!(src.fetch("chr1", 9, 10).unwrap(), b"AA".to_vec());
        assert!(src.fetch("chr1", 9, 11).is_err());
        assert!(src.fetch("chr2", 1, 2).is_err());
    }
}
