//! Fusion genes: topology, construction options and sequence rendering.

use std::fmt;

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sequence::{SequenceSource, random_sequence, reverse_complement};
use crate::sim::breakpoint::{Breakpoint, TrimMode, boundary_break, frame_fixup, random_break, symmetric_break};
use crate::transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FusionType {
    Hybrid,
    SelfFusion,
    TriFusion,
    IntraChromosome,
    ReadThrough,
}

impl FusionType {
    pub const ALL: [FusionType; 5] = [
        FusionType::Hybrid,
        FusionType::SelfFusion,
        FusionType::TriFusion,
        FusionType::IntraChromosome,
        FusionType::ReadThrough,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FusionType::Hybrid => "hybrid",
            FusionType::SelfFusion => "self_fusion",
            FusionType::TriFusion => "tri_fusion",
            FusionType::IntraChromosome => "intra_chromosome",
            FusionType::ReadThrough => "read_through",
        }
    }

    /// Distinct genes drawn per event. Self fusions use their one gene twice.
    pub fn genes_per_fusion(&self) -> usize {
        match self {
            FusionType::SelfFusion => 1,
            FusionType::TriFusion => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for FusionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FusionOption {
    AutoCorrectOrientation,
    CdsOnly,
    SymmetricalExons,
    OutOfFrame,
    ForeignInsertion,
    KeepExonBoundary,
}

impl FusionOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            FusionOption::AutoCorrectOrientation => "auto_correct_orientation",
            FusionOption::CdsOnly => "cds_only",
            FusionOption::SymmetricalExons => "symmetrical_exons",
            FusionOption::OutOfFrame => "out_of_frame",
            FusionOption::ForeignInsertion => "foreign_insertion",
            FusionOption::KeepExonBoundary => "keep_exon_boundary",
        }
    }
}

impl fmt::Display for FusionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural constraints applied to every generated fusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FusionOptions {
    /// Reverse-complement partners on the opposite strand of gene 1.
    pub auto_correct_orientation: bool,
    /// Break within coding exons only.
    pub cds_only: bool,
    /// Prefer splitting at exons whose length is a multiple of 3.
    pub symmetrical_exons: bool,
    /// Allow fusions that shift the reading frame.
    pub out_of_frame: bool,
    /// Insert random bases at each junction.
    pub foreign_insertion: bool,
    /// Break only at in-frame exon boundaries.
    pub keep_exon_boundary: bool,
}

impl FusionOptions {
    pub fn enabled(&self) -> Vec<FusionOption> {
        [
            (self.auto_correct_orientation, FusionOption::AutoCorrectOrientation),
            (self.cds_only, FusionOption::CdsOnly),
            (self.symmetrical_exons, FusionOption::SymmetricalExons),
            (self.out_of_frame, FusionOption::OutOfFrame),
            (self.foreign_insertion, FusionOption::ForeignInsertion),
            (self.keep_exon_boundary, FusionOption::KeepExonBoundary),
        ]
        .into_iter()
        .filter_map(|(on, opt)| on.then_some(opt))
        .collect()
    }
}

impl fmt::Display for FusionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.enabled().iter().map(FusionOption::as_str).collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}

/// One transcript and the exons it contributes to the junction.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionSide {
    pub transcript: Transcript,
    pub breakpoint: Breakpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusionGene {
    pub fusion_type: FusionType,
    pub options: FusionOptions,
    pub sides: Vec<FusionSide>,
    /// Foreign bases placed after side `i`.
    pub insertions: Vec<Vec<u8>>,
    pub sequence: Option<Vec<u8>>,
}

impl FusionGene {
    pub fn new(fusion_type: FusionType, options: FusionOptions, sides: Vec<FusionSide>, insertions: Vec<Vec<u8>>) -> Self {
        Self { fusion_type, options, sides, insertions, sequence: None }
    }

    /// Gene ids joined by `-`, e.g. `BCR-ABL1`.
    pub fn name(&self) -> String {
        self.join_ids(|t| t.gene_id.as_str())
    }

    pub fn transcript_name(&self) -> String {
        self.join_ids(|t| t.transcript_id.as_str())
    }

    fn join_ids(&self, key: impl Fn(&Transcript) -> &str) -> String {
        let ids: Vec<&str> = self.sides.iter().map(|s| key(&s.transcript)).collect();
        ids.join("-")
    }

    /// Exonic bases contributed by the sides, insertions excluded.
    pub fn exonic_bases(&self) -> u64 {
        self.sides.iter().map(|s| s.breakpoint.bases()).sum()
    }

    /// Fetch and concatenate every side in transcript order, caching the result.
    pub fn assemble_sequence<S: SequenceSource + ?Sized>(&mut self, source: &mut S) -> Result<&[u8]> {
        if self.sequence.is_none() {
            let seq = self.render(source)?;
            self.sequence = Some(seq);
        }
        Ok(self.sequence.as_deref().unwrap_or_default())
    }

    fn render<S: SequenceSource + ?Sized>(&self, source: &mut S) -> Result<Vec<u8>> {
        let Some(lead) = self.sides.first().map(|s| s.transcript.strand) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (i, side) in self.sides.iter().enumerate() {
            let t = &side.transcript;
            let mut part = Vec::new();
            for (start, end) in side.breakpoint.logical_segments(t) {
                let seq = source.fetch(&t.chrom, start + 1, end)?;
                if t.strand.is_reverse() {
                    part.extend(reverse_complement(&seq));
                } else {
                    part.extend(seq);
                }
            }
            if self.options.auto_correct_orientation && t.strand != lead {
                part = reverse_complement(&part);
            }
            out.extend(part);
            if let Some(insert) = self.insertions.get(i) {
                out.extend_from_slice(insert);
            }
        }
        Ok(out)
    }
}

impl fmt::Display for FusionGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [{}]", self.name(), self.transcript_name(), self.fusion_type)
    }
}

/// Builds fusion genes from the transcripts picked for one event.
#[derive(Debug, Clone, Copy)]
pub struct FusionAssembler {
    options: FusionOptions,
    foreign_insertion_max_len: usize,
}

impl FusionAssembler {
    pub fn new(options: FusionOptions, foreign_insertion_max_len: usize) -> Self {
        Self { options, foreign_insertion_max_len }
    }

    pub fn options(&self) -> FusionOptions {
        self.options
    }

    /// The first transcript contributes its 5′ half, the rest their 3′ halves.
    /// Unless out-of-frame fusions are allowed, every partner after the first
    /// is trimmed so the bases up to and including it, insertions counted,
    /// stay a multiple of 3.
    pub fn assemble<R: Rng + ?Sized>(
        &self,
        fusion_type: FusionType,
        transcripts: Vec<Transcript>,
        rng: &mut R,
    ) -> Result<FusionGene> {
        if !(2..=3).contains(&transcripts.len()) {
            return Err(Error::InputData(format!(
                "A {} fusion needs 2 or 3 transcripts, got {}",
                fusion_type,
                transcripts.len()
            )));
        }
        let opts = &self.options;
        let trim = if opts.symmetrical_exons { TrimMode::Half } else { TrimMode::Random };

        let mut sides = Vec::with_capacity(transcripts.len());
        let mut insertions = Vec::new();
        let mut preceding = 0u64;
        for (i, t) in transcripts.into_iter().enumerate() {
            let five_prime = i == 0;
            if !five_prime && opts.foreign_insertion {
                let insert = random_sequence(rng, self.foreign_insertion_max_len);
                preceding += insert.len() as u64;
                insertions.push(insert);
            }

            let breakpoint = if opts.keep_exon_boundary {
                boundary_break(&t, five_prime, opts.cds_only, rng)?
            } else {
                let bp = if opts.symmetrical_exons {
                    symmetric_break(&t, five_prime, opts.cds_only, rng)?
                } else {
                    random_break(&t, five_prime, opts.cds_only, rng)?
                };
                if five_prime || opts.out_of_frame {
                    bp
                } else {
                    frame_fixup(&t, &bp, preceding, trim, rng)?
                }
            };
            preceding += breakpoint.bases();
            sides.push(FusionSide { transcript: t, breakpoint });
        }
        Ok(FusionGene::new(fusion_type, self.options, sides, insertions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::InMemorySequence;
    use crate::sim::breakpoint::split_at;
    use crate::transcript::Strand;
    use crate::transcript::tests::{make_transcript, make_transcript_at};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pair() -> Vec<Transcript> {
        vec![
            make_transcript_at("NM_1", "BCR", "chr22", Strand::Forward, 1000, &[40, 55, 61, 32]),
            make_transcript_at("NM_2", "ABL1", "chr9", Strand::Reverse, 5000, &[47, 38, 90, 20, 14]),
        ]
    }

    #[test]
    fn test_names_and_display() {
        assert_eq!(FusionType::SelfFusion.to_string(), "self_fusion");
        assert_eq!(FusionType::TriFusion.genes_per_fusion(), 3);
        assert_eq!(FusionType::SelfFusion.genes_per_fusion(), 1);
        let opts = FusionOptions { cds_only: true, keep_exon_boundary: true, ..Default::default() };
        assert_eq!(opts.to_string(), "cds_only,keep_exon_boundary");
        assert_eq!(FusionOptions::default().to_string(), "none");
        assert_eq!(
            serde_json::to_string(&FusionOption::AutoCorrectOrientation).unwrap(),
            "\"auto_correct_orientation\""
        );
    }

    #[test]
    fn test_hybrid_sides_keep_their_ends() {
        let mut rng = StdRng::seed_from_u64(21);
        let asm = FusionAssembler::new(FusionOptions { out_of_frame: true, ..Default::default() }, 50);
        for _ in 0..50 {
            let f = asm.assemble(FusionType::Hybrid, pair(), &mut rng).unwrap();
            assert_eq!(f.name(), "BCR-ABL1");
            assert_eq!(f.transcript_name(), "NM_1-NM_2");
            // 5' end of BCR is genomic exon 0, 3' end of reverse ABL1 is genomic exon 0
            assert_eq!(f.sides[0].breakpoint.exon_indices[0], 0);
            assert_eq!(f.sides[1].breakpoint.exon_indices[0], 0);
            assert!(f.insertions.is_empty());
        }
    }

    #[test]
    fn test_in_frame_after_fixup() {
        let mut rng = StdRng::seed_from_u64(22);
        for symmetrical in [false, true] {
            let asm = FusionAssembler::new(FusionOptions { symmetrical_exons: symmetrical, ..Default::default() }, 50);
            for _ in 0..100 {
                let f = asm.assemble(FusionType::Hybrid, pair(), &mut rng).unwrap();
                assert_eq!(f.exonic_bases() % 3, 0);
            }
        }
    }

    #[test]
    fn test_tri_fusion_every_junction_in_frame() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut ts = pair();
        ts.push(make_transcript_at("NM_3", "PML", "chr15", Strand::Forward, 200, &[70, 44, 81]));
        let asm = FusionAssembler::new(FusionOptions::default(), 50);
        for _ in 0..100 {
            let f = asm.assemble(FusionType::TriFusion, ts.clone(), &mut rng).unwrap();
            assert_eq!(f.sides.len(), 3);
            let through_two = f.sides[0].breakpoint.bases() + f.sides[1].breakpoint.bases();
            assert_eq!(through_two % 3, 0);
            assert_eq!(f.exonic_bases() % 3, 0);
        }
    }

    #[test]
    fn test_insertions_counted_in_frame() {
        let mut rng = StdRng::seed_from_u64(24);
        let opts = FusionOptions { foreign_insertion: true, ..Default::default() };
        let asm = FusionAssembler::new(opts, 10);
        for _ in 0..100 {
            let f = asm.assemble(FusionType::Hybrid, pair(), &mut rng).unwrap();
            assert_eq!(f.insertions.len(), 1);
            let insert = f.insertions[0].len() as u64;
            assert!((1..=10).contains(&insert));
            assert_eq!((f.exonic_bases() + insert) % 3, 0);
        }
    }

    #[test]
    fn test_boundary_mode_five_prime_in_frame() {
        let mut rng = StdRng::seed_from_u64(25);
        let opts = FusionOptions { keep_exon_boundary: true, ..Default::default() };
        let asm = FusionAssembler::new(opts, 50);
        let ts = vec![
            make_transcript("NM_1", "A", Strand::Forward, &[30, 31, 29, 40]),
            make_transcript("NM_2", "B", Strand::Forward, &[33, 13, 10]),
        ];
        for _ in 0..50 {
            let f = asm.assemble(FusionType::Hybrid, ts.clone(), &mut rng).unwrap();
            assert_eq!(f.sides[0].breakpoint.bases() % 3, 0);
            // the only in-frame prefix of B that leaves exons is its first exon
            assert_eq!(f.sides[1].breakpoint.exon_indices, vec![1, 2]);
        }
    }

    #[test]
    fn test_too_few_transcripts() {
        let mut rng = StdRng::seed_from_u64(26);
        let asm = FusionAssembler::new(FusionOptions::default(), 50);
        let err = asm.assemble(FusionType::Hybrid, vec![pair().remove(0)], &mut rng).unwrap_err();
        assert!(err.is_recoverable());
    }

    fn sequence_fixture(options: FusionOptions, insertions: Vec<Vec<u8>>) -> FusionGene {
        let t1 = Transcript::new("G1", "T1", "chr1", Strand::Forward, 0, 12, 0, 12, vec![(0, 4), (8, 12)]).unwrap();
        let t2 = Transcript::new("G2", "T2", "chr2", Strand::Reverse, 0, 8, 0, 8, vec![(0, 3), (5, 8)]).unwrap();
        let sides = vec![
            FusionSide { breakpoint: split_at(&t1, 2, true, false).unwrap(), transcript: t1 },
            FusionSide { breakpoint: split_at(&t2, 0, false, false).unwrap(), transcript: t2 },
        ];
        FusionGene::new(FusionType::Hybrid, options, sides, insertions)
    }

    fn reference() -> InMemorySequence {
        InMemorySequence::new()
            .with_contig("chr1", b"AAAACCCCGGGGTTTT")
            .with_contig("chr2", b"AACGTTTCCA")
    }

    #[test]
    fn test_sequence_reverse_strand_side() {
        let mut f = sequence_fixture(FusionOptions::default(), vec![]);
        // chr2 exons TTC then AAC in transcript order, each reverse complemented
        assert_eq!(f.assemble_sequence(&mut reference()).unwrap(), b"AAAAGGGGGAAGTT");
        assert!(f.sequence.is_some());
    }

    #[test]
    fn test_sequence_auto_correct_and_insertion() {
        let opts = FusionOptions { auto_correct_orientation: true, ..Default::default() };
        let mut f = sequence_fixture(opts, vec![b"NN".to_vec()]);
        assert_eq!(f.assemble_sequence(&mut reference()).unwrap(), b"AAAAGGGGNNAACTTC");
    }

    #[test]
    fn test_sequence_missing_contig_is_fatal() {
        let mut f = sequence_fixture(FusionOptions::default(), vec![]);
        let mut src = InMemorySequence::new().with_contig("chr1", b"AAAACCCCGGGGTTTT");
        let err = f.assemble_sequence(&mut src).unwrap_err();
        assert!(!err.is_recoverable());
    }
}
