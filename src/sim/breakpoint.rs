//! Exon-level breakpoints for one side of a fusion junction.
//!
//! Positions are *logical* (5′→3′ along the transcript) while the indices a
//! [`Breakpoint`] stores are genomic, ascending. A reverse strand transcript
//! maps logical position `i` of `n` exons to genomic index `n - 1 - i`.

use rand::Rng;

use crate::error::{Error, Result};
use crate::transcript::{Interval, Transcript, interval_len};

#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    /// Indices into the transcript's exon set, ascending genomic order.
    pub exon_indices: Vec<usize>,
    /// Genomic intervals of those exons; only frame trimming makes them differ
    /// from the source exons.
    pub segments: Vec<Interval>,
}

impl Breakpoint {
    fn from_indices(exons: &[Interval], mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        let segments = indices.iter().map(|&i| exons[i]).collect();
        Self { exon_indices: indices, segments }
    }

    pub fn bases(&self) -> u64 {
        self.segments.iter().map(|s| interval_len(s) as u64).sum()
    }

    /// Segments in transcript (5′→3′) order.
    pub fn logical_segments(&self, transcript: &Transcript) -> Vec<Interval> {
        if transcript.strand.is_reverse() {
            self.segments.iter().rev().copied().collect()
        } else {
            self.segments.clone()
        }
    }

    /// `chrom:s1-e1,s2-e2` with 1-based starts.
    pub fn region_string(&self, chrom: &str) -> String {
        let parts: Vec<String> = self.segments.iter().map(|s| format!("{}-{}", s.0 + 1, s.1)).collect();
        format!("{}:{}", chrom, parts.join(","))
    }

    pub fn exons_string(&self) -> String {
        let parts: Vec<String> = self.exon_indices.iter().map(|i| i.to_string()).collect();
        parts.join(",")
    }
}

fn exon_set<'a>(transcript: &'a Transcript, cds_only: bool) -> Result<&'a [Interval]> {
    let exons = transcript.exon_set(cds_only);
    if exons.is_empty() {
        return Err(Error::InputData(format!(
            "Missing {}exons for {}",
            if cds_only { "coding " } else { "" },
            transcript
        )));
    }
    Ok(exons)
}

/// Deterministic split at logical boundary `k`: the 5′ half is logical `0..k`,
/// the 3′ half is `k..n`. Both halves of the same `k` partition the exon set.
pub fn split_at(transcript: &Transcript, k: usize, keep_first_half: bool, cds_only: bool) -> Result<Breakpoint> {
    let exons = exon_set(transcript, cds_only)?;
    let n = exons.len();
    let range = if keep_first_half { 0..k } else { k..n };
    if range.is_empty() || range.end > n {
        return Err(Error::InputData(format!(
            "Split {} leaves no exons on the {} side of {}",
            k,
            if keep_first_half { "5'" } else { "3'" },
            transcript
        )));
    }
    let indices = range.map(|l| transcript.genomic_index(l, n)).collect();
    Ok(Breakpoint::from_indices(exons, indices))
}

/// Split at a uniformly chosen exon: the 5′ half keeps logical `0..=idx`, the
/// 3′ half keeps `idx..n`.
pub fn random_break<R: Rng + ?Sized>(
    transcript: &Transcript,
    keep_first_half: bool,
    cds_only: bool,
    rng: &mut R,
) -> Result<Breakpoint> {
    let n = exon_set(transcript, cds_only)?.len();
    let idx = rng.gen_range(0..n);
    split_at(transcript, split_point(idx, keep_first_half), keep_first_half, cds_only)
}

/// Like [`random_break`] but the split exon is drawn from exons whose length is
/// a multiple of 3, when there are any.
pub fn symmetric_break<R: Rng + ?Sized>(
    transcript: &Transcript,
    keep_first_half: bool,
    cds_only: bool,
    rng: &mut R,
) -> Result<Breakpoint> {
    let exons = exon_set(transcript, cds_only)?;
    let n = exons.len();
    let candidates: Vec<usize> = (0..n)
        .filter(|&l| interval_len(&exons[transcript.genomic_index(l, n)]) % 3 == 0)
        .collect();
    if candidates.is_empty() {
        return random_break(transcript, keep_first_half, cds_only, rng);
    }
    let idx = candidates[rng.gen_range(0..candidates.len())];
    split_at(transcript, split_point(idx, keep_first_half), keep_first_half, cds_only)
}

fn split_point(idx: usize, keep_first_half: bool) -> usize {
    if keep_first_half { idx + 1 } else { idx }
}

/// Logical prefix lengths whose cumulative exon length is non-zero and a
/// multiple of 3. The full transcript is one of the candidates, so it also
/// covers the whole-list fallback.
pub fn valid_boundary_prefixes(transcript: &Transcript, cds_only: bool) -> Result<Vec<usize>> {
    let exons = exon_set(transcript, cds_only)?;
    let n = exons.len();
    let mut valid = Vec::new();
    let mut length = 0u64;
    for k in 1..=n {
        length += interval_len(&exons[transcript.genomic_index(k - 1, n)]) as u64;
        if length != 0 && length % 3 == 0 {
            valid.push(k);
        }
    }
    Ok(valid)
}

/// All in-frame 5′ breaks, each as ascending genomic exon indices.
pub fn valid_boundary_breaks(transcript: &Transcript, cds_only: bool) -> Result<Vec<Vec<usize>>> {
    valid_boundary_prefixes(transcript, cds_only)?
        .into_iter()
        .map(|k| split_at(transcript, k, true, cds_only).map(|bp| bp.exon_indices))
        .collect()
}

/// In-frame exon-boundary break. The 5′ side is a valid prefix; the 3′ side is
/// the remainder after a valid prefix, so it starts on codon phase 0.
pub fn boundary_break<R: Rng + ?Sized>(
    transcript: &Transcript,
    keep_first_half: bool,
    cds_only: bool,
    rng: &mut R,
) -> Result<Breakpoint> {
    let n = exon_set(transcript, cds_only)?.len();
    let mut prefixes = valid_boundary_prefixes(transcript, cds_only)?;
    if !keep_first_half {
        prefixes.retain(|&k| k < n);
    }
    if prefixes.is_empty() {
        return Err(Error::InputData(format!("No valid exon breaks found for {}", transcript)));
    }
    let k = prefixes[rng.gen_range(0..prefixes.len())];
    split_at(transcript, k, keep_first_half, cds_only)
}

/// How far into the trailing exon the frame trim cuts before rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    Random,
    Half,
}

/// Trim the logically last exon of `bp` so that `preceding + bp.bases()` is a
/// multiple of 3. The cut is chosen by `mode` then rounded down to the nearest
/// length that restores the frame. Forward strand exons lose bases from their
/// end, reverse strand exons from their start.
pub fn frame_fixup<R: Rng + ?Sized>(
    transcript: &Transcript,
    bp: &Breakpoint,
    preceding: u64,
    mode: TrimMode,
    rng: &mut R,
) -> Result<Breakpoint> {
    if (preceding + bp.bases()) % 3 == 0 {
        return Ok(bp.clone());
    }
    let reverse = transcript.strand.is_reverse();
    let last = if reverse { 0 } else { bp.segments.len() - 1 };
    let (start, end) = bp.segments[last];
    let last_len = (end - start) as u64;
    let other = preceding + bp.bases() - last_len;

    let valid: Vec<u64> = (1..=last_len).filter(|l| (other + l) % 3 == 0).collect();
    if valid.is_empty() {
        return Err(Error::InputData(format!(
            "Cannot restore reading frame by trimming a {} bp exon of {}",
            last_len, transcript
        )));
    }
    let cut = match mode {
        TrimMode::Random => rng.gen_range(1..=last_len),
        TrimMode::Half => (last_len / 2).max(1),
    };
    let keep = valid.iter().rev().find(|&&l| l <= cut).copied().unwrap_or(valid[0]) as u32;

    let mut trimmed = bp.clone();
    trimmed.segments[last] = if reverse { (end - keep, end) } else { (start, start + keep) };
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Strand;
    use crate::transcript::tests::make_transcript;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn is_contiguous(v: &[usize]) -> bool {
        v.windows(2).all(|w| w[1] == w[0] + 1)
    }

    #[test]
    fn test_split_halves_partition_exons() {
        for strand in [Strand::Forward, Strand::Reverse] {
            let t = make_transcript("NM_1", "G", strand, &[10, 20, 30, 40, 50]);
            for k in 1..5 {
                let first = split_at(&t, k, true, false).unwrap();
                let second = split_at(&t, k, false, false).unwrap();
                let mut all: Vec<usize> = first.exon_indices.iter().chain(&second.exon_indices).copied().collect();
                all.sort();
                assert_eq!(all, vec![0, 1, 2, 3, 4]);
                assert!(first.exon_indices.iter().all(|i| !second.exon_indices.contains(i)));
                assert_eq!(first.bases() + second.bases(), t.exon_bases());
            }
        }
    }

    #[test]
    fn test_first_half_starts_at_five_prime() {
        let fwd = make_transcript("NM_1", "G", Strand::Forward, &[10, 20, 30, 40]);
        let bp = split_at(&fwd, 2, true, false).unwrap();
        assert_eq!(bp.exon_indices, vec![0, 1]);

        let rev = make_transcript("NM_2", "G", Strand::Reverse, &[10, 20, 30, 40]);
        let bp = split_at(&rev, 2, true, false).unwrap();
        // logical 0..2 of a reverse transcript are the last two genomic exons
        assert_eq!(bp.exon_indices, vec![2, 3]);
        assert_eq!(bp.logical_segments(&rev)[0], rev.exons()[3]);
    }

    #[test]
    fn test_split_rejects_empty_side() {
        let t = make_transcript("NM_1", "G", Strand::Forward, &[10, 20]);
        assert!(split_at(&t, 0, true, false).is_err());
        assert!(split_at(&t, 2, false, false).is_err());
        assert!(split_at(&t, 3, true, false).is_err());
    }

    #[test]
    fn test_random_break_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        for strand in [Strand::Forward, Strand::Reverse] {
            let t = make_transcript("NM_1", "G", strand, &[10, 20, 30, 40, 50, 60]);
            for _ in 0..100 {
                for keep_first in [true, false] {
                    let bp = random_break(&t, keep_first, false, &mut rng).unwrap();
                    assert!(!bp.exon_indices.is_empty());
                    assert!(is_contiguous(&bp.exon_indices));
                    let five_prime = t.genomic_index(0, 6);
                    let three_prime = t.genomic_index(5, 6);
                    if keep_first {
                        assert!(bp.exon_indices.contains(&five_prime));
                    } else {
                        assert!(bp.exon_indices.contains(&three_prime));
                    }
                }
            }
        }
    }

    #[test]
    fn test_random_break_missing_exons() {
        let mut rng = StdRng::seed_from_u64(12);
        let t = Transcript::new("G", "NR_1", "chr1", Strand::Forward, 0, 100, 100, 100, vec![(0, 100)]).unwrap();
        let err = random_break(&t, true, true, &mut rng).unwrap_err();
        assert!(err.is_recoverable());
        assert!(random_break(&t, true, false, &mut rng).is_ok());
    }

    #[test]
    fn test_boundary_candidates_all_multiples_of_three() {
        let t = make_transcript("NM_1", "G", Strand::Forward, &[30, 30, 30, 30]);
        assert_eq!(valid_boundary_prefixes(&t, true).unwrap(), vec![1, 2, 3, 4]);
        let breaks = valid_boundary_breaks(&t, true).unwrap();
        assert_eq!(breaks, vec![vec![0], vec![0, 1], vec![0, 1, 2], vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_boundary_prefixes_respect_strand() {
        let fwd = make_transcript("NM_1", "G", Strand::Forward, &[30, 31, 29]);
        assert_eq!(valid_boundary_prefixes(&fwd, false).unwrap(), vec![1, 3]);
        let rev = make_transcript("NM_2", "G", Strand::Reverse, &[31, 30, 29]);
        // logical lengths 29, 30, 31
        assert_eq!(valid_boundary_prefixes(&rev, false).unwrap(), vec![3]);
        let rev2 = make_transcript("NM_3", "G", Strand::Reverse, &[31, 32, 28]);
        // logical lengths 28, 32, 31: cumulative 28, 60, 91
        assert_eq!(valid_boundary_breaks(&rev2, false).unwrap(), vec![vec![1, 2]]);
    }

    #[test]
    fn test_boundary_break_always_in_frame() {
        let mut rng = StdRng::seed_from_u64(13);
        for trial in 0..200u32 {
            let lens: Vec<u32> = (0..6).map(|_| rng.gen_range(1..200)).collect();
            let strand = if trial % 2 == 0 { Strand::Forward } else { Strand::Reverse };
            let t = make_transcript("NM_1", "G", strand, &lens);
            match boundary_break(&t, true, false, &mut rng) {
                Ok(bp) => {
                    assert_eq!(bp.bases() % 3, 0);
                    assert!(is_contiguous(&bp.exon_indices));
                    assert!(bp.exon_indices.contains(&t.genomic_index(0, 6)));
                }
                Err(e) => {
                    assert!(e.is_recoverable());
                    assert!(valid_boundary_prefixes(&t, false).unwrap().is_empty());
                }
            }
        }
    }

    #[test]
    fn test_boundary_three_prime_starts_in_phase() {
        let mut rng = StdRng::seed_from_u64(14);
        let t = make_transcript("NM_1", "G", Strand::Forward, &[30, 31, 29, 40]);
        for _ in 0..50 {
            let bp = boundary_break(&t, false, false, &mut rng).unwrap();
            // prefixes of 30 and 90 bp are in frame and leave exons behind them
            assert!(bp.exon_indices == vec![1, 2, 3] || bp.exon_indices == vec![3]);
        }
    }

    #[test]
    fn test_boundary_none_valid() {
        let mut rng = StdRng::seed_from_u64(15);
        let t = make_transcript("NM_1", "G", Strand::Forward, &[10, 10]);
        assert!(valid_boundary_breaks(&t, false).unwrap().is_empty());
        let err = boundary_break(&t, true, false, &mut rng).unwrap_err();
        assert!(err.to_string().contains("No valid exon breaks"));
        // the full list is in frame but leaves nothing for a 3' side
        let whole = make_transcript("NM_2", "G", Strand::Forward, &[10, 11]);
        assert!(boundary_break(&whole, true, false, &mut rng).is_ok());
        assert!(boundary_break(&whole, false, false, &mut rng).is_err());
    }

    #[test]
    fn test_frame_fixup_restores_frame() {
        let mut rng = StdRng::seed_from_u64(16);
        for strand in [Strand::Forward, Strand::Reverse] {
            let t = make_transcript("NM_1", "G", strand, &[30, 50]);
            let bp = split_at(&t, 0, false, false).unwrap();
            for mode in [TrimMode::Random, TrimMode::Half] {
                for _ in 0..50 {
                    let fixed = frame_fixup(&t, &bp, 32, mode, &mut rng).unwrap();
                    assert_eq!((32 + fixed.bases()) % 3, 0);
                    assert_eq!(fixed.exon_indices, bp.exon_indices);
                    let (orig, new) = if strand == Strand::Forward {
                        (bp.segments[1], fixed.segments[1])
                    } else {
                        (bp.segments[0], fixed.segments[0])
                    };
                    // 5' edge of the trimmed exon is untouched
                    if strand == Strand::Forward {
                        assert_eq!(new.0, orig.0);
                        assert!(new.1 < orig.1);
                    } else {
                        assert_eq!(new.1, orig.1);
                        assert!(new.0 > orig.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_frame_fixup_noop_when_in_frame() {
        let mut rng = StdRng::seed_from_u64(17);
        let t = make_transcript("NM_1", "G", Strand::Forward, &[30, 30]);
        let bp = split_at(&t, 0, false, false).unwrap();
        assert_eq!(frame_fixup(&t, &bp, 3, TrimMode::Random, &mut rng).unwrap(), bp);
    }

    #[test]
    fn test_frame_fixup_impossible() {
        let mut rng = StdRng::seed_from_u64(18);
        let t = make_transcript("NM_1", "G", Strand::Forward, &[30, 1]);
        let bp = split_at(&t, 0, false, false).unwrap();
        // 1 + 30 leaves a 1 bp exon that would need to become 2 bp
        assert!(frame_fixup(&t, &bp, 1, TrimMode::Random, &mut rng).is_err());
    }

    #[test]
    fn test_region_and_exon_strings() {
        let t = make_transcript("NM_1", "G", Strand::Forward, &[10, 20]);
        let bp = split_at(&t, 0, false, false).unwrap();
        assert_eq!(bp.exons_string(), "0,1");
        assert_eq!(bp.region_string("chr1"), "chr1:1001-1010,1111-1130");
    }
}
