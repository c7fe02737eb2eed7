//! Tab-separated and FASTA renderings of simulated fusions.

use std::io::Write;

use crate::error::Result;
use crate::sequence::SequenceSource;
use crate::sim::fusion::FusionGene;
use crate::transcript::Transcript;

/// Sides always written to the table; two-gene fusions leave the third empty.
const MAX_SIDES: usize = 3;

pub fn txt_header() -> Vec<String> {
    let mut cols = vec!["fusionGene".to_string()];
    for i in 1..=MAX_SIDES {
        for field in ["transcript", "gene", "exons", "strand", "break"] {
            cols.push(format!("{}{}", field, i));
        }
    }
    cols.push("fusionType".into());
    cols.push("options".into());
    cols
}

pub fn txt_row(f: &FusionGene) -> String {
    let mut cols = vec![f.name()];
    for i in 0..MAX_SIDES {
        match f.sides.get(i) {
            Some(side) => {
                let t = &side.transcript;
                cols.push(t.transcript_id.clone());
                cols.push(t.gene_id.clone());
                cols.push(side.breakpoint.exons_string());
                cols.push(t.strand.to_string());
                cols.push(side.breakpoint.region_string(&t.chrom));
            }
            None => cols.extend(std::iter::repeat_n(String::new(), 5)),
        }
    }
    cols.push(f.fusion_type.to_string());
    cols.push(f.options.to_string());
    cols.join("\t")
}

pub fn write_txt<W: Write>(mut out: W, fusions: &[FusionGene]) -> Result<()> {
    writeln!(out, "{}", txt_header().join("\t"))?;
    for f in fusions {
        writeln!(out, "{}", txt_row(f))?;
    }
    out.flush()?;
    Ok(())
}

/// `>ref|tx1-tx2 fusionGene=g1-g2 fusionType=... exons1=... break1=... strand1=...`
pub fn fasta_header(f: &FusionGene) -> String {
    let mut header = format!(
        ">ref|{} fusionGene={} fusionType={}",
        f.transcript_name(),
        f.name(),
        f.fusion_type
    );
    for (i, side) in f.sides.iter().enumerate() {
        let n = i + 1;
        header.push_str(&format!(
            " exons{n}={} break{n}={} strand{n}={}",
            side.breakpoint.exons_string(),
            side.breakpoint.region_string(&side.transcript.chrom),
            side.transcript.strand,
        ));
    }
    header.push_str(&format!(" options={}", f.options));
    header
}

/// Assemble each fusion's sequence from `source` and write it as one record.
pub fn write_fasta<W, S>(mut out: W, fusions: &mut [FusionGene], source: &mut S) -> Result<()>
where
    W: Write,
    S: SequenceSource + ?Sized,
{
    for f in fusions.iter_mut() {
        let header = fasta_header(f);
        let seq = f.assemble_sequence(source)?;
        writeln!(out, "{}", header)?;
        out.write_all(seq)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Depth scores as `transcript_id gene_id chrom rpkm`, in the order given.
pub fn write_depth_tsv<W: Write>(mut out: W, transcripts: &[Transcript]) -> Result<()> {
    writeln!(out, "transcript_id\tgene_id\tchrom\trpkm")?;
    for t in transcripts {
        writeln!(out, "{}\t{}\t{}\t{:.4}", t.transcript_id, t.gene_id, t.chrom, t.depth_score)?;
    }
    out.flush()?;
    Ok(())
}
