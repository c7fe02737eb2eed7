//! Candidate transcript selection, either straight from the gene model or
//! scored against a background alignment.

use std::cell::OnceCell;
use std::fmt;

use indexmap::IndexSet;
use log::info;

use crate::error::{Error, Result};
use crate::sim::depth::{AlignmentSourceFactory, ReadDepthEstimator};
use crate::transcript::Transcript;
use crate::utils::gene_model::open_gene_model;

/// Set of gene ids, transcript ids or chromosome names restricting one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    keys: IndexSet<String>,
}

impl Filter {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).filter(|k: &String| !k.is_empty()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn matches(&self, t: &Transcript) -> bool {
        self.keys.contains(&t.gene_id)
            || self.keys.contains(&t.chrom)
            || self.keys.contains(&t.transcript_id)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        write!(f, "[{}]", keys.join(", "))
    }
}

/// Where a selector reads transcripts from.
#[derive(Debug, Clone)]
pub enum GeneModelSource {
    Path(String),
    Records(Vec<Transcript>),
}

impl GeneModelSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<Transcript>> + Send + '_>> {
        match self {
            GeneModelSource::Path(p) => Ok(Box::new(open_gene_model(p)?)),
            GeneModelSource::Records(v) => Ok(Box::new(v.iter().cloned().map(Ok))),
        }
    }
}

pub trait GeneSelector {
    /// All candidate transcripts, ascending by depth score.
    fn select(&self) -> Result<&[Transcript]>;

    /// Candidates matching `filter`, or all of them when there is no filter.
    fn select_filtered(&self, filter: Option<&Filter>) -> Result<Vec<&Transcript>> {
        let all = self.select()?;
        let Some(filter) = filter.filter(|f| !f.is_empty()) else {
            return Ok(all.iter().collect());
        };
        let matched: Vec<&Transcript> = all.iter().filter(|t| filter.matches(t)).collect();
        if matched.is_empty() {
            return Err(Error::InputData(format!("No transcripts found using filter: {}", filter)));
        }
        Ok(matched)
    }
}

/// Every transcript of the gene model, unscored, in file order.
pub struct StaticSelector {
    source: GeneModelSource,
    cache: OnceCell<Vec<Transcript>>,
}

impl StaticSelector {
    pub fn new(source: GeneModelSource) -> Self {
        Self { source, cache: OnceCell::new() }
    }

    fn load(&self) -> Result<Vec<Transcript>> {
        info!("Parsing gene model...");
        let transcripts: Vec<Transcript> = self.source.stream()?.collect::<Result<_>>()?;
        if transcripts.is_empty() {
            return Err(Error::Config(
                "no transcripts found in gene model; cannot generate fusions".into(),
            ));
        }
        info!("Loaded {} transcripts", transcripts.len());
        Ok(transcripts)
    }
}

impl GeneSelector for StaticSelector {
    fn select(&self) -> Result<&[Transcript]> {
        if let Some(v) = self.cache.get() {
            return Ok(v);
        }
        let loaded = self.load()?;
        Ok(self.cache.get_or_init(|| loaded))
    }
}

/// Transcripts scored by background read depth, keeping those above the cutoff.
pub struct BackgroundSelector<F: AlignmentSourceFactory> {
    source: GeneModelSource,
    factory: F,
    estimator: ReadDepthEstimator,
    cache: OnceCell<Vec<Transcript>>,
}

impl<F: AlignmentSourceFactory> BackgroundSelector<F> {
    pub fn new(source: GeneModelSource, factory: F, estimator: ReadDepthEstimator) -> Self {
        Self { source, factory, estimator, cache: OnceCell::new() }
    }

    fn load(&self) -> Result<Vec<Transcript>> {
        info!("Processing background reads...");
        let mut samples = self.estimator.estimate(self.source.stream()?, &self.factory)?;
        // Worker order is arbitrary; ties break on id to keep seeded runs stable.
        samples.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.transcript.transcript_id.cmp(&b.transcript.transcript_id))
        });
        Ok(samples.into_iter().map(|s| s.transcript).collect())
    }
}

impl<F: AlignmentSourceFactory> GeneSelector for BackgroundSelector<F> {
    fn select(&self) -> Result<&[Transcript]> {
        if let Some(v) = self.cache.get() {
            return Ok(v);
        }
        let loaded = self.load()?;
        Ok(self.cache.get_or_init(|| loaded))
    }
}
