//! Turning a score-sorted transcript population into per-event index groups.

use std::fmt;

use clap::ValueEnum;
use log::warn;
use rand::Rng;
use rand::seq::index;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMethod {
    /// Uniform draw over all transcripts, ignoring depth.
    #[default]
    Uniform,
    /// One equal-count depth bin per event.
    Binned,
    /// Depth histogram with sqrt(n) bins.
    Empirical,
    /// Depth histogram with Sturges' log2(n + 1) bins.
    EmpiricalSturges,
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectionMethod::Uniform => "uniform",
            SelectionMethod::Binned => "binned",
            SelectionMethod::Empirical => "empirical",
            SelectionMethod::EmpiricalSturges => "empirical-sturges",
        };
        write!(f, "{}", s)
    }
}

/// Partition of sample indices into ordered bins. Every index is in exactly one bin
/// and no bin is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionBins {
    bins: Vec<Vec<usize>>,
}

impl SelectionBins {
    /// `n_bins` contiguous equal-count bins over `0..n_samples`; the last bin takes
    /// the remainder. A population smaller than `n_bins` gets a single bin.
    pub fn equal_count(n_samples: usize, n_bins: usize) -> Self {
        if n_samples == 0 {
            return Self { bins: Vec::new() };
        }
        if n_bins <= 1 || n_samples < n_bins {
            return Self { bins: vec![(0..n_samples).collect()] };
        }
        let size = n_samples / n_bins;
        let bins = (0..n_bins)
            .map(|i| {
                let end = if i == n_bins - 1 { n_samples } else { (i + 1) * size };
                (i * size..end).collect()
            })
            .collect();
        Self { bins }
    }

    /// Equal-width histogram of `scores` with `n_bins` bins. Sample `i` lands in
    /// bin `floor(score / width)` clamped to the last bin; empty bins are dropped.
    pub fn equal_width(scores: &[f64], n_bins: usize) -> Self {
        let n_bins = n_bins.max(1);
        let width = bin_width(scores, n_bins);
        let mut bins: Vec<Vec<usize>> = vec![Vec::new(); n_bins];
        for (i, &s) in scores.iter().enumerate() {
            bins[histogram_bin(s, width, n_bins)].push(i);
        }
        bins.retain(|b| !b.is_empty());
        Self { bins }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn get(&self, i: usize) -> &[usize] {
        &self.bins[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.bins.iter().map(Vec::as_slice)
    }

    /// One entry per sample holding its bin index. Drawing uniformly from this
    /// picks a bin with probability proportional to its population.
    pub fn membership(&self) -> Vec<usize> {
        self.bins
            .iter()
            .enumerate()
            .flat_map(|(b, members)| std::iter::repeat_n(b, members.len()))
            .collect()
    }
}

/// `(max - min) / n_bins`, or 0 for a degenerate population.
pub fn bin_width(scores: &[f64], n_bins: usize) -> f64 {
    let (min, max) = scores
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    if scores.is_empty() || n_bins == 0 {
        return 0.0;
    }
    (max - min) / n_bins as f64
}

pub fn histogram_bin(score: f64, width: f64, n_bins: usize) -> usize {
    if width.is_nan() || width <= 0.0 || !score.is_finite() || score <= 0.0 {
        return 0;
    }
    ((score / width).floor() as usize).min(n_bins - 1)
}

pub fn sqrt_bin_count(population: usize) -> usize {
    ((population as f64).sqrt().floor() as usize).max(1)
}

pub fn sturges_bin_count(population: usize) -> usize {
    (((population + 1) as f64).log2().floor() as usize).max(1)
}

/// Index groups for each planned event plus the number of events that could
/// not be drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionPlan {
    pub groups: Vec<Vec<usize>>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SelectionSampler {
    method: SelectionMethod,
}

impl SelectionSampler {
    pub fn new(method: SelectionMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> SelectionMethod {
        self.method
    }

    /// Plan `n_events` draws of `genes_per_fusion` indices into `scores`, which must
    /// be sorted ascending. A single-gene draw is doubled into a self pair.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        scores: &[f64],
        n_events: usize,
        genes_per_fusion: usize,
        rng: &mut R,
    ) -> Result<SelectionPlan> {
        if scores.is_empty() {
            return Err(Error::InputData("no transcripts available for selection".into()));
        }
        if genes_per_fusion == 0 {
            return Err(Error::Config("genes per fusion must be at least 1".into()));
        }

        let mut plan = match self.method {
            SelectionMethod::Uniform => plan_uniform(scores.len(), n_events, genes_per_fusion, rng),
            SelectionMethod::Binned => plan_binned(scores.len(), n_events, genes_per_fusion, rng),
            SelectionMethod::Empirical => {
                let bins = SelectionBins::equal_width(scores, sqrt_bin_count(scores.len()));
                plan_weighted(&bins, n_events, genes_per_fusion, rng)
            }
            SelectionMethod::EmpiricalSturges => {
                let bins = SelectionBins::equal_width(scores, sturges_bin_count(scores.len()));
                plan_weighted(&bins, n_events, genes_per_fusion, rng)
            }
        };

        if genes_per_fusion == 1 {
            for g in plan.groups.iter_mut() {
                g.push(g[0]);
            }
        }
        Ok(plan)
    }
}

fn plan_uniform<R: Rng + ?Sized>(population: usize, n_events: usize, k: usize, rng: &mut R) -> SelectionPlan {
    let groups = (0..n_events)
        .map(|_| (0..k).map(|_| rng.gen_range(0..population)).collect())
        .collect();
    SelectionPlan { groups, skipped: 0 }
}

fn plan_binned<R: Rng + ?Sized>(population: usize, n_events: usize, k: usize, rng: &mut R) -> SelectionPlan {
    let bins = SelectionBins::equal_count(population, n_events);
    let mut plan = SelectionPlan::default();
    for event in 0..n_events {
        let bin = bins.get(event % bins.len());
        if bin.len() < k {
            warn!(
                "Skipping event {}: bin has {} transcript(s), {} needed",
                event + 1,
                bin.len(),
                k
            );
            plan.skipped += 1;
            continue;
        }
        let picks = index::sample(rng, bin.len(), k).into_iter().map(|j| bin[j]).collect();
        plan.groups.push(picks);
    }
    plan
}

fn plan_weighted<R: Rng + ?Sized>(bins: &SelectionBins, n_events: usize, k: usize, rng: &mut R) -> SelectionPlan {
    let membership = bins.membership();
    let groups = (0..n_events)
        .map(|_| {
            (0..k)
                .map(|_| {
                    let bin = bins.get(membership[rng.gen_range(0..membership.len())]);
                    bin[rng.gen_range(0..bin.len())]
                })
                .collect()
        })
        .collect();
    SelectionPlan { groups, skipped: 0 }
}
