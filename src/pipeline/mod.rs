use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, info, warn};
use rand::Rng;

use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::sim::fusion::{FusionAssembler, FusionGene, FusionType};
use crate::sim::sampler::SelectionSampler;
use crate::sim::select::{Filter, GeneSelector};
use crate::transcript::Transcript;

/// Chromosomes drawn from for intra-chromosome fusions.
pub const INTRA_CHROMOSOMES: [&str; 24] = [
    "chr1", "chr2", "chr3", "chr4", "chr5", "chr6", "chr7", "chr8", "chr9", "chr10", "chr11", "chr12",
    "chr13", "chr14", "chr15", "chr16", "chr17", "chr18", "chr19", "chr20", "chr21", "chr22", "chrX", "chrY",
];

/// Result from FusionSimulator::run().
#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    pub fusions: Vec<FusionGene>,
    /// Fusions produced per requested topology.
    pub generated: IndexMap<FusionType, usize>,
    pub requested: usize,
    pub skipped: usize,
}

/// Transcripts picked for each event of one topology.
struct Picks<'t> {
    groups: Vec<Vec<&'t Transcript>>,
    skipped: usize,
}

impl Picks<'_> {
    fn skip_all(n: usize) -> Self {
        Self { groups: Vec::new(), skipped: n }
    }
}

pub struct FusionSimulator<'a, S: GeneSelector + ?Sized> {
    selector: &'a S,
    config: &'a SimulationConfig,
}

impl<'a, S: GeneSelector + ?Sized> FusionSimulator<'a, S> {
    pub fn new(selector: &'a S, config: &'a SimulationConfig) -> Self {
        Self { selector, config }
    }

    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SimulationResult> {
        self.config.validate()?;
        self.check_filters()?;
        info!("Starting simulation...");

        let assembler = FusionAssembler::new(self.config.options, self.config.foreign_insertion_max_len);
        let sampler = SelectionSampler::new(self.config.method);
        let mut result = SimulationResult { requested: self.config.events.total(), ..Default::default() };

        for fusion_type in FusionType::ALL {
            let n = self.config.events.get(fusion_type);
            if n == 0 {
                continue;
            }
            info!("Generating {} {} fusions ({} selection)", n, fusion_type, sampler.method());

            let picked = match fusion_type {
                FusionType::ReadThrough => self.pick_read_through(n, rng),
                FusionType::IntraChromosome => self.pick_intra_chromosome(n, &sampler, rng),
                _ => self.pick_slots(fusion_type, n, &sampler, rng),
            };
            let picks = match picked {
                Ok(p) => p,
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping all {} {} fusions: {}", n, fusion_type, e);
                    Picks::skip_all(n)
                }
                Err(e) => return Err(e),
            };

            let mut produced = 0;
            result.skipped += picks.skipped;
            for group in picks.groups {
                let transcripts: Vec<Transcript> = group.into_iter().cloned().collect();
                match assembler.assemble(fusion_type, transcripts, rng) {
                    Ok(fusion) => {
                        debug!("{}", fusion);
                        result.fusions.push(fusion);
                        produced += 1;
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("Skipping {} fusion: {}", fusion_type, e);
                        result.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            result.generated.insert(fusion_type, produced);
        }

        if result.fusions.is_empty() {
            return Err(Error::NoFusions(result.skipped));
        }
        info!(
            "Generated {} fusions, skipped {} of {} requested events",
            result.fusions.len(),
            result.skipped,
            result.requested
        );
        Ok(result)
    }

    /// Resolve every slot filter of every requested topology against the
    /// selected population. A filter matching nothing, or slots that together
    /// hold fewer distinct transcripts than the topology needs, is a
    /// configuration error raised before any event is drawn.
    pub fn check_filters(&self) -> Result<()> {
        if !self.config.has_filters() {
            return Ok(());
        }
        for fusion_type in FusionType::ALL {
            if self.config.events.get(fusion_type) == 0 {
                continue;
            }
            let (slots, genes) = match fusion_type {
                FusionType::IntraChromosome => continue,
                // read-through partners come from the first slot's population
                FusionType::ReadThrough => (1, 1),
                _ => (fusion_type.genes_per_fusion(), fusion_type.genes_per_fusion()),
            };
            let filters: Vec<Option<Filter>> = (0..slots).map(|slot| self.config.filter(slot)).collect();
            if filters.iter().all(Option::is_none) {
                continue;
            }

            let mut distinct: HashSet<&str> = HashSet::new();
            for (slot, filter) in filters.iter().enumerate() {
                let population = self.selector.select_filtered(filter.as_ref()).map_err(|e| match e {
                    Error::InputData(msg) => Error::Config(format!("gene{}: {}", slot + 1, msg)),
                    other => other,
                })?;
                distinct.extend(population.iter().map(|&t| t.transcript_id.as_str()));
            }
            if distinct.len() < genes {
                return Err(Error::Config(format!(
                    "filters match {} distinct transcripts but {} fusions need {}",
                    distinct.len(),
                    fusion_type,
                    genes
                )));
            }
        }
        Ok(())
    }

    /// Hybrid, self and tri-fusion picks. Without filters the sampler draws the
    /// whole group from one population; with filters each slot is drawn from
    /// its own filtered population.
    fn pick_slots<R: Rng + ?Sized>(
        &self,
        fusion_type: FusionType,
        n: usize,
        sampler: &SelectionSampler,
        rng: &mut R,
    ) -> Result<Picks<'a>> {
        let genes = fusion_type.genes_per_fusion();
        let filters: Vec<Option<Filter>> = (0..genes).map(|slot| self.config.filter(slot)).collect();

        if filters.iter().all(Option::is_none) {
            let population: Vec<&Transcript> = self.selector.select()?.iter().collect();
            return sample(&population, n, genes, sampler, rng);
        }

        let populations: Vec<Vec<&'a Transcript>> = filters
            .iter()
            .map(|f| self.selector.select_filtered(f.as_ref()))
            .collect::<Result<_>>()?;

        if genes == 1 {
            return sample(&populations[0], n, 1, sampler, rng);
        }
        let mut per_slot = Vec::with_capacity(genes);
        for population in &populations {
            per_slot.push(sample(population, n, 1, sampler, rng)?);
        }
        let events = per_slot.iter().map(|p| p.groups.len()).min().unwrap_or(0);
        let mut picks = Picks { groups: Vec::with_capacity(events), skipped: n - events };
        for e in 0..events {
            let mut group: Vec<&'a Transcript> = per_slot.iter().map(|p| p.groups[e][0]).collect();
            let mut redraws = 0;
            // Overlapping filters can land on one transcript in two slots.
            while !is_usable(&group, genes) && redraws < MAX_REDRAWS {
                group = draw_one_per_slot(&populations, sampler, rng)?;
                redraws += 1;
            }
            if !is_usable(&group, genes) {
                warn!("Skipping {} fusion: slot filters keep picking the same transcript", fusion_type);
                picks.skipped += 1;
            } else {
                picks.groups.push(group);
            }
        }
        Ok(picks)
    }

    /// Both genes from one randomly chosen chromosome per event.
    fn pick_intra_chromosome<R: Rng + ?Sized>(
        &self,
        n: usize,
        sampler: &SelectionSampler,
        rng: &mut R,
    ) -> Result<Picks<'a>> {
        let mut picks = Picks { groups: Vec::with_capacity(n), skipped: 0 };
        for _ in 0..n {
            let chrom = INTRA_CHROMOSOMES[rng.gen_range(0..INTRA_CHROMOSOMES.len())];
            let drawn = self
                .selector
                .select_filtered(Some(&Filter::new([chrom])))
                .and_then(|population| sample(&population, 1, 2, sampler, rng));
            match drawn {
                Ok(p) => {
                    picks.skipped += p.skipped;
                    picks.groups.extend(p.groups);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping intra_chromosome fusion on {}: {}", chrom, e);
                    picks.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(picks)
    }

    /// Neighbouring transcripts of different genes, ordered by position.
    fn pick_read_through<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Picks<'a>> {
        let mut sorted: Vec<&'a Transcript> = self
            .selector
            .select_filtered(self.config.filter(0).as_ref())?
            .into_iter()
            .filter(|t| !t.chrom.contains('_'))
            .collect();
        if sorted.len() < 2 {
            warn!("Read-through fusions need at least 2 transcripts, found {}", sorted.len());
            return Ok(Picks::skip_all(n));
        }
        sorted.sort_by(|a, b| a.chrom.cmp(&b.chrom).then(a.tx_start.cmp(&b.tx_start)));

        let mut picks = Picks { groups: Vec::with_capacity(n), skipped: 0 };
        for _ in 0..n {
            let idx = rng.gen_range(0..sorted.len() - 1);
            let first = sorted[idx];
            let partner = sorted[idx + 1..]
                .iter()
                .find(|t| t.gene_id != first.gene_id)
                .or_else(|| sorted[..idx].iter().rev().find(|t| t.gene_id != first.gene_id));
            match partner {
                Some(&second) => picks.groups.push(vec![first, second]),
                None => {
                    warn!("No read-through partner for {}", first);
                    picks.skipped += 1;
                }
            }
        }
        Ok(picks)
    }
}

/// Sample `n` groups of `genes` transcripts from a score-sorted population.
fn sample<'t, R: Rng + ?Sized>(
    population: &[&'t Transcript],
    n: usize,
    genes: usize,
    sampler: &SelectionSampler,
    rng: &mut R,
) -> Result<Picks<'t>> {
    let scores: Vec<f64> = population.iter().map(|t| t.depth_score).collect();
    let plan = sampler.plan(&scores, n, genes, rng)?;
    let groups = plan
        .groups
        .into_iter()
        .map(|g| g.into_iter().map(|i| population[i]).collect())
        .collect();
    Ok(Picks { groups, skipped: plan.skipped })
}

/// Redraw attempts for a filtered group that repeats a transcript across slots.
const MAX_REDRAWS: usize = 10;

/// One transcript per slot with no transcript repeated.
fn is_usable(group: &[&Transcript], genes: usize) -> bool {
    group.len() == genes
        && !group
            .iter()
            .enumerate()
            .any(|(i, t)| group[..i].iter().any(|u| u.transcript_id == t.transcript_id))
}

/// One transcript from each slot population. A slot whose draw is skipped
/// leaves the group short.
fn draw_one_per_slot<'t, R: Rng + ?Sized>(
    populations: &[Vec<&'t Transcript>],
    sampler: &SelectionSampler,
    rng: &mut R,
) -> Result<Vec<&'t Transcript>> {
    let mut group = Vec::with_capacity(populations.len());
    for population in populations {
        if let Some(g) = sample(population, 1, 1, sampler, rng)?.groups.first() {
            group.push(g[0]);
        }
    }
    Ok(group)
}
