//! Read-depth (RPKM) scoring of transcripts against a background alignment.
//!
//! One producer feeds transcripts into a bounded channel and `threads - 1`
//! workers (at least one) drain it, each with its own alignment handle.
//! Workers only stop polling once the producer has hung up and the queue is
//! empty; any worker error stops the rest and fails the whole estimate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transcript::Transcript;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Queryable read-count source. Each worker owns one.
pub trait AlignmentSource {
    /// Mapped records across all references, from index metadata.
    fn mapped_read_count(&self) -> u64;

    /// Records overlapping the 0-based half-open interval, excluding records
    /// whose read and mate are both unmapped.
    fn count_overlapping(&mut self, chrom: &str, start: u32, end: u32) -> Result<u64>;
}

/// Opens independent [`AlignmentSource`] handles for concurrent workers.
pub trait AlignmentSourceFactory: Sync {
    type Source: AlignmentSource;

    fn open(&self) -> Result<Self::Source>;
}

/// A transcript paired with its depth score.
#[derive(Debug, Clone)]
pub struct DepthSample {
    pub transcript: Transcript,
    pub score: f64,
}

impl DepthSample {
    pub fn new(transcript: Transcript, score: f64) -> Self {
        Self { transcript, score }
    }
}

/// Reads per kilobase of exon per million mapped reads.
pub fn rpkm(count: u64, total_mapped: u64, exon_bases: u64) -> f64 {
    if total_mapped == 0 || exon_bases == 0 {
        return 0.0;
    }
    1e9 * count as f64 / (total_mapped as f64 * exon_bases as f64)
}

/// Haplotype and unplaced contigs carry an underscore (e.g. `chr6_cox_hap2`).
pub fn is_primary_chrom(chrom: &str) -> bool {
    !chrom.contains('_')
}

pub struct ReadDepthEstimator {
    threads: usize,
    cutoff: f64,
    queue_capacity: usize,
}

impl ReadDepthEstimator {
    pub fn new(threads: usize, cutoff: f64) -> Self {
        Self {
            threads: threads.max(1),
            cutoff,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Number of counting workers; one thread is left for the producer.
    pub fn worker_count(&self) -> usize {
        if self.threads > 1 { self.threads - 1 } else { 1 }
    }

    /// Score every transcript and keep those with `score > cutoff`.
    ///
    /// Output order is unspecified.
    pub fn estimate<F, I>(&self, transcripts: I, factory: &F) -> Result<Vec<DepthSample>>
    where
        F: AlignmentSourceFactory,
        I: IntoIterator<Item = Result<Transcript>>,
        I::IntoIter: Send,
    {
        let total_mapped = factory.open()?.mapped_read_count();
        if total_mapped == 0 {
            warn!("Alignment index reports no mapped reads; every transcript will score 0");
        }
        let workers = self.worker_count();
        info!(
            "Computing RPKM values with {} worker(s), {} mapped reads, cutoff {}",
            workers, total_mapped, self.cutoff
        );

        let (tx, rx) = bounded::<Transcript>(self.queue_capacity);
        let stop = AtomicBool::new(false);
        let stop = &stop;
        let cutoff = self.cutoff;
        let iter = transcripts.into_iter();

        thread::scope(|s| {
            let producer = s.spawn(move || flag_on_error(stop, produce(iter, tx, stop)));
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let rx = rx.clone();
                    s.spawn(move || {
                        flag_on_error(stop, consume(id, factory, rx, stop, total_mapped, cutoff))
                    })
                })
                .collect();
            drop(rx);

            let mut first_err: Option<Error> = None;
            let queued = match producer.join() {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    first_err.get_or_insert(e);
                    0
                }
                Err(_) => {
                    first_err.get_or_insert(Error::Resource("Gene model producer panicked".into()));
                    0
                }
            };

            let mut samples = Vec::new();
            for (id, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(part)) => samples.extend(part),
                    Ok(Err(e)) => {
                        first_err.get_or_insert(e);
                    }
                    Err(_) => {
                        stop.store(true, Ordering::SeqCst);
                        first_err.get_or_insert(Error::Resource(format!("Depth worker {} panicked", id)));
                    }
                }
            }

            if let Some(e) = first_err {
                return Err(e);
            }
            info!("{} of {} transcripts scored above cutoff {}", samples.len(), queued, cutoff);
            Ok(samples)
        })
    }
}

fn flag_on_error<T>(stop: &AtomicBool, result: Result<T>) -> Result<T> {
    if result.is_err() {
        stop.store(true, Ordering::SeqCst);
    }
    result
}

fn produce<I>(iter: I, tx: Sender<Transcript>, stop: &AtomicBool) -> Result<usize>
where
    I: Iterator<Item = Result<Transcript>>,
{
    let mut queued = 0;
    for item in iter {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let transcript = item?;
        if !is_primary_chrom(&transcript.chrom) {
            continue;
        }
        // Only fails once every worker has exited.
        if tx.send(transcript).is_err() {
            break;
        }
        queued += 1;
    }
    Ok(queued)
}

fn consume<F: AlignmentSourceFactory>(
    id: usize,
    factory: &F,
    rx: Receiver<Transcript>,
    stop: &AtomicBool,
    total_mapped: u64,
    cutoff: f64,
) -> Result<Vec<DepthSample>> {
    let mut source = factory.open()?;
    let mut samples = Vec::new();
    let mut seen = 0usize;

    while !stop.load(Ordering::SeqCst) {
        let transcript = match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(t) => t,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        seen += 1;

        let mut count = 0;
        for &(start, end) in transcript.exons() {
            count += source.count_overlapping(&transcript.chrom, start, end)?;
        }
        let score = rpkm(count, total_mapped, transcript.exon_bases());
        debug!("{}\t{}\t{} reads\tRPKM {:.4}", transcript.transcript_id, transcript.gene_id, count, score);

        if score > cutoff {
            samples.push(DepthSample::new(transcript.with_depth_score(score), score));
        }
    }

    debug!("Depth worker {} processed {} transcripts", id, seen);
    Ok(samples)
}
