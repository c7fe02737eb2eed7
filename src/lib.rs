//! fusim: simulate fusion-gene transcripts from a refFlat gene model.
//!
//! Transcripts are picked either uniformly or weighted by background read
//! depth, split at exon-level breakpoints that can preserve the reading
//! frame, and joined into hybrid, self, tri, intra-chromosome or read-through
//! fusions.

pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod sequence;
pub mod sim;
pub mod transcript;
pub mod utils;

pub use error::{Error, Result};
