//! Gene selection and fusion construction.

pub mod breakpoint;
pub mod depth;
pub mod fusion;
pub mod sampler;
pub mod select;

pub use breakpoint::Breakpoint;
pub use depth::{AlignmentSource, AlignmentSourceFactory, DepthSample, ReadDepthEstimator};
pub use fusion::{FusionAssembler, FusionGene, FusionOption, FusionOptions, FusionType};
pub use sampler::{SelectionMethod, SelectionSampler};
pub use select::{BackgroundSelector, Filter, GeneModelSource, GeneSelector, StaticSelector};
