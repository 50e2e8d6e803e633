//! Compute module - Stage kernels, backends and the generation pipeline.

mod backend;
mod error;
mod mating;
mod mutation;
mod pipeline;
mod population;
mod random;
mod recombination;
mod selection;

pub mod gpu;

pub use backend::*;
pub use error::PipelineError;
pub(crate) use error::{check_draws, check_len};
pub use mating::*;
pub use mutation::*;
pub use pipeline::*;
pub use population::*;
pub use random::*;
pub use recombination::*;
pub use selection::*;
