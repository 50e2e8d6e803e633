//! Shuffler GA - Lock-step genetic operators for permutation chromosomes.
//!
//! This crate runs the operator half of a genetic algorithm as four
//! data-parallel stages over a whole population: selection, mating,
//! recombination and mutation. Fitness evaluation stays with the caller.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Chromosome descriptors, gene types and pipeline configuration
//! - `compute`: Stage kernels, CPU/GPU backends and the generation pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use shuffler_ga::{
//!     compute::{CpuBackend, GenerationPipeline, GenerationStreams, Population},
//!     schema::{ChromosomeDescriptor, Gene, PipelineConfig, SimpleGene},
//! };
//!
//! // Eight-city tour: every gene draws from the same unique domain
//! let cities: Vec<i32> = (0..8).collect();
//! let genes: Vec<Box<dyn Gene>> = (0..8)
//!     .map(|_| Box::new(SimpleGene::permutation(cities.clone())) as Box<dyn Gene>)
//!     .collect();
//! let descriptor = Arc::new(ChromosomeDescriptor::new(genes, "tour").unwrap());
//!
//! let config = PipelineConfig {
//!     population_size: 4,
//!     ..Default::default()
//! };
//! let mut pipeline =
//!     GenerationPipeline::new(config, CpuBackend::new(descriptor)).unwrap();
//!
//! let dna: Vec<i32> = (0..4).flat_map(|_| cities.clone()).collect();
//! let mut population = Population::from_flat(dna, 8).unwrap();
//! let fitness = [1.0, 4.0, 2.0, 3.0];
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let streams = GenerationStreams::generate(&mut rng, 4, 8, pipeline.config().mask_policy);
//! let report = pipeline
//!     .run_generation(&mut population, &fitness, &streams)
//!     .unwrap();
//!
//! println!("Best fitness bred from: {}", report.summary.best.value);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{CpuBackend, GenerationPipeline, PipelineError, Population};
pub use schema::{ChromosomeDescriptor, PipelineConfig, SimpleGene};
