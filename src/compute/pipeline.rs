//! Generation pipeline - typed stage chaining over a [`StageBackend`].
//!
//! Each stage consumes the previous stage's output, so a generation can only
//! run as Selection, Mating, Recombination, then Mutation:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use shuffler_ga::compute::*;
//! # use shuffler_ga::schema::*;
//! # fn demo(
//! #     descriptor: Arc<ChromosomeDescriptor>,
//! #     population: &mut Population,
//! #     fitness: &[f32],
//! #     streams: &GenerationStreams,
//! # ) -> Result<(), PipelineError> {
//! let mut pipeline = GenerationPipeline::new(PipelineConfig::default(), CpuBackend::new(descriptor))?;
//! pipeline
//!     .select(fitness)?
//!     .mate(population, &streams.mating)?
//!     .recombine(population, &streams.recombination)?
//!     .mutate(population, &streams.mutation)?;
//! # Ok(())
//! # }
//! ```

use crate::schema::{ChromosomeDescriptor, MutationElitism, PipelineConfig};

use super::{
    GenerationStreams, PipelineError, Population, SelectionSummary, Stage, StageBackend, check_len,
};

/// Summary of one completed generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationReport {
    /// Zero-based index of the generation just completed.
    pub generation: u64,
    /// Selection scalars the generation was bred from.
    pub summary: SelectionSummary,
}

/// Owns a backend bound to one population size and drives its stages.
pub struct GenerationPipeline<B: StageBackend> {
    config: PipelineConfig,
    backend: B,
    generation: u64,
}

impl<B: StageBackend> GenerationPipeline<B> {
    /// Validate `config` and allocate the backend's scratch buffers.
    pub fn new(config: PipelineConfig, mut backend: B) -> Result<Self, PipelineError> {
        config.validate()?;
        backend.allocate(config.population_size)?;
        Ok(Self {
            config,
            backend,
            generation: 0,
        })
    }

    /// Rebind to a new population size. Scratch contents are discarded.
    pub fn rebind(&mut self, population_size: usize) -> Result<(), PipelineError> {
        let config = PipelineConfig {
            population_size,
            ..self.config.clone()
        };
        config.validate()?;
        self.backend.allocate(population_size)?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn descriptor(&self) -> &ChromosomeDescriptor {
        self.backend.descriptor()
    }

    /// Generations completed through [`GenerationPipeline::run_generation`]
    /// or a full typed chain.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stream length `stage` needs for one invocation.
    pub fn required_draws(&self, stage: Stage) -> usize {
        stage.required_draws(
            self.config.population_size,
            self.descriptor().gene_count(),
            self.config.mask_policy,
        )
    }

    /// Selection stage: ratios and best/weakest from `fitness`.
    pub fn select<'a>(&'a mut self, fitness: &'a [f32]) -> Result<Selected<'a, B>, PipelineError> {
        check_len("fitness vector", self.config.population_size, fitness.len())?;
        let summary = self.backend.calc_ratio(fitness, self.config.ratio_policy)?;
        Ok(Selected {
            pipeline: self,
            fitness,
            summary,
        })
    }

    /// Mutation stage on its own, outside a selection chain.
    ///
    /// No elite protection applies, whatever the configuration says.
    pub fn mutate(
        &mut self,
        population: &mut Population,
        random: &[f32],
    ) -> Result<(), PipelineError> {
        self.check_population(population)?;
        self.backend
            .single_gene_mutate(population, self.config.prob_mutate, None, random)
    }

    /// Run all four stages for one generation.
    pub fn run_generation(
        &mut self,
        population: &mut Population,
        fitness: &[f32],
        streams: &GenerationStreams,
    ) -> Result<GenerationReport, PipelineError> {
        let generation = self.generation;
        let summary = self
            .select(fitness)?
            .mate(population, &streams.mating)?
            .recombine(population, &streams.recombination)?
            .mutate(population, &streams.mutation)?;
        Ok(GenerationReport {
            generation,
            summary,
        })
    }

    fn check_population(&self, population: &Population) -> Result<(), PipelineError> {
        population.check_dimensions(
            self.config.population_size,
            self.descriptor().gene_count(),
        )
    }
}

/// Output of the selection stage.
pub struct Selected<'a, B: StageBackend> {
    pipeline: &'a mut GenerationPipeline<B>,
    fitness: &'a [f32],
    summary: SelectionSummary,
}

impl<'a, B: StageBackend> Selected<'a, B> {
    pub fn summary(&self) -> SelectionSummary {
        self.summary
    }

    /// Final selection-ratio vector.
    pub fn ratios(&self) -> Result<Vec<f32>, PipelineError> {
        self.pipeline.backend.ratios()
    }

    /// Mating stage: one mate per individual.
    pub fn mate(
        self,
        population: &Population,
        random: &[f32],
    ) -> Result<Mated<'a, B>, PipelineError> {
        self.pipeline.check_population(population)?;
        self.pipeline
            .backend
            .pick_mates(population, self.fitness, random)?;
        Ok(Mated {
            pipeline: self.pipeline,
            fitness: self.fitness,
            summary: self.summary,
        })
    }
}

/// Output of the mating stage.
pub struct Mated<'a, B: StageBackend> {
    pipeline: &'a mut GenerationPipeline<B>,
    fitness: &'a [f32],
    summary: SelectionSummary,
}

impl<'a, B: StageBackend> Mated<'a, B> {
    pub fn summary(&self) -> SelectionSummary {
        self.summary
    }

    /// Final mate-assignment vector.
    pub fn mate_assignment(&self) -> Result<Vec<u32>, PipelineError> {
        self.pipeline.backend.mate_assignment()
    }

    /// Recombination stage: ordered crossover with each individual's mate.
    pub fn recombine(
        self,
        population: &mut Population,
        random: &[f32],
    ) -> Result<Recombined<'a, B>, PipelineError> {
        self.pipeline.check_population(population)?;
        let config = &self.pipeline.config;
        let (prob_crossover, mask_policy) = (config.prob_crossover, config.mask_policy);
        self.pipeline.backend.do_crossover(
            population,
            self.fitness,
            prob_crossover,
            mask_policy,
            random,
        )?;
        Ok(Recombined {
            pipeline: self.pipeline,
            fitness: self.fitness,
            summary: self.summary,
        })
    }
}

/// Output of the recombination stage.
pub struct Recombined<'a, B: StageBackend> {
    pipeline: &'a mut GenerationPipeline<B>,
    fitness: &'a [f32],
    summary: SelectionSummary,
}

impl<'a, B: StageBackend> Recombined<'a, B> {
    pub fn summary(&self) -> SelectionSummary {
        self.summary
    }

    /// Crossover mask written by the recombination stage.
    pub fn crossover_mask(&self) -> Result<Vec<i32>, PipelineError> {
        self.pipeline.backend.crossover_mask()
    }

    /// Mutation stage, closing the generation.
    pub fn mutate(
        self,
        population: &mut Population,
        random: &[f32],
    ) -> Result<SelectionSummary, PipelineError> {
        self.pipeline.check_population(population)?;
        let config = &self.pipeline.config;
        let protect = match config.mutation_elitism {
            MutationElitism::Unprotected => None,
            MutationElitism::ProtectBest => Some(self.fitness),
        };
        let prob_mutate = config.prob_mutate;
        self.pipeline
            .backend
            .single_gene_mutate(population, prob_mutate, protect, random)?;
        Ok(self.finish())
    }

    /// Close the generation without mutating.
    pub fn finish(self) -> SelectionSummary {
        self.pipeline.generation += 1;
        log::debug!("generation {} complete", self.pipeline.generation);
        self.summary
    }
}
