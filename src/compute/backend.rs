//! Stage backends - the four device entry points and their scratch state.
//!
//! A backend owns the per-generation scratch buffers for one population
//! size and executes each stage as a blocking data-parallel call. The
//! [`CpuBackend`] runs one rayon task per lane; the GPU backend lives in
//! [`crate::compute::gpu`].

use std::sync::Arc;

use rayon::prelude::*;

use crate::schema::{ChromosomeDescriptor, MaskPolicy, RatioPolicy};

use super::mating::{ratio_total, roulette_pick};
use super::mutation::mutate_lane;
use super::recombination::{LaneOutcome, crossover_lane};
use super::selection::{Extreme, SelectionSummary, compute_selection_into};
use super::{PipelineError, Population, Stage, check_draws, check_len};

/// Device program interface consumed by the generation pipeline.
///
/// Every stage blocks until all lanes have finished. On error the stage's
/// outputs are undefined.
pub trait StageBackend {
    /// Chromosome layout this backend was built for.
    fn descriptor(&self) -> &ChromosomeDescriptor;

    /// Bind scratch buffers to `population_size`, discarding previous contents.
    fn allocate(&mut self, population_size: usize) -> Result<(), PipelineError>;

    /// Population size the buffers are bound to, if allocated.
    fn population_size(&self) -> Option<usize>;

    /// Selection entry point: ratios plus best/weakest reduction.
    fn calc_ratio(
        &mut self,
        fitness: &[f32],
        policy: RatioPolicy,
    ) -> Result<SelectionSummary, PipelineError>;

    /// Mating entry point: one roulette pick per lane, snapshotting the mate's genes.
    fn pick_mates(
        &mut self,
        population: &Population,
        fitness: &[f32],
        random: &[f32],
    ) -> Result<(), PipelineError>;

    /// Recombination entry point. Lanes whose fitness equals the stored best are skipped.
    fn do_crossover(
        &mut self,
        population: &mut Population,
        fitness: &[f32],
        prob_crossover: f32,
        policy: MaskPolicy,
        random: &[f32],
    ) -> Result<(), PipelineError>;

    /// Mutation entry point. With `protect_best`, lanes whose fitness equals
    /// the stored best are skipped.
    fn single_gene_mutate(
        &mut self,
        population: &mut Population,
        prob_mutate: f32,
        protect_best: Option<&[f32]>,
        random: &[f32],
    ) -> Result<(), PipelineError>;

    /// Current selection-ratio vector.
    fn ratios(&self) -> Result<Vec<f32>, PipelineError>;

    /// Current mate-assignment vector.
    fn mate_assignment(&self) -> Result<Vec<u32>, PipelineError>;

    /// Current crossover-mask vector.
    fn crossover_mask(&self) -> Result<Vec<i32>, PipelineError>;
}

/// Scratch buffers bound to one `(population_size, gene_count)`.
///
/// Never resized; rebinding builds a new value.
#[derive(Debug, Clone)]
pub struct DeviceState {
    population_size: usize,
    gene_count: usize,
    ratios: Vec<f32>,
    best: Extreme,
    weakest: Extreme,
    mate_assignment: Vec<u32>,
    mate_dna: Vec<i32>,
    crossover_mask: Vec<i32>,
}

impl DeviceState {
    /// Allocate zeroed buffers.
    pub fn allocate(population_size: usize, gene_count: usize) -> Self {
        let unset = Extreme {
            value: 0.0,
            index: 0,
        };
        Self {
            population_size,
            gene_count,
            ratios: vec![0.0; population_size],
            best: unset,
            weakest: unset,
            mate_assignment: vec![0; population_size],
            mate_dna: vec![0; population_size * gene_count],
            crossover_mask: vec![0; population_size * gene_count],
        }
    }

    #[inline]
    pub fn population_size(&self) -> usize {
        self.population_size
    }

    #[inline]
    pub fn gene_count(&self) -> usize {
        self.gene_count
    }

    pub fn ratios(&self) -> &[f32] {
        &self.ratios
    }

    pub fn best(&self) -> Extreme {
        self.best
    }

    pub fn weakest(&self) -> Extreme {
        self.weakest
    }

    pub fn mate_assignment(&self) -> &[u32] {
        &self.mate_assignment
    }

    /// Genes of each individual's mate, copied during mating.
    pub fn mate_dna(&self) -> &[i32] {
        &self.mate_dna
    }

    pub fn crossover_mask(&self) -> &[i32] {
        &self.crossover_mask
    }
}

/// CPU backend: one rayon task per lane.
#[derive(Debug)]
pub struct CpuBackend {
    descriptor: Arc<ChromosomeDescriptor>,
    state: Option<DeviceState>,
}

impl CpuBackend {
    /// Create an unallocated backend for `descriptor`.
    pub fn new(descriptor: Arc<ChromosomeDescriptor>) -> Self {
        Self {
            descriptor,
            state: None,
        }
    }

    /// Bound scratch state, if allocated.
    pub fn state(&self) -> Option<&DeviceState> {
        self.state.as_ref()
    }

    fn bound(&self) -> Result<&DeviceState, PipelineError> {
        self.state.as_ref().ok_or(PipelineError::BufferNotInitialized)
    }

    fn bound_mut(&mut self) -> Result<&mut DeviceState, PipelineError> {
        self.state.as_mut().ok_or(PipelineError::BufferNotInitialized)
    }
}

impl StageBackend for CpuBackend {
    fn descriptor(&self) -> &ChromosomeDescriptor {
        &self.descriptor
    }

    fn allocate(&mut self, population_size: usize) -> Result<(), PipelineError> {
        let gene_count = self.descriptor.gene_count();
        if let Some(old) = &self.state {
            log::info!(
                "cpu: rebinding device state from {} to {} individuals",
                old.population_size,
                population_size
            );
        } else {
            log::info!(
                "cpu: allocating device state for {} individuals x {} genes",
                population_size,
                gene_count
            );
        }
        self.state = Some(DeviceState::allocate(population_size, gene_count));
        Ok(())
    }

    fn population_size(&self) -> Option<usize> {
        self.state.as_ref().map(DeviceState::population_size)
    }

    fn calc_ratio(
        &mut self,
        fitness: &[f32],
        policy: RatioPolicy,
    ) -> Result<SelectionSummary, PipelineError> {
        let state = self.bound_mut()?;
        check_len("fitness vector", state.population_size, fitness.len())?;

        let summary = compute_selection_into(fitness, policy, &mut state.ratios)?;
        state.best = summary.best;
        state.weakest = summary.weakest;

        log::debug!(
            "calc_ratio: best {} at {}, weakest {} at {}",
            summary.best.value,
            summary.best.index,
            summary.weakest.value,
            summary.weakest.index
        );
        Ok(summary)
    }

    fn pick_mates(
        &mut self,
        population: &Population,
        fitness: &[f32],
        random: &[f32],
    ) -> Result<(), PipelineError> {
        let state = self.bound_mut()?;
        let (n, g) = (state.population_size, state.gene_count);
        population.check_dimensions(n, g)?;
        check_len("fitness vector", n, fitness.len())?;
        let stride = Stage::Mating.draws_per_lane(g, MaskPolicy::default());
        check_draws(Stage::Mating, n * stride, random.len())?;

        let total = ratio_total(&state.ratios);
        let ratios = &state.ratios;
        state
            .mate_assignment
            .par_iter_mut()
            .zip(random[..n * stride].par_chunks(stride))
            .for_each(|(mate, draws)| {
                *mate = roulette_pick(ratios, total, draws[0]) as u32;
            });

        state
            .mate_dna
            .par_chunks_mut(g)
            .zip(state.mate_assignment.par_iter())
            .for_each(|(snapshot, &mate)| {
                snapshot.copy_from_slice(population.row(mate as usize));
            });

        log::debug!("pick_mates: {} lanes", n);
        Ok(())
    }

    fn do_crossover(
        &mut self,
        population: &mut Population,
        fitness: &[f32],
        prob_crossover: f32,
        policy: MaskPolicy,
        random: &[f32],
    ) -> Result<(), PipelineError> {
        let ordered = self.descriptor.is_permutation();
        let state = self.bound_mut()?;
        let (n, g) = (state.population_size, state.gene_count);
        population.check_dimensions(n, g)?;
        check_len("fitness vector", n, fitness.len())?;
        let stride = Stage::Recombination.draws_per_lane(g, policy);
        check_draws(Stage::Recombination, n * stride, random.len())?;

        let best = state.best.value;
        let recombined: usize = population
            .dna_mut()
            .par_chunks_mut(g)
            .zip(state.mate_dna.par_chunks(g))
            .zip(state.crossover_mask.par_chunks_mut(g))
            .zip(fitness.par_iter())
            .zip(random[..n * stride].par_chunks(stride))
            .map(|((((row, mate), mask), &f), draws)| {
                let outcome = crossover_lane(
                    row,
                    mate,
                    mask,
                    f,
                    best,
                    prob_crossover,
                    policy,
                    ordered,
                    draws,
                );
                usize::from(outcome == LaneOutcome::Recombined)
            })
            .sum();

        log::debug!("do_crossover: {} of {} lanes recombined", recombined, n);
        Ok(())
    }

    fn single_gene_mutate(
        &mut self,
        population: &mut Population,
        prob_mutate: f32,
        protect_best: Option<&[f32]>,
        random: &[f32],
    ) -> Result<(), PipelineError> {
        let descriptor = self.descriptor.as_ref();
        let state = self.bound()?;
        let (n, g) = (state.population_size, state.gene_count);
        population.check_dimensions(n, g)?;
        let stride = Stage::Mutation.draws_per_lane(g, MaskPolicy::default());
        check_draws(Stage::Mutation, n * stride, random.len())?;
        if let Some(fitness) = protect_best {
            check_len("fitness vector", n, fitness.len())?;
        }

        let best = state.best.value;
        let mutated: usize = population
            .dna_mut()
            .par_chunks_mut(g)
            .zip(random[..n * stride].par_chunks(stride))
            .enumerate()
            .map(|(i, (row, draws))| {
                if protect_best.is_some_and(|fitness| fitness[i] == best) {
                    return 0;
                }
                usize::from(mutate_lane(row, descriptor, prob_mutate, draws))
            })
            .sum();

        log::debug!("single_gene_mutate: {} of {} lanes mutated", mutated, n);
        Ok(())
    }

    fn ratios(&self) -> Result<Vec<f32>, PipelineError> {
        Ok(self.bound()?.ratios.clone())
    }

    fn mate_assignment(&self) -> Result<Vec<u32>, PipelineError> {
        Ok(self.bound()?.mate_assignment.clone())
    }

    fn crossover_mask(&self) -> Result<Vec<i32>, PipelineError> {
        Ok(self.bound()?.crossover_mask.clone())
    }
}
