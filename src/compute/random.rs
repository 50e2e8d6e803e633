//! Random stream contract: per-stage draw counts and stream generation helpers.

use std::fmt;

use rand::Rng;

use crate::schema::MaskPolicy;

/// The four device entry points, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Ratio computation and best/weakest reduction.
    Selection,
    /// Roulette-wheel mate choice.
    Mating,
    /// Ordered crossover with the chosen mate.
    Recombination,
    /// Single-gene mutation.
    Mutation,
}

impl Stage {
    /// Uniform draws each lane consumes.
    ///
    /// Lane `i` reads `stream[i * draws_per_lane .. (i + 1) * draws_per_lane]`.
    pub fn draws_per_lane(self, gene_count: usize, mask_policy: MaskPolicy) -> usize {
        match self {
            Stage::Selection => 0,
            Stage::Mating => 1,
            // Probability test, then the mask draws.
            Stage::Recombination => 1 + mask_policy.draws(gene_count),
            // Probability test, position, value handed to the gene's rule.
            Stage::Mutation => 3,
        }
    }

    /// Minimum stream length for one invocation over the whole population.
    pub fn required_draws(
        self,
        population_size: usize,
        gene_count: usize,
        mask_policy: MaskPolicy,
    ) -> usize {
        population_size * self.draws_per_lane(gene_count, mask_policy)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Selection => "selection",
            Stage::Mating => "mating",
            Stage::Recombination => "recombination",
            Stage::Mutation => "mutation",
        };
        f.write_str(name)
    }
}

/// Fill a stream of `len` uniform values in `[0, 1)`.
pub fn uniform_stream<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.r#gen::<f32>()).collect()
}

/// Pre-generated streams for every stage of one generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationStreams {
    pub mating: Vec<f32>,
    pub recombination: Vec<f32>,
    pub mutation: Vec<f32>,
}

impl GenerationStreams {
    /// Generate streams sized exactly to each stage's requirement.
    pub fn generate<R: Rng>(
        rng: &mut R,
        population_size: usize,
        gene_count: usize,
        mask_policy: MaskPolicy,
    ) -> Self {
        let len = |stage: Stage| stage.required_draws(population_size, gene_count, mask_policy);
        Self {
            mating: uniform_stream(rng, len(Stage::Mating)),
            recombination: uniform_stream(rng, len(Stage::Recombination)),
            mutation: uniform_stream(rng, len(Stage::Mutation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_draw_counts() {
        assert_eq!(Stage::Selection.draws_per_lane(8, MaskPolicy::CutPoints), 0);
        assert_eq!(Stage::Mating.draws_per_lane(8, MaskPolicy::CutPoints), 1);
        assert_eq!(Stage::Recombination.draws_per_lane(8, MaskPolicy::CutPoints), 3);
        assert_eq!(Stage::Recombination.draws_per_lane(8, MaskPolicy::Uniform), 9);
        assert_eq!(Stage::Mutation.draws_per_lane(8, MaskPolicy::Uniform), 3);
        assert_eq!(Stage::Mutation.required_draws(10, 8, MaskPolicy::Uniform), 30);
    }

    #[test]
    fn test_generated_streams_are_sized_and_uniform() {
        let mut rng = StdRng::seed_from_u64(7);
        let streams = GenerationStreams::generate(&mut rng, 5, 4, MaskPolicy::Uniform);
        assert_eq!(streams.mating.len(), 5);
        assert_eq!(streams.recombination.len(), 25);
        assert_eq!(streams.mutation.len(), 15);
        assert!(
            streams
                .recombination
                .iter()
                .all(|&v| (0.0..1.0).contains(&v))
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Recombination.to_string(), "recombination");
    }
}
