//! Configuration types for the generation pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

fn default_population_size() -> usize {
    64
}

fn default_prob_crossover() -> f32 {
    0.8
}

fn default_prob_mutate() -> f32 {
    0.1
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of individuals evolved in lock-step.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Probability (0.0-1.0) that a non-elite individual is recombined with its mate.
    #[serde(default = "default_prob_crossover")]
    pub prob_crossover: f32,
    /// Probability (0.0-1.0) that an individual has one gene mutated.
    #[serde(default = "default_prob_mutate")]
    pub prob_mutate: f32,
    /// Fitness to selection-ratio normalization.
    #[serde(default)]
    pub ratio_policy: RatioPolicy,
    /// How crossover masks are drawn.
    #[serde(default)]
    pub mask_policy: MaskPolicy,
    /// Whether the mutation stage also protects the best individual.
    #[serde(default)]
    pub mutation_elitism: MutationElitism,
    /// Random seed for drivers that generate their own streams.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            prob_crossover: default_prob_crossover(),
            prob_mutate: default_prob_mutate(),
            ratio_policy: RatioPolicy::default(),
            mask_policy: MaskPolicy::default(),
            mutation_elitism: MutationElitism::default(),
            random_seed: None,
        }
    }
}

/// Monotonic mapping from fitness to selection weight.
///
/// Every policy maps the weakest individual to `0.0` and the best to `1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatioPolicy {
    /// `(fitness - weakest) / (best - weakest)`.
    #[default]
    Linear,
    /// Square of the linear share; stronger pressure towards the best.
    Quadratic,
}

/// Crossover mask generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskPolicy {
    /// Two random cut points; genes inside the segment are kept.
    #[default]
    CutPoints,
    /// Each gene is kept independently with probability one half.
    Uniform,
}

impl MaskPolicy {
    /// Random draws this policy consumes per individual.
    pub fn draws(self, gene_count: usize) -> usize {
        match self {
            MaskPolicy::CutPoints => 2,
            MaskPolicy::Uniform => gene_count,
        }
    }
}

/// Elite protection during the mutation stage.
///
/// Recombination always skips the best individual. Mutation does not unless
/// configured to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationElitism {
    /// The best individual is mutated like any other.
    #[default]
    Unprotected,
    /// Individuals whose fitness equals the generation's best are skipped.
    ProtectBest,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::InvalidPopulationSize);
        }
        if u32::try_from(self.population_size).is_err() {
            return Err(ConfigError::PopulationTooLarge(self.population_size));
        }
        for (name, value) in [
            ("prob_crossover", self.prob_crossover),
            ("prob_mutate", self.prob_mutate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { name, value });
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    InvalidPopulationSize,
    #[error("Population size {0} does not fit a 32-bit mate index")]
    PopulationTooLarge(usize),
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f32 },
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
