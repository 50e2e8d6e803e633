//! Pipeline error type.

use super::Stage;
use super::gpu::GpuError;
use crate::schema::{ChromosomeError, ConfigError};

/// Errors raised by stage execution.
///
/// Any error aborts the generation; outputs of the failing stage are undefined.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Device state buffers used before allocation")]
    BufferNotInitialized,

    #[error("{what} has length {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Individual {index} is out of range for a population of {population_size}")]
    IndexOutOfRange {
        index: usize,
        population_size: usize,
    },

    #[error("{stage} stage needs {required} random draws, stream holds {available}")]
    RandomStreamTooShort {
        stage: Stage,
        required: usize,
        available: usize,
    },

    #[error("Fitness of individual {index} is not finite")]
    NonFiniteFitness { index: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chromosome(#[from] ChromosomeError),

    #[error("GPU stage failed: {0}")]
    Gpu(#[from] GpuError),
}

/// Fail unless `actual == expected`.
pub(crate) fn check_len(
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), PipelineError> {
    if expected != actual {
        return Err(PipelineError::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Fail unless the stream covers every lane of `stage`.
pub(crate) fn check_draws(
    stage: Stage,
    required: usize,
    available: usize,
) -> Result<(), PipelineError> {
    if available < required {
        return Err(PipelineError::RandomStreamTooShort {
            stage,
            required,
            available,
        });
    }
    Ok(())
}
