//! Selection stage - fitness reduction and selection-ratio normalization.

use crate::schema::RatioPolicy;

use super::{PipelineError, check_len};

/// Above this magnitude, extremes are halved before taking their difference.
/// Must match `HALF_MAX` in calc_ratio.wgsl.
const HALF_MAX: f32 = 1.701_411_7e38;

/// Fitness value and position of an extreme individual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extreme {
    pub value: f32,
    pub index: usize,
}

/// Global scalars produced by the selection stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionSummary {
    /// Highest fitness; ties resolve to the lowest index.
    pub best: Extreme,
    /// Lowest fitness; ties resolve to the lowest index.
    pub weakest: Extreme,
}

impl SelectionSummary {
    /// All individuals share one fitness value.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.best.value == self.weakest.value
    }
}

/// Full output of one selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOutcome {
    pub ratios: Vec<f32>,
    pub summary: SelectionSummary,
}

impl RatioPolicy {
    /// Selection ratio of `fitness` given the generation's extremes.
    ///
    /// A degenerate range yields `1.0` for everyone.
    #[inline]
    pub fn ratio(self, fitness: f32, summary: &SelectionSummary) -> f32 {
        let (mut f, mut best, mut weakest) = (fitness, summary.best.value, summary.weakest.value);
        // Halve near the top of the f32 range so `best - weakest` stays finite.
        if best.abs().max(weakest.abs()) > HALF_MAX {
            f *= 0.5;
            best *= 0.5;
            weakest *= 0.5;
        }
        let range = best - weakest;
        if range <= 0.0 {
            return 1.0;
        }
        let share = (f - weakest) / range;
        let shaped = match self {
            RatioPolicy::Linear => share,
            RatioPolicy::Quadratic => share * share,
        };
        shaped.clamp(0.0, 1.0)
    }
}

/// Reject NaN and infinite fitness values.
pub(crate) fn check_finite(fitness: &[f32]) -> Result<(), PipelineError> {
    match fitness.iter().position(|f| !f.is_finite()) {
        Some(index) => Err(PipelineError::NonFiniteFitness { index }),
        None => Ok(()),
    }
}

/// Global reduction over the fitness vector.
pub fn find_extremes(fitness: &[f32]) -> Result<SelectionSummary, PipelineError> {
    check_finite(fitness)?;
    let Some(&first) = fitness.first() else {
        return Err(PipelineError::DimensionMismatch {
            what: "fitness vector",
            expected: 1,
            actual: 0,
        });
    };

    let mut best = Extreme {
        value: first,
        index: 0,
    };
    let mut weakest = best;
    for (index, &value) in fitness.iter().enumerate().skip(1) {
        if value > best.value {
            best = Extreme { value, index };
        }
        if value < weakest.value {
            weakest = Extreme { value, index };
        }
    }

    Ok(SelectionSummary { best, weakest })
}

/// Reduce `fitness` and write one ratio per individual into `ratios`.
pub fn compute_selection_into(
    fitness: &[f32],
    policy: RatioPolicy,
    ratios: &mut [f32],
) -> Result<SelectionSummary, PipelineError> {
    check_len("selection-ratio vector", fitness.len(), ratios.len())?;
    let summary = find_extremes(fitness)?;

    if summary.is_degenerate() {
        log::debug!(
            "selection: all {} individuals share fitness {}, using uniform ratios",
            fitness.len(),
            summary.best.value
        );
    }

    for (ratio, &f) in ratios.iter_mut().zip(fitness) {
        *ratio = policy.ratio(f, &summary);
    }
    Ok(summary)
}

/// Allocating variant of [`compute_selection_into`].
pub fn compute_selection(
    fitness: &[f32],
    policy: RatioPolicy,
) -> Result<SelectionOutcome, PipelineError> {
    let mut ratios = vec![0.0; fitness.len()];
    let summary = compute_selection_into(fitness, policy, &mut ratios)?;
    Ok(SelectionOutcome { ratios, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_scenario() {
        let outcome = compute_selection(&[1.0, 4.0, 2.0, 3.0], RatioPolicy::Linear).unwrap();

        assert_eq!(outcome.summary.best, Extreme { value: 4.0, index: 1 });
        assert_eq!(outcome.summary.weakest, Extreme { value: 1.0, index: 0 });
        assert_eq!(outcome.ratios[1], 1.0);
        assert_eq!(outcome.ratios[0], 0.0);
        assert!(outcome.ratios[2] < outcome.ratios[3]);
    }

    #[test]
    fn test_equal_fitness_gives_uniform_ratios() {
        for policy in [RatioPolicy::Linear, RatioPolicy::Quadratic] {
            let outcome = compute_selection(&[2.5; 6], policy).unwrap();
            assert!(outcome.summary.is_degenerate());
            assert!(outcome.ratios.iter().all(|&r| r == 1.0));
        }
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        let summary = find_extremes(&[3.0, 1.0, 3.0, 1.0]).unwrap();
        assert_eq!(summary.best.index, 0);
        assert_eq!(summary.weakest.index, 1);
    }

    #[test]
    fn test_non_finite_fitness_rejected() {
        assert!(matches!(
            find_extremes(&[1.0, f32::NAN]),
            Err(PipelineError::NonFiniteFitness { index: 1 })
        ));
        assert!(matches!(
            find_extremes(&[f32::INFINITY]),
            Err(PipelineError::NonFiniteFitness { index: 0 })
        ));
    }

    #[test]
    fn test_empty_fitness_rejected() {
        assert!(find_extremes(&[]).is_err());
    }

    #[test]
    fn test_ratio_buffer_length_checked() {
        let mut ratios = vec![0.0; 3];
        assert!(matches!(
            compute_selection_into(&[1.0, 2.0], RatioPolicy::Linear, &mut ratios),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_extreme_magnitudes_stay_finite() {
        for fitness in [
            vec![3.0e38, 1.0e38, -3.0e38],
            vec![f32::MAX, 0.0, -f32::MAX],
            vec![-f32::MAX, f32::MAX],
        ] {
            for policy in [RatioPolicy::Linear, RatioPolicy::Quadratic] {
                let outcome = compute_selection(&fitness, policy).unwrap();
                assert!(
                    outcome.ratios.iter().all(|r| (0.0..=1.0).contains(r)),
                    "{:?} gave {:?}",
                    fitness,
                    outcome.ratios
                );
                assert_eq!(outcome.ratios[outcome.summary.best.index], 1.0);
                assert_eq!(outcome.ratios[outcome.summary.weakest.index], 0.0);
            }
        }

        let outcome = compute_selection(&[3.0e38, 1.0e38, -3.0e38], RatioPolicy::Linear).unwrap();
        assert!(outcome.ratios[2] < outcome.ratios[1] && outcome.ratios[1] < outcome.ratios[0]);
    }

    #[test]
    fn test_quadratic_is_steeper() {
        let linear = compute_selection(&[0.0, 1.0, 2.0], RatioPolicy::Linear).unwrap();
        let quadratic = compute_selection(&[0.0, 1.0, 2.0], RatioPolicy::Quadratic).unwrap();
        assert_eq!(linear.ratios[1], 0.5);
        assert_eq!(quadratic.ratios[1], 0.25);
        assert_eq!(quadratic.ratios[2], 1.0);
    }

    proptest! {
        #[test]
        fn prop_ratios_monotonic_and_bounded(
            fitness in prop::collection::vec(
                prop_oneof![-1.0e3f32..1.0e3, prop::num::f32::NORMAL],
                1..64,
            ),
            quadratic in any::<bool>(),
        ) {
            let policy = if quadratic { RatioPolicy::Quadratic } else { RatioPolicy::Linear };
            let outcome = compute_selection(&fitness, policy).unwrap();
            let summary = outcome.summary;

            for (i, &fi) in fitness.iter().enumerate() {
                prop_assert!(summary.best.value >= fi && fi >= summary.weakest.value);
                prop_assert!(outcome.ratios[i].is_finite());
                prop_assert!((0.0..=1.0).contains(&outcome.ratios[i]));
                for (j, &fj) in fitness.iter().enumerate() {
                    if fi <= fj {
                        prop_assert!(outcome.ratios[i] <= outcome.ratios[j]);
                    }
                }
            }
            prop_assert_eq!(outcome.ratios[summary.best.index], 1.0);
            if !summary.is_degenerate() {
                prop_assert_eq!(outcome.ratios[summary.weakest.index], 0.0);
            }
        }
    }
}
