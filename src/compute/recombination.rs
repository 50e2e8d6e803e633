//! Recombination stage - crossover mask construction and ordered crossover.

use crate::schema::MaskPolicy;

/// Mask value marking a gene kept from the original chromosome.
pub const KEEP: i32 = 1;

/// Map a uniform draw onto a gene position.
#[inline]
pub(crate) fn draw_position(draw: f32, gene_count: usize) -> usize {
    ((draw * gene_count as f32) as usize).min(gene_count - 1)
}

/// Write the crossover mask for one individual from `draws`.
///
/// `draws` holds `policy.draws(mask.len())` values.
pub fn build_mask(policy: MaskPolicy, draws: &[f32], mask: &mut [i32]) {
    let gene_count = mask.len();
    match policy {
        MaskPolicy::CutPoints => {
            let a = draw_position(draws[0], gene_count);
            let b = draw_position(draws[1], gene_count);
            let (start, end) = (a.min(b), a.max(b));
            for (j, m) in mask.iter_mut().enumerate() {
                *m = i32::from(j >= start && j <= end);
            }
        }
        MaskPolicy::Uniform => {
            for (m, &draw) in mask.iter_mut().zip(draws) {
                *m = i32::from(draw < 0.5);
            }
        }
    }
}

/// Combine `row` with `mate` in place under `mask`.
///
/// Kept genes stay where they are. With `ordered` the remaining positions
/// are filled left to right with the mate's genes in the mate's order,
/// skipping values already kept, so a permutation stays a permutation.
/// Otherwise each remaining position takes the mate's gene at that position.
pub fn recombine_row(row: &mut [i32], mate: &[i32], mask: &[i32], ordered: bool) {
    if !ordered {
        for ((gene, &mate_gene), &m) in row.iter_mut().zip(mate).zip(mask) {
            if m != KEEP {
                *gene = mate_gene;
            }
        }
        return;
    }

    let mut cursor = 0;
    for j in 0..row.len() {
        if mask[j] == KEEP {
            continue;
        }
        while cursor < mate.len() {
            let candidate = mate[cursor];
            cursor += 1;
            // Kept positions are never written, so this reads original values.
            let kept = row
                .iter()
                .zip(mask)
                .any(|(&gene, &m)| m == KEEP && gene == candidate);
            if !kept {
                row[j] = candidate;
                break;
            }
        }
    }
}

/// Outcome of one recombination lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneOutcome {
    /// Fitness equals the generation's best.
    Elite,
    /// The probability test failed.
    Skipped,
    /// The row was rebuilt from itself and its mate.
    Recombined,
}

/// Run one recombination lane.
///
/// The mask row is cleared for elite and skipped lanes.
#[allow(clippy::too_many_arguments)]
pub fn crossover_lane(
    row: &mut [i32],
    mate: &[i32],
    mask: &mut [i32],
    fitness: f32,
    best: f32,
    prob_crossover: f32,
    policy: MaskPolicy,
    ordered: bool,
    draws: &[f32],
) -> LaneOutcome {
    if fitness == best {
        mask.fill(0);
        return LaneOutcome::Elite;
    }
    if draws[0] >= prob_crossover {
        mask.fill(0);
        return LaneOutcome::Skipped;
    }
    build_mask(policy, &draws[1..], mask);
    recombine_row(row, mate, mask, ordered);
    LaneOutcome::Recombined
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn is_permutation_of(row: &[i32], values: &[i32]) -> bool {
        let mut a = row.to_vec();
        let mut b = values.to_vec();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    #[test]
    fn test_identical_parents_unchanged() {
        for mask in [[0, 0, 0], [1, 0, 1], [0, 1, 0], [1, 1, 1], [0, 0, 1]] {
            let mut row = [1, 2, 3];
            recombine_row(&mut row, &[1, 2, 3], &mask, true);
            assert_eq!(row, [1, 2, 3], "mask {:?}", mask);
        }
    }

    #[test]
    fn test_ordered_fill_follows_mate_order() {
        // Keep positions 1..=2 (values 2, 3); fill the rest from the mate.
        let mut row = [1, 2, 3, 4, 5];
        recombine_row(&mut row, &[5, 4, 3, 2, 1], &[0, 1, 1, 0, 0], true);
        assert_eq!(row, [5, 2, 3, 4, 1]);
    }

    #[test]
    fn test_positional_fill() {
        let mut row = [1, 1, 1, 1];
        recombine_row(&mut row, &[2, 2, 2, 2], &[1, 0, 1, 0], false);
        assert_eq!(row, [1, 2, 1, 2]);
    }

    #[test]
    fn test_cut_point_mask() {
        let mut mask = [0; 5];
        build_mask(MaskPolicy::CutPoints, &[0.9, 0.3], &mut mask);
        assert_eq!(mask, [0, 1, 1, 1, 1]);

        build_mask(MaskPolicy::CutPoints, &[0.5, 0.5], &mut mask);
        assert_eq!(mask, [0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_uniform_mask() {
        let mut mask = [0; 4];
        build_mask(MaskPolicy::Uniform, &[0.1, 0.6, 0.49, 0.5], &mut mask);
        assert_eq!(mask, [1, 0, 1, 0]);
    }

    #[test]
    fn test_lane_elite_and_probability() {
        let mut row = [1, 2, 3];
        let mut mask = [1, 1, 1];

        let outcome = crossover_lane(
            &mut row,
            &[3, 2, 1],
            &mut mask,
            4.0,
            4.0,
            1.0,
            MaskPolicy::CutPoints,
            true,
            &[0.0, 0.0, 0.0],
        );
        assert_eq!(outcome, LaneOutcome::Elite);
        assert_eq!(row, [1, 2, 3]);
        assert_eq!(mask, [0, 0, 0]);

        let outcome = crossover_lane(
            &mut row,
            &[3, 2, 1],
            &mut mask,
            1.0,
            4.0,
            0.0,
            MaskPolicy::CutPoints,
            true,
            &[0.0, 0.0, 0.0],
        );
        assert_eq!(outcome, LaneOutcome::Skipped);
        assert_eq!(row, [1, 2, 3]);

        // Segment [0, 0] keeps gene 0, the rest follows the mate's order.
        let outcome = crossover_lane(
            &mut row,
            &[3, 2, 1],
            &mut mask,
            1.0,
            4.0,
            1.0,
            MaskPolicy::CutPoints,
            true,
            &[0.0, 0.0, 0.0],
        );
        assert_eq!(outcome, LaneOutcome::Recombined);
        assert_eq!(mask, [1, 0, 0]);
        assert_eq!(row, [1, 3, 2]);
    }

    proptest! {
        #[test]
        fn prop_ordered_crossover_keeps_permutation(
            (parent, mate) in (2usize..24).prop_flat_map(|n| {
                let values: Vec<i32> = (0..n as i32).collect();
                (Just(values.clone()).prop_shuffle(), Just(values).prop_shuffle())
            }),
            uniform in any::<bool>(),
            draws in prop::collection::vec(0.0f32..1.0, 24),
        ) {
            let policy = if uniform { MaskPolicy::Uniform } else { MaskPolicy::CutPoints };
            let mut mask = vec![0; parent.len()];
            build_mask(policy, &draws, &mut mask);

            let mut row = parent.clone();
            recombine_row(&mut row, &mate, &mask, true);

            prop_assert!(is_permutation_of(&row, &parent));
            for (j, &m) in mask.iter().enumerate() {
                if m == KEEP {
                    prop_assert_eq!(row[j], parent[j]);
                }
            }
        }
    }
}
