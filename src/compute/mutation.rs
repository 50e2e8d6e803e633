//! Mutation stage - single-gene point mutation.

use crate::schema::ChromosomeDescriptor;

use super::recombination::draw_position;

/// Run one mutation lane over `row`.
///
/// `draws` holds the probability test, the position choice and the value
/// draw handed to the gene's own rule. For permutation chromosomes the
/// displaced value moves to wherever the new value used to be.
/// Returns whether the lane passed its probability test.
pub fn mutate_lane(
    row: &mut [i32],
    descriptor: &ChromosomeDescriptor,
    prob_mutate: f32,
    draws: &[f32],
) -> bool {
    if draws[0] >= prob_mutate {
        return false;
    }

    let position = draw_position(draws[1], row.len());
    let old = row[position];
    let replacement = descriptor.gene(position).mutate(old, draws[2]);
    if replacement == old {
        return true;
    }

    if descriptor.is_permutation()
        && let Some(other) = row.iter().position(|&v| v == replacement)
    {
        row[other] = old;
    }
    row[position] = replacement;
    true
}
