//! Mating stage - roulette-wheel mate choice.

/// Pick a mate index from `ratios` using one uniform draw.
///
/// `total` is the sum of `ratios`, computed once per stage. Zero-weight
/// individuals are never picked while any weight is positive. A zero total
/// falls back to a uniform pick.
pub fn roulette_pick(ratios: &[f32], total: f32, draw: f32) -> usize {
    let last = ratios.len().saturating_sub(1);
    if total <= 0.0 {
        return ((draw * ratios.len() as f32) as usize).min(last);
    }

    let aim = draw * total;
    let mut acc = 0.0f32;
    let mut last_positive = 0;
    for (i, &ratio) in ratios.iter().enumerate() {
        acc += ratio;
        if ratio > 0.0 {
            last_positive = i;
        }
        if acc > aim {
            return i;
        }
    }
    // Rounding left the running sum at or below the aim.
    last_positive
}

/// Sum of selection weights, in index order.
#[inline]
pub fn ratio_total(ratios: &[f32]) -> f32 {
    ratios.iter().fold(0.0f32, |acc, &r| acc + r)
}
