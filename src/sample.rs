use std::ops::RangeInclusive;

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Draws `count` distinct keys from `range` without replacement. Asking for
/// more keys than the range holds returns every key in it, in no particular
/// order. Memory grows with `count`, not with the width of the range.
pub fn sample_distinct<R: Rng + ?Sized>(
    rng: &mut R,
    range: RangeInclusive<i64>,
    count: usize,
) -> Vec<i64> {
    let (start, end) = range.into_inner();
    if start > end {
        return Vec::new();
    }
    // The full i64 span has one more value than usize can count; the last
    // key of such a range is never drawn.
    let len = usize::try_from(end.abs_diff(start))
        .ok()
        .and_then(|span| span.checked_add(1))
        .unwrap_or(usize::MAX);
    index::sample(rng, len, count.min(len))
        .into_iter()
        .map(|offset| start.wrapping_add_unsigned(offset as u64))
        .collect()
}

pub fn seeded_rng(seed: u64) -> Pcg64 {
    Pcg64::seed_from_u64(seed)
}
