//! Filter-and-resample: replace sampled negatives that are known positives.
//!
//! Both implementations resolve one row at a time with the same loop
//! ([`resample_row`]): find the colliding positions, draw that many fresh
//! candidates, keep the ones that are not positives, write them into the next
//! unresolved positions in order, and repeat until nothing is left.
//!
//! The loop has no retry bound. It terminates only if every row's positive set is
//! smaller than the slot vocabulary; callers must guarantee that.

use indexmap::IndexMap;
use indexmap::map::Entry;
use rand::Rng;
use rayon::prelude::*;
use std::borrow::Cow;

use crate::data::{NegativeMatrix, Slot, Triple};
use crate::dataset::PositiveIndex;
use crate::rng::DeterministicRng;
use crate::strategy::{SamplingStrategy, uniform_draws};
use crate::types::{PairKey, ValueId};

/// Positive values prepared for membership tests.
///
/// Borrows the index slice when it is already strictly increasing; otherwise keeps a
/// sorted, deduplicated copy.
#[derive(Debug, Clone)]
pub struct PositiveSet<'a> {
    values: Cow<'a, [ValueId]>,
}

impl<'a> PositiveSet<'a> {
    /// Prepare `values` for lookups.
    pub fn new(values: &'a [ValueId]) -> Self {
        if values.windows(2).all(|pair| pair[0] < pair[1]) {
            return Self {
                values: Cow::Borrowed(values),
            };
        }
        let mut owned = values.to_vec();
        owned.sort_unstable();
        owned.dedup();
        Self {
            values: Cow::Owned(owned),
        }
    }

    /// Whether `value` is a positive.
    pub fn contains(&self, value: ValueId) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// Number of distinct positives.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no positives.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Positions of `candidates` whose value is a positive.
pub fn where_in(candidates: &[ValueId], positives: &PositiveSet<'_>) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, value)| positives.contains(**value))
        .map(|(i, _)| i)
        .collect()
}

/// Positions of `candidates` whose value is not a positive.
pub fn where_not_in(candidates: &[ValueId], positives: &PositiveSet<'_>) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, value)| !positives.contains(**value))
        .map(|(i, _)| i)
        .collect()
}

/// Replace every positive in `row` with fresh non-positive draws.
///
/// `draw(k)` must return `k` fresh candidates from the sampling distribution.
/// Returns the number of replaced positions.
pub fn resample_row<F>(row: &mut [ValueId], positives: &PositiveSet<'_>, mut draw: F) -> usize
where
    F: FnMut(usize) -> Vec<ValueId>,
{
    if positives.is_empty() {
        return 0;
    }
    let resample_idx = where_in(row, positives);
    let num_new = resample_idx.len();
    let mut num_found = 0;
    while num_found < num_new {
        let fresh = draw(num_new - num_found);
        for idx in where_not_in(&fresh, positives) {
            row[resample_idx[num_found]] = fresh[idx];
            num_found += 1;
        }
    }
    num_new
}

/// Strategy-agnostic filtering: rows are resolved in order, each redraw going
/// through `strategy` with the caller's generator.
pub fn filter_and_resample<R: Rng + ?Sized>(
    negatives: &mut NegativeMatrix,
    batch: &[Triple],
    slot: Slot,
    index: &dyn PositiveIndex,
    strategy: &SamplingStrategy,
    rng: &mut R,
) -> usize {
    debug_assert_eq!(negatives.num_rows(), batch.len());
    if negatives.num_cols() == 0 {
        return 0;
    }
    let mut replaced = 0;
    for (i, triple) in batch.iter().enumerate() {
        let positives = PositiveSet::new(index.positives(triple.pair_key(slot)));
        replaced += resample_row(negatives.row_mut(i), &positives, |remaining| {
            strategy.draw(slot, remaining, &mut *rng)
        });
    }
    replaced
}

/// Uniform-only filtering over the whole batch.
///
/// Positive sets are looked up once per distinct key, then rows are resolved in
/// parallel, each with its own generator seeded from `rng` in row order.
pub(crate) fn filter_and_resample_uniform<R: Rng + ?Sized>(
    negatives: &mut NegativeMatrix,
    batch: &[Triple],
    slot: Slot,
    index: &dyn PositiveIndex,
    upper: ValueId,
    rng: &mut R,
) -> usize {
    debug_assert_eq!(negatives.num_rows(), batch.len());
    let cols = negatives.num_cols();
    if cols == 0 || batch.is_empty() {
        return 0;
    }

    let mut lookup: IndexMap<PairKey, PositiveSet<'_>> = IndexMap::with_capacity(batch.len());
    let row_sets: Vec<usize> = batch
        .iter()
        .map(|triple| {
            let key = triple.pair_key(slot);
            match lookup.entry(key) {
                Entry::Occupied(entry) => entry.index(),
                Entry::Vacant(entry) => {
                    let set_idx = entry.index();
                    entry.insert(PositiveSet::new(index.positives(key)));
                    set_idx
                }
            }
        })
        .collect();
    let row_rngs = DeterministicRng::per_row(rng, batch.len());

    negatives
        .as_mut_slice()
        .par_chunks_mut(cols)
        .zip(row_sets.par_iter())
        .zip(row_rngs.into_par_iter())
        .map(|((row, &set_idx), mut row_rng)| {
            let positives = &lookup[set_idx];
            resample_row(row, positives, |remaining| {
                uniform_draws(upper, remaining, &mut row_rng)
            })
        })
        .sum()
}
