use rand::Rng;

use crate::alias::AliasTable;
use crate::config::SamplingType;
use crate::data::{NegativeMatrix, PerSlot, Slot, Triple};
use crate::dataset::{Dataset, PositiveIndex};
use crate::errors::SamplerError;
use crate::filter;
use crate::types::ValueId;

/// How raw negatives are drawn for a slot.
#[derive(Debug, Clone)]
pub enum SamplingStrategy {
    /// Uniform over `0..vocabulary[slot]`.
    Uniform {
        /// Vocabulary size per slot.
        vocabulary: PerSlot<usize>,
    },
    /// Smoothed training-split frequencies, one alias table per slot.
    Frequency {
        /// Alias table per slot, sized to the slot vocabulary.
        tables: PerSlot<AliasTable>,
    },
}

impl SamplingStrategy {
    /// Uniform strategy over the given vocabulary sizes.
    pub fn uniform(vocabulary: PerSlot<usize>) -> Self {
        SamplingStrategy::Uniform { vocabulary }
    }

    /// Frequency strategy from the `train_split` triples of `dataset`.
    ///
    /// Each slot gets its own distribution proportional to `count(v) + alpha`, where
    /// `count(v)` is how often `v` occurs at that slot in the split.
    pub fn frequency(
        dataset: &dyn Dataset,
        vocabulary: PerSlot<usize>,
        train_split: &str,
        alpha: f64,
    ) -> Result<Self, SamplerError> {
        let triples = dataset.split(train_split)?;
        let tables = PerSlot::try_from_fn(|slot| {
            let counts = slot_counts(triples, slot, vocabulary[slot])?;
            AliasTable::from_counts(&counts, alpha)
        })?;
        Ok(SamplingStrategy::Frequency { tables })
    }

    /// Strategy for `sampling_type`.
    pub fn for_type(
        sampling_type: SamplingType,
        dataset: &dyn Dataset,
        vocabulary: PerSlot<usize>,
        train_split: &str,
        alpha: f64,
    ) -> Result<Self, SamplerError> {
        match sampling_type {
            SamplingType::Uniform => Ok(Self::uniform(vocabulary)),
            SamplingType::Frequency => Self::frequency(dataset, vocabulary, train_split, alpha),
        }
    }

    /// Sampling type this strategy implements.
    pub fn sampling_type(&self) -> SamplingType {
        match self {
            SamplingStrategy::Uniform { .. } => SamplingType::Uniform,
            SamplingStrategy::Frequency { .. } => SamplingType::Frequency,
        }
    }

    /// Number of values this strategy can return for `slot`.
    pub fn vocabulary_size(&self, slot: Slot) -> usize {
        match self {
            SamplingStrategy::Uniform { vocabulary } => vocabulary[slot],
            SamplingStrategy::Frequency { tables } => tables[slot].len(),
        }
    }

    /// Independent draws: a `rows x n` matrix.
    ///
    /// Fails with [`SamplerError::InvalidShape`] when `rows * n` overflows.
    pub fn sample_independent<R: Rng + ?Sized>(
        &self,
        rows: usize,
        slot: Slot,
        n: usize,
        rng: &mut R,
    ) -> Result<NegativeMatrix, SamplerError> {
        if n == 0 {
            return Ok(NegativeMatrix::empty(rows));
        }
        let count = NegativeMatrix::checked_len(rows, n)?;
        Ok(NegativeMatrix::from_parts(rows, n, self.draw(slot, count, rng)))
    }

    /// One vector of `n` draws meant to be shared by a whole batch.
    pub fn sample_shared<R: Rng + ?Sized>(&self, slot: Slot, n: usize, rng: &mut R) -> Vec<ValueId> {
        self.draw(slot, n, rng)
    }

    /// `count` draws for `slot`.
    pub(crate) fn draw<R: Rng + ?Sized>(
        &self,
        slot: Slot,
        count: usize,
        rng: &mut R,
    ) -> Vec<ValueId> {
        match self {
            SamplingStrategy::Uniform { vocabulary } => {
                uniform_draws(vocabulary[slot] as ValueId, count, rng)
            }
            SamplingStrategy::Frequency { tables } => tables[slot].sample_n(count, rng),
        }
    }

    /// Batch-level filter path specific to this strategy.
    ///
    /// Returns [`SamplerError::Unsupported`] without touching `negatives` when the
    /// strategy has no such path.
    pub fn filter_fast<R: Rng + ?Sized>(
        &self,
        negatives: &mut NegativeMatrix,
        batch: &[Triple],
        slot: Slot,
        index: &dyn PositiveIndex,
        rng: &mut R,
    ) -> Result<(), SamplerError> {
        match self {
            SamplingStrategy::Uniform { vocabulary } => {
                filter::filter_and_resample_uniform(
                    negatives,
                    batch,
                    slot,
                    index,
                    vocabulary[slot] as ValueId,
                    rng,
                );
                Ok(())
            }
            SamplingStrategy::Frequency { .. } => Err(SamplerError::Unsupported(
                "frequency sampling has no fast filter path; use filtering.implementation=standard"
                    .to_string(),
            )),
        }
    }
}

/// `count` uniform draws from `0..upper`.
pub(crate) fn uniform_draws<R: Rng + ?Sized>(
    upper: ValueId,
    count: usize,
    rng: &mut R,
) -> Vec<ValueId> {
    (0..count).map(|_| rng.random_range(0..upper)).collect()
}

fn slot_counts(triples: &[Triple], slot: Slot, vocabulary: usize) -> Result<Vec<u64>, SamplerError> {
    let mut counts = vec![0u64; vocabulary];
    for triple in triples {
        let value = triple.get(slot) as usize;
        match counts.get_mut(value) {
            Some(count) => *count += 1,
            None => {
                return Err(SamplerError::DatasetInconsistent {
                    details: format!(
                        "value {value} at slot '{slot}' is outside the vocabulary of size {vocabulary}"
                    ),
                });
            }
        }
    }
    Ok(counts)
}
