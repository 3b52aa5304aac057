use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

use crate::config::{FilterImplementation, SamplerConfig, SamplingType};
use crate::data::{NegativeMatrix, PerSlot, Slot, Triple, index_name};
use crate::dataset::{Dataset, PositiveIndex};
use crate::errors::SamplerError;
use crate::filter::filter_and_resample;
use crate::strategy::SamplingStrategy;
use crate::types::{SplitName, ValueId};

/// Filter implementation actually in use, resolved at most once per sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedFilter {
    /// `fast_if_available` has not been tried yet.
    Unresolved,
    /// Strategy-agnostic per-row loop.
    Standard,
    /// Strategy-specific batch path.
    Fast,
}

const RESOLVED_UNRESOLVED: u8 = 0;
const RESOLVED_STANDARD: u8 = 1;
const RESOLVED_FAST: u8 = 2;

impl ResolvedFilter {
    fn initial(implementation: FilterImplementation) -> Self {
        match implementation {
            FilterImplementation::Standard => ResolvedFilter::Standard,
            FilterImplementation::Fast => ResolvedFilter::Fast,
            FilterImplementation::FastIfAvailable => ResolvedFilter::Unresolved,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            ResolvedFilter::Unresolved => RESOLVED_UNRESOLVED,
            ResolvedFilter::Standard => RESOLVED_STANDARD,
            ResolvedFilter::Fast => RESOLVED_FAST,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            RESOLVED_STANDARD => ResolvedFilter::Standard,
            RESOLVED_FAST => ResolvedFilter::Fast,
            _ => ResolvedFilter::Unresolved,
        }
    }
}

/// Negative sampler for knowledge-graph triples.
///
/// Built once from a [`SamplerConfig`] and a [`Dataset`]; afterwards it is read-only
/// apart from the memorized filter implementation, so one instance can be shared by
/// many worker threads.
pub struct NegativeSampler {
    num_samples: PerSlot<usize>,
    filter_positives: PerSlot<bool>,
    shared: bool,
    filtering_split: SplitName,
    filter_implementation: FilterImplementation,
    resolved_filter: AtomicU8,
    indexes: PerSlot<Option<Arc<dyn PositiveIndex>>>,
    strategy: SamplingStrategy,
}

impl NegativeSampler {
    /// Validate `config`, resolve per-slot counts, fetch the positive-pair indices
    /// needed for filtering, and build the sampling strategy.
    pub fn new(config: &SamplerConfig, dataset: &dyn Dataset) -> Result<Self, SamplerError> {
        config.validate()?;

        let vocabulary = PerSlot::try_from_fn(|slot| {
            let size = dataset.vocabulary_size(slot);
            if size == 0 || size > ValueId::MAX as usize {
                return Err(SamplerError::Configuration(format!(
                    "vocabulary size {size} for slot '{slot}' must be in 1..={}",
                    ValueId::MAX
                )));
            }
            Ok(size)
        })?;

        let num_samples = config.num_samples.resolve();
        for slot in Slot::ALL {
            if config.num_samples.get(slot) < 0 {
                debug!(
                    slot = %slot,
                    num_samples = num_samples[slot],
                    "derived unset negative sample count"
                );
            }
        }

        let filtering_split = config.filtering_split().to_string();
        let filter_positives = PerSlot::from_fn(|slot| config.filtering.get(slot));
        // Fetch indices now so worker threads never build them on first use.
        let indexes = PerSlot::try_from_fn(|slot| {
            if !filter_positives[slot] {
                return Ok(None);
            }
            let name = index_name(&filtering_split, slot);
            let index = dataset.index(&name)?;
            debug!(slot = %slot, index = %name, "loaded positive-pair index for filtering");
            Ok::<_, SamplerError>(Some(index))
        })?;

        let strategy = SamplingStrategy::for_type(
            config.sampling_type,
            dataset,
            vocabulary,
            &config.train_split,
            config.frequency.smoothing,
        )?;

        let filter_implementation = config.filtering.implementation;
        debug!(
            sampling_type = %config.sampling_type,
            shared = config.shared,
            filtering_split = %filtering_split,
            filter_implementation = %filter_implementation,
            num_samples_s = num_samples[Slot::Subject],
            num_samples_p = num_samples[Slot::Predicate],
            num_samples_o = num_samples[Slot::Object],
            "negative sampler configured"
        );

        Ok(Self {
            num_samples,
            filter_positives,
            shared: config.shared,
            filtering_split,
            filter_implementation,
            resolved_filter: AtomicU8::new(ResolvedFilter::initial(filter_implementation).to_bits()),
            indexes,
            strategy,
        })
    }

    /// Negatives for `slot` of every triple in `batch`, using the thread-local RNG.
    ///
    /// Returns a `batch.len() x n` matrix where `n` is `num_samples` or, when `None`,
    /// the configured count for `slot`.
    ///
    /// With filtering enabled no row contains a known positive of its triple. This
    /// requires every positive set to be smaller than the slot vocabulary; otherwise
    /// the call does not return.
    pub fn sample(
        &self,
        batch: &[Triple],
        slot: Slot,
        num_samples: Option<usize>,
    ) -> Result<NegativeMatrix, SamplerError> {
        self.sample_with_rng(batch, slot, num_samples, &mut rand::rng())
    }

    /// Same as [`NegativeSampler::sample`] with an explicit random source.
    pub fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        batch: &[Triple],
        slot: Slot,
        num_samples: Option<usize>,
        rng: &mut R,
    ) -> Result<NegativeMatrix, SamplerError> {
        let n = num_samples.unwrap_or(self.num_samples[slot]);
        let mut negatives = if self.shared {
            NegativeMatrix::checked_len(batch.len(), n)?;
            let shared = self.strategy.sample_shared(slot, n, rng);
            NegativeMatrix::broadcast(&shared, batch.len())
        } else {
            self.strategy.sample_independent(batch.len(), slot, n, rng)?
        };
        if self.filter_positives[slot] && !negatives.is_empty() {
            self.filter(&mut negatives, batch, slot, rng)?;
        }
        Ok(negatives)
    }

    fn filter<R: Rng + ?Sized>(
        &self,
        negatives: &mut NegativeMatrix,
        batch: &[Triple],
        slot: Slot,
        rng: &mut R,
    ) -> Result<(), SamplerError> {
        let index = self.indexes[slot]
            .as_deref()
            .ok_or_else(|| SamplerError::MissingIndex {
                name: index_name(&self.filtering_split, slot),
            })?;
        match self.resolved_filter_implementation() {
            ResolvedFilter::Standard => {
                filter_and_resample(negatives, batch, slot, index, &self.strategy, rng);
                Ok(())
            }
            ResolvedFilter::Fast => self.strategy.filter_fast(negatives, batch, slot, index, rng),
            ResolvedFilter::Unresolved => {
                match self.strategy.filter_fast(negatives, batch, slot, index, rng) {
                    Ok(()) => {
                        self.resolve_filter(ResolvedFilter::Fast);
                        Ok(())
                    }
                    Err(SamplerError::Unsupported(reason)) => {
                        self.resolve_filter(ResolvedFilter::Standard);
                        debug!(
                            sampling_type = %self.strategy.sampling_type(),
                            reason = %reason,
                            "fast filtering unavailable; using standard filtering from now on"
                        );
                        filter_and_resample(negatives, batch, slot, index, &self.strategy, rng);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }

    fn resolve_filter(&self, resolved: ResolvedFilter) {
        // Only the first resolution sticks; a concurrent one reached the same answer.
        let _ = self.resolved_filter.compare_exchange(
            RESOLVED_UNRESOLVED,
            resolved.to_bits(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    /// Filter implementation in use; `Unresolved` until `fast_if_available` was tried.
    pub fn resolved_filter_implementation(&self) -> ResolvedFilter {
        ResolvedFilter::from_bits(self.resolved_filter.load(Ordering::Relaxed))
    }

    /// Configured filter implementation.
    pub fn filter_implementation(&self) -> FilterImplementation {
        self.filter_implementation
    }

    /// Default number of negatives per triple for `slot`.
    pub fn num_samples(&self, slot: Slot) -> usize {
        self.num_samples[slot]
    }

    /// Whether sampled negatives for `slot` are filtered.
    pub fn filters_positives(&self, slot: Slot) -> bool {
        self.filter_positives[slot]
    }

    /// Whether one negative set is shared by the whole batch.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Number of values negatives for `slot` are drawn from.
    pub fn vocabulary_size(&self, slot: Slot) -> usize {
        self.strategy.vocabulary_size(slot)
    }

    /// Split whose positives are filtered out.
    pub fn filtering_split(&self) -> &str {
        &self.filtering_split
    }

    /// Sampling type of the underlying strategy.
    pub fn sampling_type(&self) -> SamplingType {
        self.strategy.sampling_type()
    }

    /// Underlying sampling strategy.
    pub fn strategy(&self) -> &SamplingStrategy {
        &self.strategy
    }
}

impl fmt::Debug for NegativeSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegativeSampler")
            .field("sampling_type", &self.strategy.sampling_type())
            .field("num_samples", &self.num_samples)
            .field("filter_positives", &self.filter_positives)
            .field("shared", &self.shared)
            .field("filtering_split", &self.filtering_split)
            .field("filter_implementation", &self.filter_implementation)
            .field("resolved_filter", &self.resolved_filter_implementation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilteringConfig, FrequencyConfig, SlotCounts};
    use crate::dataset::InMemoryDataset;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn train_triples() -> Vec<Triple> {
        vec![
            Triple::new(0, 0, 1),
            Triple::new(0, 0, 2),
            Triple::new(1, 1, 2),
            Triple::new(2, 0, 3),
            Triple::new(4, 1, 0),
        ]
    }

    fn dataset() -> InMemoryDataset {
        InMemoryDataset::new(10, 2).with_split("train", train_triples())
    }

    fn filtering_object(implementation: FilterImplementation) -> FilteringConfig {
        FilteringConfig {
            o: true,
            implementation,
            ..FilteringConfig::default()
        }
    }

    #[test]
    fn construction_resolves_counts_and_vocabulary() {
        let config = SamplerConfig {
            num_samples: SlotCounts { s: -1, p: 2, o: 5 },
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
        assert_eq!(sampler.num_samples(Slot::Subject), 5);
        assert_eq!(sampler.num_samples(Slot::Predicate), 2);
        assert_eq!(sampler.num_samples(Slot::Object), 5);
        assert_eq!(sampler.vocabulary_size(Slot::Predicate), 2);
        assert_eq!(sampler.vocabulary_size(Slot::Object), 10);
        assert_eq!(sampler.sampling_type(), SamplingType::Uniform);
        assert!(!sampler.is_shared());
    }

    #[test]
    fn filtering_with_shared_sampling_fails_construction() {
        let config = SamplerConfig {
            shared: true,
            filtering: filtering_object(FilterImplementation::Standard),
            ..SamplerConfig::default()
        };
        assert!(matches!(
            NegativeSampler::new(&config, &dataset()),
            Err(SamplerError::Configuration(_))
        ));
    }

    #[test]
    fn empty_vocabulary_fails_construction() {
        let dataset = InMemoryDataset::new(10, 0).with_split("train", Vec::new());
        assert!(matches!(
            NegativeSampler::new(&SamplerConfig::default(), &dataset),
            Err(SamplerError::Configuration(_))
        ));
    }

    #[test]
    fn missing_filter_index_fails_construction() {
        let config = SamplerConfig {
            filtering: FilteringConfig {
                split: "valid".to_string(),
                ..filtering_object(FilterImplementation::Standard)
            },
            ..SamplerConfig::default()
        };
        let err = NegativeSampler::new(&config, &dataset()).unwrap_err();
        assert!(
            matches!(&err, SamplerError::MissingIndex { name } if name == "valid_sp_to_o"),
            "{err}"
        );
    }

    #[test]
    fn explicit_implementations_start_resolved() {
        for (implementation, expected) in [
            (FilterImplementation::Standard, ResolvedFilter::Standard),
            (FilterImplementation::Fast, ResolvedFilter::Fast),
            (FilterImplementation::FastIfAvailable, ResolvedFilter::Unresolved),
        ] {
            let config = SamplerConfig {
                filtering: filtering_object(implementation),
                ..SamplerConfig::default()
            };
            let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
            assert_eq!(sampler.resolved_filter_implementation(), expected);
            assert_eq!(sampler.filter_implementation(), implementation);
        }
    }

    #[test]
    fn fast_if_available_resolves_to_fast_for_uniform() {
        let config = SamplerConfig {
            filtering: filtering_object(FilterImplementation::FastIfAvailable),
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        sampler
            .sample_with_rng(&train_triples(), Slot::Object, Some(4), &mut rng)
            .unwrap();
        assert_eq!(sampler.resolved_filter_implementation(), ResolvedFilter::Fast);
    }

    #[test]
    fn fast_if_available_falls_back_once_for_frequency() {
        let config = SamplerConfig {
            sampling_type: SamplingType::Frequency,
            frequency: FrequencyConfig { smoothing: 1.0 },
            filtering: filtering_object(FilterImplementation::FastIfAvailable),
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..3 {
            let negatives = sampler
                .sample_with_rng(&train_triples(), Slot::Object, Some(6), &mut rng)
                .unwrap();
            assert_eq!(negatives.shape(), (5, 6));
            assert_eq!(
                sampler.resolved_filter_implementation(),
                ResolvedFilter::Standard
            );
        }
    }

    #[test]
    fn explicit_fast_on_frequency_surfaces_unsupported() {
        let config = SamplerConfig {
            sampling_type: SamplingType::Frequency,
            filtering: filtering_object(FilterImplementation::Fast),
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
        let err = sampler
            .sample(&train_triples(), Slot::Object, Some(3))
            .unwrap_err();
        assert!(matches!(err, SamplerError::Unsupported(_)));
        assert_eq!(sampler.resolved_filter_implementation(), ResolvedFilter::Fast);
    }

    #[test]
    fn unfiltered_slots_skip_the_filter() {
        let config = SamplerConfig {
            filtering: filtering_object(FilterImplementation::FastIfAvailable),
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
        sampler
            .sample(&train_triples(), Slot::Subject, Some(2))
            .unwrap();
        assert_eq!(
            sampler.resolved_filter_implementation(),
            ResolvedFilter::Unresolved
        );
    }

    #[test]
    fn zero_samples_give_zero_columns() {
        let config = SamplerConfig {
            filtering: filtering_object(FilterImplementation::Standard),
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
        let negatives = sampler
            .sample(&train_triples(), Slot::Predicate, None)
            .unwrap();
        assert_eq!(negatives.shape(), (5, 0));
        let negatives = sampler.sample(&train_triples(), Slot::Object, Some(0)).unwrap();
        assert_eq!(negatives.shape(), (5, 0));
    }

    #[test]
    fn shared_rows_are_identical() {
        let config = SamplerConfig {
            shared: true,
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
        let negatives = sampler.sample(&train_triples(), Slot::Subject, Some(7)).unwrap();
        assert_eq!(negatives.shape(), (5, 7));
        let first = negatives.row(0).to_vec();
        assert!(negatives.rows().all(|row| row == first.as_slice()));
    }

    #[test]
    fn debug_output_names_the_strategy() {
        let sampler = NegativeSampler::new(&SamplerConfig::default(), &dataset()).unwrap();
        let rendered = format!("{sampler:?}");
        assert!(rendered.contains("Uniform"), "{rendered}");
    }

    #[test]
    fn oversized_sample_counts_are_shape_errors() {
        let batch = train_triples();
        for shared in [false, true] {
            let config = SamplerConfig {
                shared,
                ..SamplerConfig::default()
            };
            let sampler = NegativeSampler::new(&config, &dataset()).unwrap();
            let mut rng = StdRng::seed_from_u64(3);
            let err = sampler
                .sample_with_rng(&batch, Slot::Object, Some(usize::MAX), &mut rng)
                .unwrap_err();
            assert!(
                matches!(err, SamplerError::InvalidShape { rows: 5, .. }),
                "{err}"
            );
        }
    }
}
