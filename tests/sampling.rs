use std::sync::Arc;
use std::thread;

use rand::SeedableRng;
use rand::rngs::StdRng;

use kge_negatives::{
    FilterImplementation, FilteringConfig, FrequencyConfig, InMemoryDataset, NegativeSampler,
    ResolvedFilter, SamplerConfig, SamplingType, Slot, SlotCounts, Triple,
};

fn toy_dataset() -> InMemoryDataset {
    let train = vec![
        Triple::new(0, 0, 0),
        Triple::new(0, 0, 0),
        Triple::new(0, 1, 0),
        Triple::new(0, 1, 1),
        Triple::new(0, 1, 1),
        Triple::new(0, 0, 1),
        Triple::new(1, 0, 2),
    ];
    InMemoryDataset::new(4, 2).with_split("train", train)
}

fn batch(rows: u32) -> Vec<Triple> {
    (0..rows).map(|i| Triple::new(i % 4, i % 2, (i + 1) % 4)).collect()
}

#[test]
fn output_shape_matches_batch_and_requested_count() {
    let sampler = NegativeSampler::new(&SamplerConfig::default(), &toy_dataset()).unwrap();
    for (rows, n) in [(1, 1), (17, 3), (64, 0), (0, 5)] {
        let negatives = sampler.sample(&batch(rows), Slot::Object, Some(n)).unwrap();
        assert_eq!(negatives.shape(), (rows as usize, n));
    }
    let negatives = sampler.sample(&batch(9), Slot::Subject, None).unwrap();
    assert_eq!(negatives.shape(), (9, 3));
}

#[test]
fn values_stay_inside_slot_vocabulary() {
    for sampling_type in [SamplingType::Uniform, SamplingType::Frequency] {
        let config = SamplerConfig {
            sampling_type,
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &toy_dataset()).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        for slot in Slot::ALL {
            let negatives = sampler
                .sample_with_rng(&batch(50), slot, Some(20), &mut rng)
                .unwrap();
            let vocabulary = if slot == Slot::Predicate { 2 } else { 4 };
            assert!(negatives.as_slice().iter().all(|&v| v < vocabulary));
        }
    }
}

#[test]
fn shared_sampling_broadcasts_one_row() {
    for sampling_type in [SamplingType::Uniform, SamplingType::Frequency] {
        let config = SamplerConfig {
            sampling_type,
            shared: true,
            ..SamplerConfig::default()
        };
        let sampler = NegativeSampler::new(&config, &toy_dataset()).unwrap();
        assert!(sampler.is_shared());
        let mut rng = StdRng::seed_from_u64(4);
        let negatives = sampler
            .sample_with_rng(&batch(32), Slot::Object, Some(16), &mut rng)
            .unwrap();
        assert_eq!(negatives.shape(), (32, 16));
        let first = negatives.row(0);
        for row in negatives.rows() {
            assert_eq!(row, first);
        }
    }
}

#[test]
fn unset_counts_are_derived_at_construction() {
    let config = SamplerConfig {
        num_samples: SlotCounts { s: -1, p: -1, o: 5 },
        ..SamplerConfig::default()
    };
    let sampler = NegativeSampler::new(&config, &toy_dataset()).unwrap();
    assert_eq!(sampler.num_samples(Slot::Subject), 5);
    assert_eq!(sampler.num_samples(Slot::Predicate), 0);
    assert_eq!(sampler.num_samples(Slot::Object), 5);

    let config = SamplerConfig {
        num_samples: SlotCounts { s: -1, p: 0, o: -1 },
        ..SamplerConfig::default()
    };
    let sampler = NegativeSampler::new(&config, &toy_dataset()).unwrap();
    assert_eq!(sampler.num_samples(Slot::Subject), 0);
    assert_eq!(sampler.num_samples(Slot::Object), 0);
    let negatives = sampler.sample(&batch(3), Slot::Subject, None).unwrap();
    assert_eq!(negatives.shape(), (3, 0));
}

#[test]
fn frequency_draws_follow_smoothed_counts() {
    // Object counts in training: [3, 3, 1, 0]; with alpha = 1 -> [4, 4, 2, 1] / 11.
    let config = SamplerConfig {
        sampling_type: SamplingType::Frequency,
        frequency: FrequencyConfig { smoothing: 1.0 },
        ..SamplerConfig::default()
    };
    let sampler = NegativeSampler::new(&config, &toy_dataset()).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    let negatives = sampler
        .sample_with_rng(&batch(200), Slot::Object, Some(500), &mut rng)
        .unwrap();
    let total = negatives.as_slice().len() as f64;
    let mut counts = [0usize; 4];
    for &value in negatives.as_slice() {
        counts[value as usize] += 1;
    }
    let expected = [4.0 / 11.0, 4.0 / 11.0, 2.0 / 11.0, 1.0 / 11.0];
    for (value, want) in expected.iter().enumerate() {
        let got = counts[value] as f64 / total;
        assert!(
            (got - want).abs() < 0.01,
            "value {value}: empirical {got:.4} vs expected {want:.4}"
        );
    }
}

#[test]
fn larger_smoothing_flattens_the_distribution() {
    let config = SamplerConfig {
        sampling_type: SamplingType::Frequency,
        frequency: FrequencyConfig { smoothing: 1000.0 },
        ..SamplerConfig::default()
    };
    let sampler = NegativeSampler::new(&config, &toy_dataset()).unwrap();
    let mut rng = StdRng::seed_from_u64(9);
    let negatives = sampler
        .sample_with_rng(&batch(100), Slot::Object, Some(400), &mut rng)
        .unwrap();
    let unseen = negatives.as_slice().iter().filter(|&&v| v == 3).count() as f64;
    let share = unseen / negatives.as_slice().len() as f64;
    assert!((share - 0.25).abs() < 0.01, "share {share}");
}

#[test]
fn one_sampler_serves_many_threads() {
    let config = SamplerConfig {
        filtering: FilteringConfig {
            o: true,
            implementation: FilterImplementation::FastIfAvailable,
            ..FilteringConfig::default()
        },
        ..SamplerConfig::default()
    };
    let sampler = Arc::new(NegativeSampler::new(&config, &toy_dataset()).unwrap());
    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let sampler = Arc::clone(&sampler);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker);
                let batch = vec![Triple::new(0, 0, 0); 16];
                for _ in 0..10 {
                    let negatives = sampler
                        .sample_with_rng(&batch, Slot::Object, Some(8), &mut rng)
                        .unwrap();
                    // (0, 0) -> {0, 1} in training.
                    assert!(negatives.as_slice().iter().all(|&o| o == 2 || o == 3));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(sampler.resolved_filter_implementation(), ResolvedFilter::Fast);
}
