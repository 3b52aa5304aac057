use std::error::Error;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kge_negatives::{
    Dataset, FilterImplementation, FilteringConfig, InMemoryDataset, NegativeSampler,
    PositiveIndex, SamplerConfig, SamplingType, Slot, SlotCounts, Triple, index_name,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SamplingArg {
    Uniform,
    Frequency,
}

impl From<SamplingArg> for SamplingType {
    fn from(value: SamplingArg) -> Self {
        match value {
            SamplingArg::Uniform => SamplingType::Uniform,
            SamplingArg::Frequency => SamplingType::Frequency,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    Standard,
    Fast,
    FastIfAvailable,
}

impl From<FilterArg> for FilterImplementation {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::Standard => FilterImplementation::Standard,
            FilterArg::Fast => FilterImplementation::Fast,
            FilterArg::FastIfAvailable => FilterImplementation::FastIfAvailable,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "negative_sampling_demo",
    disable_help_subcommand = true,
    about = "Sample negatives for a synthetic knowledge graph",
    long_about = "Build a random knowledge graph in memory, sample negatives for each slot, and report shapes, timings, and remaining collisions."
)]
struct DemoCli {
    #[arg(long, default_value_t = 100_000, help = "Number of entities")]
    entities: usize,
    #[arg(long, default_value_t = 200, help = "Number of relations")]
    relations: usize,
    #[arg(long, default_value_t = 500_000, help = "Number of training triples")]
    triples: usize,
    #[arg(long = "batch-size", default_value_t = 4096, help = "Triples per batch")]
    batch_size: usize,
    #[arg(long = "num-samples", default_value_t = 64, help = "Negatives per triple and entity slot")]
    num_samples: i64,
    #[arg(long = "sampling-type", value_enum, default_value_t = SamplingArg::Uniform)]
    sampling_type: SamplingArg,
    #[arg(long, help = "Filter known positives for every slot")]
    filter: bool,
    #[arg(long = "filter-implementation", value_enum, default_value_t = FilterArg::FastIfAvailable)]
    filter_implementation: FilterArg,
    #[arg(long, help = "Share one negative set per batch (ignored with --filter)")]
    shared: bool,
    #[arg(long, default_value_t = 7, help = "Seed for graph generation and sampling")]
    seed: u64,
}

fn synthetic_triples(cli: &DemoCli, rng: &mut StdRng) -> Vec<Triple> {
    (0..cli.triples)
        .map(|_| {
            // Squaring skews entity popularity so frequency sampling differs from uniform.
            let skewed = |rng: &mut StdRng| {
                let u: f64 = rng.random();
                ((u * u) * cli.entities as f64) as u32
            };
            let s = skewed(rng);
            let p = rng.random_range(0..cli.relations as u32);
            let o = skewed(rng);
            Triple::new(s, p, o)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let cli = DemoCli::parse();
    let mut rng = StdRng::seed_from_u64(cli.seed);

    let train = synthetic_triples(&cli, &mut rng);
    let dataset = InMemoryDataset::new(cli.entities, cli.relations).with_split("train", train);

    let config = SamplerConfig {
        sampling_type: cli.sampling_type.into(),
        shared: cli.shared && !cli.filter,
        num_samples: SlotCounts {
            s: cli.num_samples,
            p: (cli.num_samples / 8).max(1),
            o: -1,
        },
        filtering: FilteringConfig {
            s: cli.filter,
            p: cli.filter,
            o: cli.filter,
            implementation: cli.filter_implementation.into(),
            ..FilteringConfig::default()
        },
        ..SamplerConfig::default()
    };

    let started = Instant::now();
    let sampler = NegativeSampler::new(&config, &dataset)?;
    println!("sampler ready in {:.2?}: {sampler:?}", started.elapsed());

    let train = dataset.split("train")?;
    let batch = &train[..cli.batch_size.min(train.len())];
    for slot in Slot::ALL {
        let started = Instant::now();
        let negatives = sampler.sample_with_rng(batch, slot, None, &mut rng)?;
        let elapsed = started.elapsed();

        let index = dataset.index(&index_name(config.filtering_split(), slot))?;
        let collisions = count_collisions(batch, slot, negatives.rows(), index.as_ref());
        let (rows, cols) = negatives.shape();
        println!(
            "slot {slot}: {rows}x{cols} negatives in {elapsed:.2?}, {collisions} collisions with known positives"
        );
    }
    println!(
        "filter implementation in use: {:?}",
        sampler.resolved_filter_implementation()
    );
    Ok(())
}

fn count_collisions<'a>(
    batch: &[Triple],
    slot: Slot,
    rows: impl Iterator<Item = &'a [u32]>,
    index: &dyn PositiveIndex,
) -> usize {
    batch
        .iter()
        .zip(rows)
        .map(|(triple, row)| {
            let positives = index.positives(triple.pair_key(slot));
            row.iter().filter(|value| positives.contains(value)).count()
        })
        .sum()
}
