#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Alias-method tables for weighted draws.
pub mod alias;
/// Sampler configuration types.
pub mod config;
/// Centralized constants for configuration keys, slot names, and defaults.
pub mod constants;
/// Slots, triples, and negative matrices.
pub mod data;
/// Dataset and positive-pair index traits plus an in-memory implementation.
pub mod dataset;
/// Filter-and-resample engine.
pub mod filter;
mod rng;
/// Sampler orchestrator and public sampling API.
pub mod sampler;
/// Uniform and frequency sampling strategies.
pub mod strategy;
/// Shared type aliases.
pub mod types;

mod errors;

pub use alias::AliasTable;
pub use config::{
    FilterImplementation, FilteringConfig, FrequencyConfig, SamplerConfig, SamplingType,
    SlotCounts,
};
pub use data::{NegativeMatrix, PerSlot, Slot, Triple, index_name, parse_index_name};
pub use dataset::{Dataset, InMemoryDataset, PairIndex, PositiveIndex};
pub use errors::SamplerError;
pub use filter::{PositiveSet, where_in, where_not_in};
pub use sampler::{NegativeSampler, ResolvedFilter};
pub use strategy::SamplingStrategy;
pub use types::{IndexName, PairKey, SplitName, ValueId};
