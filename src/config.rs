use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::constants::config::{
    DEFAULT_FREQUENCY_SMOOTHING, DEFAULT_NUM_SAMPLES_O, DEFAULT_NUM_SAMPLES_P,
    DEFAULT_NUM_SAMPLES_S, DEFAULT_TRAIN_SPLIT, FILTER_IMPLEMENTATION_KEY,
    FREQUENCY_SMOOTHING_KEY, SAMPLING_TYPE_KEY, SHARED_KEY,
};
use crate::data::{PerSlot, Slot};
use crate::errors::SamplerError;
use crate::types::SplitName;

/// Strategy used to draw raw negatives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SamplingType {
    /// Every value of the slot vocabulary is equally likely.
    #[default]
    Uniform,
    /// Values are drawn proportionally to their smoothed training-split frequency.
    Frequency,
}

impl SamplingType {
    /// Configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            SamplingType::Uniform => "uniform",
            SamplingType::Frequency => "frequency",
        }
    }
}

impl FromStr for SamplingType {
    type Err = SamplerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "uniform" => Ok(SamplingType::Uniform),
            "frequency" => Ok(SamplingType::Frequency),
            other => Err(invalid_value(SAMPLING_TYPE_KEY, other)),
        }
    }
}

impl TryFrom<String> for SamplingType {
    type Error = SamplerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SamplingType> for &'static str {
    fn from(value: SamplingType) -> Self {
        value.as_str()
    }
}

impl fmt::Display for SamplingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which filter-and-resample implementation to run when filtering is enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum FilterImplementation {
    /// Strategy-agnostic per-row loop.
    Standard,
    /// Strategy-specific batch path; fails when the strategy has none.
    Fast,
    /// Try `Fast` once and fall back to `Standard` for good if unsupported.
    #[default]
    FastIfAvailable,
}

impl FilterImplementation {
    /// Configuration name.
    pub const fn as_str(self) -> &'static str {
        match self {
            FilterImplementation::Standard => "standard",
            FilterImplementation::Fast => "fast",
            FilterImplementation::FastIfAvailable => "fast_if_available",
        }
    }
}

impl FromStr for FilterImplementation {
    type Err = SamplerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "standard" => Ok(FilterImplementation::Standard),
            "fast" => Ok(FilterImplementation::Fast),
            "fast_if_available" => Ok(FilterImplementation::FastIfAvailable),
            other => Err(invalid_value(FILTER_IMPLEMENTATION_KEY, other)),
        }
    }
}

impl TryFrom<String> for FilterImplementation {
    type Error = SamplerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterImplementation> for &'static str {
    fn from(value: FilterImplementation) -> Self {
        value.as_str()
    }
}

impl fmt::Display for FilterImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn invalid_value(key: &str, value: &str) -> SamplerError {
    SamplerError::Configuration(format!("invalid value '{value}' for '{key}'"))
}

/// Per-slot negative counts. Negative values mean "derive automatically".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotCounts {
    /// Negatives per triple for the subject slot.
    pub s: i64,
    /// Negatives per triple for the predicate slot.
    pub p: i64,
    /// Negatives per triple for the object slot.
    pub o: i64,
}

impl Default for SlotCounts {
    fn default() -> Self {
        Self {
            s: DEFAULT_NUM_SAMPLES_S,
            p: DEFAULT_NUM_SAMPLES_P,
            o: DEFAULT_NUM_SAMPLES_O,
        }
    }
}

impl SlotCounts {
    /// Raw count for `slot`; `-1` means unset.
    pub fn get(&self, slot: Slot) -> i64 {
        match slot {
            Slot::Subject => self.s,
            Slot::Predicate => self.p,
            Slot::Object => self.o,
        }
    }

    /// Resolve unset counts.
    ///
    /// Subject copies a positive object count and object copies a positive subject
    /// count (after the subject has been resolved); anything still unset becomes 0.
    /// The predicate slot never copies.
    pub fn resolve(&self) -> PerSlot<usize> {
        let mut counts = PerSlot([self.s, self.p, self.o]);
        for (slot, copy_from) in [
            (Slot::Subject, Some(Slot::Object)),
            (Slot::Predicate, None),
            (Slot::Object, Some(Slot::Subject)),
        ] {
            if counts[slot] < 0 {
                counts[slot] = match copy_from {
                    Some(other) if counts[other] > 0 => counts[other],
                    _ => 0,
                };
            }
        }
        PerSlot::from_fn(|slot| counts[slot] as usize)
    }
}

/// Filtering options: which slots to filter, against which split, and how.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringConfig {
    /// Filter known positives out of subject negatives.
    pub s: bool,
    /// Filter known positives out of predicate negatives.
    pub p: bool,
    /// Filter known positives out of object negatives.
    pub o: bool,
    /// Split whose positive-pair indices are used; empty means the training split.
    pub split: SplitName,
    /// Implementation used to filter and resample.
    pub implementation: FilterImplementation,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            s: false,
            p: false,
            o: false,
            split: SplitName::new(),
            implementation: FilterImplementation::default(),
        }
    }
}

impl FilteringConfig {
    /// Whether positives are filtered for `slot`.
    pub fn get(&self, slot: Slot) -> bool {
        match slot {
            Slot::Subject => self.s,
            Slot::Predicate => self.p,
            Slot::Object => self.o,
        }
    }

    /// Whether any slot is filtered.
    pub fn any(&self) -> bool {
        self.s || self.p || self.o
    }
}

/// Options specific to frequency-based sampling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    /// Additive constant applied to every count before normalizing (must be > 0).
    pub smoothing: f64,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            smoothing: DEFAULT_FREQUENCY_SMOOTHING,
        }
    }
}

/// Top-level negative sampler configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Strategy used to draw raw negatives.
    pub sampling_type: SamplingType,
    /// Draw one negative set per call and reuse it for every triple of the batch.
    pub shared: bool,
    /// Default negatives per triple and slot.
    pub num_samples: SlotCounts,
    /// Filtering of known positives.
    pub filtering: FilteringConfig,
    /// Frequency sampling options (ignored by uniform sampling).
    pub frequency: FrequencyConfig,
    /// Split used for frequency counts and as the default filtering split.
    pub train_split: SplitName,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sampling_type: SamplingType::default(),
            shared: false,
            num_samples: SlotCounts::default(),
            filtering: FilteringConfig::default(),
            frequency: FrequencyConfig::default(),
            train_split: DEFAULT_TRAIN_SPLIT.to_string(),
        }
    }
}

impl SamplerConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SamplerError> {
        serde_json::from_str(json).map_err(|err| SamplerError::Configuration(err.to_string()))
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SamplerError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Split whose positive-pair indices are used for filtering.
    pub fn filtering_split(&self) -> &str {
        if self.filtering.split.is_empty() {
            &self.train_split
        } else {
            &self.filtering.split
        }
    }

    /// Check option combinations that cannot be expressed by the types alone.
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.shared && self.filtering.any() {
            return Err(SamplerError::Configuration(format!(
                "filtering is not supported when '{SHARED_KEY}' is enabled"
            )));
        }
        if self.sampling_type == SamplingType::Frequency {
            let alpha = self.frequency.smoothing;
            if !alpha.is_finite() || alpha <= 0.0 {
                return Err(SamplerError::Configuration(format!(
                    "'{FREQUENCY_SMOOTHING_KEY}' must be a positive number, got {alpha}"
                )));
            }
        }
        if self.train_split.is_empty() {
            return Err(SamplerError::Configuration(
                "training split name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
