/// Constants used by configuration keys and defaults.
pub mod config {
    /// Dotted key of the sampling strategy selector (reported in configuration errors).
    pub const SAMPLING_TYPE_KEY: &str = "negative_sampling.sampling_type";
    /// Dotted key of the filtering implementation selector.
    pub const FILTER_IMPLEMENTATION_KEY: &str = "negative_sampling.filtering.implementation";
    /// Dotted key of the frequency smoothing constant.
    pub const FREQUENCY_SMOOTHING_KEY: &str = "negative_sampling.frequency.smoothing";
    /// Dotted key of the shared-sampling flag.
    pub const SHARED_KEY: &str = "negative_sampling.shared";
    /// Marker for a per-slot sample count that should be derived automatically.
    pub const AUTO_NUM_SAMPLES: i64 = -1;
    /// Default subject-slot sample count.
    pub const DEFAULT_NUM_SAMPLES_S: i64 = 3;
    /// Default predicate-slot sample count.
    pub const DEFAULT_NUM_SAMPLES_P: i64 = 0;
    /// Default object-slot sample count (copied from the subject slot).
    pub const DEFAULT_NUM_SAMPLES_O: i64 = AUTO_NUM_SAMPLES;
    /// Default additive smoothing for frequency-based sampling.
    pub const DEFAULT_FREQUENCY_SMOOTHING: f64 = 1.0;
    /// Default training split name.
    pub const DEFAULT_TRAIN_SPLIT: &str = "train";
}

/// Constants used by slot naming and positive-pair index names.
pub mod slots {
    /// Single-character slot names in triple order.
    pub const SLOT_CHARS: [char; 3] = ['s', 'p', 'o'];
    /// Names of the key pair used to look up positives for each target slot.
    pub const PAIR_STRS: [&str; 3] = ["po", "so", "sp"];
    /// Separator between the pair name and target slot in an index name.
    pub const INDEX_NAME_TO: &str = "_to_";
}

/// Constants used by the alias table builder.
pub mod alias {
    /// Tolerance applied when classifying scaled probabilities as under-full.
    pub const UNDERFULL_EPSILON: f64 = 1e-12;
}
