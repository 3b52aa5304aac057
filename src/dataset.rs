use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::data::{Slot, Triple, parse_index_name};
use crate::errors::SamplerError;
use crate::types::{PairKey, SplitName, ValueId};

/// Known-true values at one slot, keyed by the other two values of a triple.
///
/// Implementations must be safe to read from many sampling threads at once.
pub trait PositiveIndex: Send + Sync {
    /// Values known to complete `key` into a true triple.
    ///
    /// Returns an empty slice for unknown keys. Values are expected to be sorted and
    /// unique, but callers tolerate unsorted slices and duplicates.
    fn positives(&self, key: PairKey) -> &[ValueId];
}

/// Provider of vocabulary sizes, split triples, and positive-pair indices.
pub trait Dataset: Send + Sync {
    /// Size of the entity vocabulary (subject and object slots).
    fn num_entities(&self) -> usize;

    /// Size of the relation vocabulary (predicate slot).
    fn num_relations(&self) -> usize;

    /// Triples of the split named `name`.
    fn split(&self, name: &str) -> Result<&[Triple], SamplerError>;

    /// Positive-pair index by name, e.g. `train_po_to_s`.
    fn index(&self, name: &str) -> Result<Arc<dyn PositiveIndex>, SamplerError>;

    /// Vocabulary size for values at `slot`.
    fn vocabulary_size(&self, slot: Slot) -> usize {
        if slot.is_relation() {
            self.num_relations()
        } else {
            self.num_entities()
        }
    }
}

/// Hash-map backed [`PositiveIndex`]. Value lists are sorted and deduplicated.
#[derive(Clone, Debug, Default)]
pub struct PairIndex {
    entries: HashMap<PairKey, Vec<ValueId>>,
}

impl PairIndex {
    /// Index the `slot` values of `triples` by their pair key.
    pub fn from_triples(triples: &[Triple], slot: Slot) -> Self {
        Self::from_entries(
            triples
                .iter()
                .map(|triple| (triple.pair_key(slot), triple.get(slot))),
        )
    }

    /// Build from `(key, value)` pairs in any order.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PairKey, ValueId)>,
    {
        let mut map: HashMap<PairKey, Vec<ValueId>> = HashMap::new();
        for (key, value) in entries {
            map.entry(key).or_default().push(value);
        }
        for values in map.values_mut() {
            values.sort_unstable();
            values.dedup();
        }
        Self { entries: map }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key has positives.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PositiveIndex for PairIndex {
    fn positives(&self, key: PairKey) -> &[ValueId] {
        self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// In-memory [`Dataset`] holding named splits.
///
/// Positive-pair indices are built from the named split the first time they are
/// requested and cached, so every caller shares one copy.
pub struct InMemoryDataset {
    num_entities: usize,
    num_relations: usize,
    splits: HashMap<SplitName, Vec<Triple>>,
    indexes: RwLock<HashMap<String, Arc<PairIndex>>>,
}

impl InMemoryDataset {
    /// Dataset with the given vocabulary sizes and no splits.
    pub fn new(num_entities: usize, num_relations: usize) -> Self {
        Self {
            num_entities,
            num_relations,
            splits: HashMap::new(),
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Add (or replace) a split. Builder style.
    pub fn with_split(mut self, name: impl Into<SplitName>, triples: Vec<Triple>) -> Self {
        self.insert_split(name, triples);
        self
    }

    /// Add (or replace) a split; drops cached indices built from an older version.
    pub fn insert_split(&mut self, name: impl Into<SplitName>, triples: Vec<Triple>) {
        let name = name.into();
        if let Ok(indexes) = self.indexes.get_mut() {
            indexes.retain(|index_name, _| {
                parse_index_name(index_name).is_none_or(|(split, _)| split != name)
            });
        }
        self.splits.insert(name, triples);
    }

    /// Names of indices built so far.
    pub fn cached_index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .indexes
            .read()
            .map(|indexes| indexes.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn build_index(&self, name: &str) -> Result<Arc<PairIndex>, SamplerError> {
        let (split, slot) = parse_index_name(name).ok_or_else(|| SamplerError::MissingIndex {
            name: name.to_string(),
        })?;
        let triples = self.split(split).map_err(|_| SamplerError::MissingIndex {
            name: name.to_string(),
        })?;
        let index = PairIndex::from_triples(triples, slot);
        debug!(
            index = name,
            keys = index.len(),
            triples = triples.len(),
            "built positive-pair index"
        );
        Ok(Arc::new(index))
    }
}

impl fmt::Debug for InMemoryDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut splits: Vec<(&str, usize)> = self
            .splits
            .iter()
            .map(|(name, triples)| (name.as_str(), triples.len()))
            .collect();
        splits.sort();
        f.debug_struct("InMemoryDataset")
            .field("num_entities", &self.num_entities)
            .field("num_relations", &self.num_relations)
            .field("splits", &splits)
            .finish()
    }
}

impl Dataset for InMemoryDataset {
    fn num_entities(&self) -> usize {
        self.num_entities
    }

    fn num_relations(&self) -> usize {
        self.num_relations
    }

    fn split(&self, name: &str) -> Result<&[Triple], SamplerError> {
        self.splits
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SamplerError::MissingSplit {
                split: name.to_string(),
            })
    }

    fn index(&self, name: &str) -> Result<Arc<dyn PositiveIndex>, SamplerError> {
        if let Some(index) = self
            .indexes
            .read()
            .ok()
            .and_then(|indexes| indexes.get(name).cloned())
        {
            return Ok(index);
        }
        let built = self.build_index(name)?;
        let index = match self.indexes.write() {
            Ok(mut indexes) => Arc::clone(indexes.entry(name.to_string()).or_insert(built)),
            Err(_) => built,
        };
        Ok(index)
    }
}
