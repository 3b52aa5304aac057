use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::constants::slots::{INDEX_NAME_TO, PAIR_STRS, SLOT_CHARS};
use crate::errors::SamplerError;

pub use crate::types::{IndexName, PairKey, ValueId};

/// Position within a `(subject, predicate, object)` triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Subject entity.
    Subject,
    /// Predicate relation.
    Predicate,
    /// Object entity.
    Object,
}

impl Slot {
    /// All slots in triple order.
    pub const ALL: [Slot; 3] = [Slot::Subject, Slot::Predicate, Slot::Object];

    /// Column of this slot within a triple.
    pub const fn index(self) -> usize {
        match self {
            Slot::Subject => 0,
            Slot::Predicate => 1,
            Slot::Object => 2,
        }
    }

    /// Short name (`s`, `p`, or `o`).
    pub const fn as_char(self) -> char {
        SLOT_CHARS[self.index()]
    }

    /// Name of the key pair used to look up positives for this slot (`po`, `so`, `sp`).
    pub const fn pair_str(self) -> &'static str {
        PAIR_STRS[self.index()]
    }

    /// The two other slots, in triple order.
    pub const fn key_slots(self) -> (Slot, Slot) {
        match self {
            Slot::Subject => (Slot::Predicate, Slot::Object),
            Slot::Predicate => (Slot::Subject, Slot::Object),
            Slot::Object => (Slot::Subject, Slot::Predicate),
        }
    }

    /// Whether values in this slot come from the relation vocabulary.
    pub const fn is_relation(self) -> bool {
        matches!(self, Slot::Predicate)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Slot {
    type Err = SamplerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "s" => Ok(Slot::Subject),
            "p" => Ok(Slot::Predicate),
            "o" => Ok(Slot::Object),
            other => Err(SamplerError::Configuration(format!(
                "unknown slot '{other}' (expected one of s, p, o)"
            ))),
        }
    }
}

/// Name of the positive-pair index for `slot` over `split`, e.g. `train_po_to_s`.
pub fn index_name(split: &str, slot: Slot) -> IndexName {
    format!("{split}_{}{INDEX_NAME_TO}{}", slot.pair_str(), slot.as_char())
}

/// Inverse of [`index_name`]: returns the split and target slot.
pub fn parse_index_name(name: &str) -> Option<(&str, Slot)> {
    let (head, slot_str) = name.rsplit_once(INDEX_NAME_TO)?;
    let slot = slot_str.parse::<Slot>().ok()?;
    let (split, pair) = head.rsplit_once('_')?;
    if split.is_empty() || pair != slot.pair_str() {
        return None;
    }
    Some((split, slot))
}

/// A knowledge-graph fact as vocabulary indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject entity index.
    pub s: ValueId,
    /// Predicate relation index.
    pub p: ValueId,
    /// Object entity index.
    pub o: ValueId,
}

impl Triple {
    /// Triple from subject, predicate and object indices.
    pub const fn new(s: ValueId, p: ValueId, o: ValueId) -> Self {
        Self { s, p, o }
    }

    /// Value stored at `slot`.
    pub const fn get(&self, slot: Slot) -> ValueId {
        match slot {
            Slot::Subject => self.s,
            Slot::Predicate => self.p,
            Slot::Object => self.o,
        }
    }

    /// Lookup key for the positives of `slot` (the other two values, in triple order).
    pub const fn pair_key(&self, slot: Slot) -> PairKey {
        let (first, second) = slot.key_slots();
        (self.get(first), self.get(second))
    }
}

impl From<[ValueId; 3]> for Triple {
    fn from([s, p, o]: [ValueId; 3]) -> Self {
        Self { s, p, o }
    }
}

/// One value per slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSlot<T>(pub [T; 3]);

impl<T> PerSlot<T> {
    /// Build a table by evaluating `f` for each slot in triple order.
    pub fn from_fn(mut f: impl FnMut(Slot) -> T) -> Self {
        Self([f(Slot::Subject), f(Slot::Predicate), f(Slot::Object)])
    }

    /// Try to build a table, stopping at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(Slot) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self([f(Slot::Subject)?, f(Slot::Predicate)?, f(Slot::Object)?]))
    }

    /// Iterate `(slot, value)` pairs in triple order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &T)> {
        Slot::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Slot> for PerSlot<T> {
    type Output = T;

    fn index(&self, slot: Slot) -> &T {
        &self.0[slot.index()]
    }
}

impl<T> IndexMut<Slot> for PerSlot<T> {
    fn index_mut(&mut self, slot: Slot) -> &mut T {
        &mut self.0[slot.index()]
    }
}

/// Row-major `rows x cols` matrix of sampled negatives.
///
/// Row `i` holds the candidates for triple `i` of the batch at the target slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeMatrix {
    rows: usize,
    cols: usize,
    data: Vec<ValueId>,
}

impl NegativeMatrix {
    /// Wrap row-major `data`; fails when `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<ValueId>) -> Result<Self, SamplerError> {
        if Self::checked_len(rows, cols)? != data.len() {
            return Err(SamplerError::InvalidShape {
                rows,
                cols,
                details: format!("buffer holds {} values", data.len()),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// `rows * cols`, or [`SamplerError::InvalidShape`] when it overflows.
    pub(crate) fn checked_len(rows: usize, cols: usize) -> Result<usize, SamplerError> {
        rows.checked_mul(cols).ok_or_else(|| SamplerError::InvalidShape {
            rows,
            cols,
            details: "value count overflows usize".to_string(),
        })
    }

    /// Matrix with `rows` rows and no columns.
    pub fn empty(rows: usize) -> Self {
        Self {
            rows,
            cols: 0,
            data: Vec::new(),
        }
    }

    /// Repeat `row` for every one of `rows` rows.
    pub fn broadcast(row: &[ValueId], rows: usize) -> Self {
        let mut data = Vec::with_capacity(row.len() * rows);
        for _ in 0..rows {
            data.extend_from_slice(row);
        }
        Self {
            rows,
            cols: row.len(),
            data,
        }
    }

    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<ValueId>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self { rows, cols, data }
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of rows (batch size).
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (negatives per row).
    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// Whether the matrix holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Candidates for triple `i`.
    ///
    /// Panics when `i >= num_rows()`.
    pub fn row(&self, i: usize) -> &[ValueId] {
        assert!(i < self.rows, "row {i} out of bounds for {} rows", self.rows);
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Mutable candidates for triple `i`.
    ///
    /// Panics when `i >= num_rows()`.
    pub fn row_mut(&mut self, i: usize) -> &mut [ValueId] {
        assert!(i < self.rows, "row {i} out of bounds for {} rows", self.rows);
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Iterate rows in batch order (yields empty slices when there are no columns).
    pub fn rows(&self) -> impl Iterator<Item = &[ValueId]> {
        (0..self.rows).map(move |i| &self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Row-major backing storage.
    pub fn as_slice(&self) -> &[ValueId] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [ValueId] {
        &mut self.data
    }

    /// Row-major values, consuming the matrix.
    pub fn into_vec(self) -> Vec<ValueId> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_keys_follow_slot_order() {
        let triple = Triple::new(1, 2, 3);
        assert_eq!(triple.pair_key(Slot::Subject), (2, 3));
        assert_eq!(triple.pair_key(Slot::Predicate), (1, 3));
        assert_eq!(triple.pair_key(Slot::Object), (1, 2));
        assert_eq!(triple.get(Slot::Predicate), 2);
    }

    #[test]
    fn index_names_round_trip_through_parser() {
        assert_eq!(index_name("train", Slot::Subject), "train_po_to_s");
        assert_eq!(index_name("train", Slot::Predicate), "train_so_to_p");
        assert_eq!(index_name("valid", Slot::Object), "valid_sp_to_o");
        assert_eq!(
            parse_index_name("my_train_sp_to_o"),
            Some(("my_train", Slot::Object))
        );
        assert_eq!(parse_index_name("train_sp_to_s"), None);
        assert_eq!(parse_index_name("train_po_to_x"), None);
        assert_eq!(parse_index_name("_po_to_s"), None);
        assert_eq!(parse_index_name("po_to_s"), None);
    }

    #[test]
    fn slot_parsing_rejects_unknown_names() {
        assert_eq!("p".parse::<Slot>().unwrap(), Slot::Predicate);
        assert!(matches!(
            "x".parse::<Slot>(),
            Err(SamplerError::Configuration(_))
        ));
        assert_eq!(Slot::Object.to_string(), "o");
    }

    #[test]
    fn matrix_rows_and_broadcast() {
        let matrix = NegativeMatrix::broadcast(&[4, 5, 6], 2);
        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(matrix.row(0), matrix.row(1));
        assert_eq!(matrix.rows().count(), 2);

        let empty = NegativeMatrix::empty(3);
        assert_eq!(empty.shape(), (3, 0));
        assert!(empty.rows().all(|row| row.is_empty()));
        assert!(empty.is_empty());
    }

    #[test]
    fn matrix_from_vec_checks_shape() {
        assert!(NegativeMatrix::from_vec(2, 2, vec![1, 2, 3, 4]).is_ok());
        assert!(matches!(
            NegativeMatrix::from_vec(2, 3, vec![1, 2, 3, 4]),
            Err(SamplerError::InvalidShape { rows: 2, cols: 3, .. })
        ));
        assert!(matches!(
            NegativeMatrix::from_vec(usize::MAX, 2, Vec::new()),
            Err(SamplerError::InvalidShape { .. })
        ));
    }

    #[test]
    fn per_slot_indexes_by_slot() {
        let mut table = PerSlot::from_fn(|slot| slot.index() * 10);
        assert_eq!(table[Slot::Object], 20);
        table[Slot::Subject] = 7;
        let collected: Vec<_> = table.iter().map(|(slot, v)| (slot, *v)).collect();
        assert_eq!(
            collected,
            vec![(Slot::Subject, 7), (Slot::Predicate, 10), (Slot::Object, 20)]
        );
    }
}
