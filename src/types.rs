/// Vocabulary index of an entity or relation.
/// Examples: `0`, `14_951`
pub type ValueId = u32;
/// The two triple values that are not in the target slot, in triple order.
/// Example: `(predicate, object)` when corrupting the subject slot.
pub type PairKey = (ValueId, ValueId);
/// Name of a dataset split.
/// Examples: `train`, `valid`, `test`
pub type SplitName = String;
/// Name of a positive-pair index as requested from a dataset.
/// Examples: `train_po_to_s`, `valid_sp_to_o`
pub type IndexName = String;
