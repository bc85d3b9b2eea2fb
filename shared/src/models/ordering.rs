//! Child ordering primitives
//!
//! Questions are positioned within a quiz and answers within a question by an
//! explicit `order_id`. Positions only need to be unique per parent and totally
//! ordered; gaps are allowed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// One position reassignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i32,
}

/// A batch of position reassignments scoped to one parent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChangeSet {
    pub items: Vec<OrderItem>,
}

/// Ways a change set can be malformed or collide with its siblings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeSetError {
    #[error("change set is empty")]
    Empty,

    #[error("positions must be positive (ids: {0:?})")]
    NonPositive(Vec<i64>),

    #[error("ids appear more than once: {0:?}")]
    DuplicateChild(Vec<i64>),

    #[error("positions assigned more than once: {0:?}")]
    DuplicatePosition(Vec<i32>),
}

impl OrderChangeSet {
    pub fn new(items: impl IntoIterator<Item = (i64, i32)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(id, order_id)| OrderItem { id, order_id })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Referenced child ids, in submission order
    pub fn ids(&self) -> Vec<i64> {
        self.items.iter().map(|i| i.id).collect()
    }

    /// Shape checks that need no knowledge of the store.
    ///
    /// Every violation of the failing kind is reported, not just the first.
    pub fn check(&self) -> Result<(), ChangeSetError> {
        if self.items.is_empty() {
            return Err(ChangeSetError::Empty);
        }

        let non_positive: Vec<i64> = self
            .items
            .iter()
            .filter(|i| i.order_id <= 0)
            .map(|i| i.id)
            .collect();
        if !non_positive.is_empty() {
            return Err(ChangeSetError::NonPositive(non_positive));
        }

        let dup_ids = duplicates(self.items.iter().map(|i| i.id));
        if !dup_ids.is_empty() {
            return Err(ChangeSetError::DuplicateChild(dup_ids));
        }

        let dup_positions = duplicates(self.items.iter().map(|i| i.order_id));
        if !dup_positions.is_empty() {
            return Err(ChangeSetError::DuplicatePosition(dup_positions));
        }

        Ok(())
    }

    /// Ids in this set that are absent from `existing`, sorted
    pub fn missing_from(&self, existing: &[i64]) -> Vec<i64> {
        let existing: BTreeSet<i64> = existing.iter().copied().collect();
        let missing: BTreeSet<i64> = self
            .items
            .iter()
            .map(|i| i.id)
            .filter(|id| !existing.contains(id))
            .collect();
        missing.into_iter().collect()
    }

    /// Compute the sibling positions after applying this set.
    ///
    /// `siblings` is the full `(id, order_id)` list of the parent. Items whose
    /// id is not a sibling are ignored. Returns the new list sorted by
    /// position, or the colliding positions if two siblings would share one.
    pub fn apply_to(&self, siblings: &[(i64, i32)]) -> Result<Vec<(i64, i32)>, ChangeSetError> {
        let updates: HashMap<i64, i32> = self.items.iter().map(|i| (i.id, i.order_id)).collect();

        let mut result: Vec<(i64, i32)> = siblings
            .iter()
            .map(|&(id, pos)| (id, updates.get(&id).copied().unwrap_or(pos)))
            .collect();

        let collisions = duplicates(result.iter().map(|&(_, pos)| pos));
        if !collisions.is_empty() {
            return Err(ChangeSetError::DuplicatePosition(collisions));
        }

        result.sort_by_key(|&(id, pos)| (pos, id));
        Ok(result)
    }
}

/// Values that occur more than once, sorted and deduplicated
fn duplicates<T: Ord + Copy>(values: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = BTreeSet::new();
    let mut dups = BTreeSet::new();
    for v in values {
        if !seen.insert(v) {
            dups.insert(v);
        }
    }
    dups.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_empty() {
        assert_eq!(OrderChangeSet::default().check(), Err(ChangeSetError::Empty));
    }

    #[test]
    fn test_check_reports_all_non_positive() {
        let set = OrderChangeSet::new([(1, 0), (2, 3), (3, -1)]);
        assert_eq!(set.check(), Err(ChangeSetError::NonPositive(vec![1, 3])));
    }

    #[test]
    fn test_check_duplicate_child() {
        let set = OrderChangeSet::new([(1, 1), (2, 2), (1, 3)]);
        assert_eq!(set.check(), Err(ChangeSetError::DuplicateChild(vec![1])));
    }

    #[test]
    fn test_check_duplicate_position() {
        let set = OrderChangeSet::new([(1, 2), (2, 2)]);
        assert_eq!(set.check(), Err(ChangeSetError::DuplicatePosition(vec![2])));
    }

    #[test]
    fn test_apply_moves_and_keeps_untouched_sibling() {
        // A@1, B@2, C@3 with {A→3, C→1}
        let siblings = [(10, 1), (20, 2), (30, 3)];
        let set = OrderChangeSet::new([(10, 3), (30, 1)]);

        let result = set.apply_to(&siblings).unwrap();
        assert_eq!(result, vec![(30, 1), (20, 2), (10, 3)]);
    }

    #[test]
    fn test_apply_collision_with_unchanged_sibling() {
        let siblings = [(10, 1), (20, 2), (30, 3)];
        let set = OrderChangeSet::new([(10, 2)]);

        assert_eq!(
            set.apply_to(&siblings),
            Err(ChangeSetError::DuplicatePosition(vec![2]))
        );
    }

    #[test]
    fn test_apply_ignores_foreign_ids() {
        let siblings = [(10, 1), (20, 2)];
        let set = OrderChangeSet::new([(99, 5), (20, 7)]);

        assert_eq!(set.apply_to(&siblings).unwrap(), vec![(10, 1), (20, 7)]);
    }

    #[test]
    fn test_missing_from() {
        let set = OrderChangeSet::new([(5, 1), (3, 2), (9, 3)]);
        assert_eq!(set.missing_from(&[3, 4]), vec![5, 9]);
        assert!(set.missing_from(&[3, 5, 9]).is_empty());
    }
}
