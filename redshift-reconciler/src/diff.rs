//! Field and set differences between two desired configurations.

use std::collections::BTreeSet;

/// Symmetric difference of two sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T: Ord> {
    pub to_add: BTreeSet<T>,
    pub to_remove: BTreeSet<T>,
}

impl<T: Ord + Clone> SetDiff<T> {
    pub fn between<'a>(
        old: impl IntoIterator<Item = &'a T>,
        new: impl IntoIterator<Item = &'a T>,
    ) -> Self
    where
        T: 'a,
    {
        let old: BTreeSet<T> = old.into_iter().cloned().collect();
        let new: BTreeSet<T> = new.into_iter().cloned().collect();
        Self {
            to_add: new.difference(&old).cloned().collect(),
            to_remove: old.difference(&new).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Apply the difference to `current`.
    pub fn apply(&self, current: &BTreeSet<T>) -> BTreeSet<T> {
        current
            .difference(&self.to_remove)
            .chain(self.to_add.iter())
            .cloned()
            .collect()
    }
}

/// `Some(new)` when the value changed.
pub fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}

/// Like [`changed`] for optional fields. Unsetting a field yields `None`:
/// the service keeps its current value when a field is omitted.
pub fn changed_opt<T: PartialEq + Clone>(old: &Option<T>, new: &Option<T>) -> Option<T> {
    changed(old, new).flatten()
}

/// Whether two lists hold the same elements, ignoring order and repeats.
pub fn same_set<T: Ord>(a: &[T], b: &[T]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}
