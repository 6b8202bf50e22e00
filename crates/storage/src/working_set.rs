#![forbid(unsafe_code)]

use std::collections::HashSet;
use uuid::Uuid;

/// Sparse index -> uuid mapping for pending tasks. Index 0 is never used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkingSet {
    slots: Vec<Option<Uuid>>,
}

impl Default for WorkingSet {
    fn default() -> Self {
        Self { slots: vec![None] }
    }
}

impl WorkingSet {
    /// Builds a working set from `(index, uuid)` pairs. Index 0 is ignored.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, Option<Uuid>)>,
    {
        let mut working_set = Self::default();
        for (index, uuid) in entries {
            if index == 0 {
                continue;
            }
            if working_set.slots.len() <= index {
                working_set.slots.resize(index + 1, None);
            }
            working_set.slots[index] = uuid;
        }
        working_set
    }

    pub fn by_index(&self, index: usize) -> Option<Uuid> {
        self.slots.get(index).copied().flatten()
    }

    pub fn by_uuid(&self, uuid: Uuid) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(uuid))
    }

    pub fn largest_index(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    /// Occupied entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Uuid)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|uuid| (index, uuid)))
    }

    /// Every index from 1 through `largest_index`, holes included.
    pub fn slots(&self) -> impl Iterator<Item = (usize, Option<Uuid>)> + '_ {
        self.slots.iter().copied().enumerate().skip(1)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub(crate) fn append(&mut self, uuid: Uuid) -> usize {
        self.slots.push(Some(uuid));
        self.largest_index()
    }

    pub(crate) fn remove(&mut self, uuid: Uuid) -> bool {
        match self.by_uuid(uuid) {
            Some(index) => {
                self.slots[index] = None;
                true
            }
            None => false,
        }
    }

    /// Drops entries that are no longer eligible and appends eligible tasks
    /// that are missing. With `renumber`, indices are compacted to `1..=n`.
    pub(crate) fn rebuild(&mut self, eligible: &[Uuid], renumber: bool) {
        let keep: HashSet<Uuid> = eligible.iter().copied().collect();
        let mut slots: Vec<Option<Uuid>> = self
            .slots
            .iter()
            .map(|slot| slot.filter(|uuid| keep.contains(uuid)))
            .collect();
        slots[0] = None;

        let present: HashSet<Uuid> = slots.iter().flatten().copied().collect();
        for uuid in eligible {
            if !present.contains(uuid) {
                slots.push(Some(*uuid));
            }
        }

        if renumber {
            let mut compacted = vec![None];
            compacted.extend(slots.into_iter().flatten().map(Some));
            slots = compacted;
        } else {
            while slots.len() > 1 && slots.last().is_some_and(Option::is_none) {
                slots.pop();
            }
        }
        self.slots = slots;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn index_zero_is_never_assigned() {
        let mut ws = WorkingSet::default();
        assert_eq!(ws.largest_index(), 0);
        assert_eq!(ws.append(uuid(1)), 1);
        assert_eq!(ws.by_index(0), None);
        assert_eq!(ws.by_uuid(uuid(1)), Some(1));

        let from_entries = WorkingSet::from_entries([(0, Some(uuid(9))), (2, Some(uuid(2)))]);
        assert_eq!(from_entries.by_index(0), None);
        assert_eq!(from_entries.by_index(1), None);
        assert_eq!(from_entries.largest_index(), 2);
    }

    #[test]
    fn remove_leaves_a_hole_and_keeps_largest_index() {
        let mut ws = WorkingSet::default();
        ws.append(uuid(1));
        ws.append(uuid(2));
        assert!(ws.remove(uuid(2)));
        assert_eq!(ws.largest_index(), 2);
        assert_eq!(ws.by_index(2), None);
        assert_eq!(ws.len(), 1);
        assert!(!ws.remove(uuid(2)));
    }

    #[test]
    fn rebuild_without_renumber_keeps_indices() {
        let mut ws = WorkingSet::default();
        ws.append(uuid(1));
        ws.append(uuid(2));
        ws.append(uuid(3));

        ws.rebuild(&[uuid(1), uuid(3), uuid(4)], false);

        assert_eq!(ws.by_uuid(uuid(1)), Some(1));
        assert_eq!(ws.by_index(2), None);
        assert_eq!(ws.by_uuid(uuid(3)), Some(3));
        assert_eq!(ws.by_uuid(uuid(4)), Some(4));
    }

    #[test]
    fn rebuild_with_renumber_compacts() {
        let mut ws = WorkingSet::default();
        ws.append(uuid(1));
        ws.append(uuid(2));
        ws.append(uuid(3));

        ws.rebuild(&[uuid(3), uuid(1)], true);

        assert_eq!(ws.by_uuid(uuid(1)), Some(1));
        assert_eq!(ws.by_uuid(uuid(3)), Some(2));
        assert_eq!(ws.largest_index(), 2);
    }
}
