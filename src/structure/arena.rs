//! Bar storage: bars addressed by id, plus their order in the score
//!
//! Ids are handed out from a counter and never reused, so an id held by a
//! caller stays valid (or becomes unknown) across inserts and removals of
//! other bars. Reordering is a splice of the id list only.

use std::collections::BTreeMap;

use crate::models::{Bar, BarId, Meter, Tempo};

#[derive(Clone, Debug, Default)]
pub struct BarArena {
    bars: BTreeMap<BarId, Bar>,
    order: Vec<BarId>,
    next_id: u32,
}

impl BarArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bar at `position` (clamped to the end)
    pub fn insert(&mut self, position: usize, meter: Meter, tempo: Tempo) -> BarId {
        let id = BarId(self.next_id);
        self.next_id += 1;
        let position = position.min(self.order.len());
        self.order.insert(position, id);
        self.bars.insert(id, Bar::new(id, meter, tempo));
        id
    }

    pub fn remove(&mut self, id: BarId) -> Option<Bar> {
        let bar = self.bars.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(bar)
    }

    pub fn get(&self, id: BarId) -> Option<&Bar> {
        self.bars.get(&id)
    }

    pub fn get_mut(&mut self, id: BarId) -> Option<&mut Bar> {
        self.bars.get_mut(&id)
    }

    /// Position of a bar in score order
    pub fn position(&self, id: BarId) -> Option<usize> {
        self.order.iter().position(|other| *other == id)
    }

    /// Bar id at a score position
    pub fn at(&self, position: usize) -> Option<BarId> {
        self.order.get(position).copied()
    }

    /// Bar immediately before `id` in score order
    pub fn previous(&self, id: BarId) -> Option<&Bar> {
        let position = self.position(id)?;
        let previous = self.order.get(position.checked_sub(1)?)?;
        self.bars.get(previous)
    }

    pub fn order(&self) -> &[BarId] {
        &self.order
    }

    /// Bars in score order
    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.order.iter().filter_map(|id| self.bars.get(id))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bar> {
        self.bars.values_mut()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_splices_order() {
        let mut arena = BarArena::new();
        let a = arena.insert(0, Meter::default(), Tempo::default());
        let b = arena.insert(5, Meter::default(), Tempo::default());
        let c = arena.insert(1, Meter::default(), Tempo::default());

        assert_eq!(arena.order(), &[a, c, b]);
        assert_eq!(arena.position(b), Some(2));
        assert_eq!(arena.at(1), Some(c));
        assert_eq!(arena.previous(c).map(|bar| bar.id), Some(a));
        assert!(arena.previous(a).is_none());
    }

    #[test]
    fn test_ids_survive_removal() {
        let mut arena = BarArena::new();
        let a = arena.insert(0, Meter::default(), Tempo::default());
        let b = arena.insert(1, Meter::default(), Tempo::default());
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());

        let c = arena.insert(0, Meter::default(), Tempo::default());
        assert_ne!(c, a);
        assert_eq!(arena.order(), &[c, b]);
        assert_eq!(arena.get(b).map(|bar| bar.id), Some(b));
        assert_eq!(arena.len(), 2);
    }
}
