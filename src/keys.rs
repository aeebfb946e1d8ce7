use crate::{
    attributes::PersonId,
    labels::{Label, LabelManager},
    people_set::PersonSet,
};
use itertools::Itertools;
use slab::Slab;
use std::{collections::HashMap, sync::Arc};

/// An interned cell key: one label per dimension, in the order of the descriptor slots.
pub(crate) type CellKey = Arc<[Label]>;

#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Debug, Hash)]
pub(crate) struct CellId(usize);

#[derive(Clone, Debug)]
pub(crate) struct Cell {
    key: CellKey,
    members: PersonSet,
}

impl Cell {
    #[inline]
    pub(crate) fn key(&self) -> &[Label] {
        &self.key
    }

    #[inline]
    pub(crate) const fn members(&self) -> &PersonSet {
        &self.members
    }
}

/// The live cells of a partition.
///
/// Structurally equal keys are interned to a single cell. A cell exists only while it has members,
/// and every label it holds is referenced once in the [`LabelManager`] of its slot for as long as
/// the cell lives.
#[derive(Clone, Debug)]
pub(crate) struct CellTable {
    cells: Slab<Cell>,
    by_keys: HashMap<CellKey, CellId>,
    labels: Vec<LabelManager>,
}

impl CellTable {
    const DEFAULT_CELLS: usize = 16;

    pub(crate) fn new(slots: usize) -> Self {
        Self {
            cells: Slab::with_capacity(Self::DEFAULT_CELLS),
            by_keys: HashMap::with_capacity(Self::DEFAULT_CELLS),
            labels: vec![LabelManager::default(); slots],
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &[Label]) -> Option<CellId> {
        self.by_keys.get(key).copied()
    }

    #[inline]
    pub(crate) fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn label_manager(&self, slot: usize) -> &LabelManager {
        &self.labels[slot]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells.iter().map(|(id, cell)| (CellId(id), cell))
    }

    /// Add a person to the cell of `key`, creating the cell when needed.
    pub(crate) fn insert(&mut self, key: &[Label], person: PersonId) -> CellId {
        let id = match self.get(key) {
            Some(id) => id,
            None => self.create(key),
        };
        self.cells[id.0].members.insert(person);
        id
    }

    /// Remove a person from a cell, destroying the cell once it is empty.
    pub(crate) fn remove(&mut self, id: CellId, person: PersonId) {
        let cell = &mut self.cells[id.0];
        if !cell.members.remove(person) {
            unreachable!("{person} is not in the cell it is mapped to; this is a bug");
        }
        if cell.members.is_empty() {
            self.destroy(id);
        }
    }

    fn create(&mut self, key: &[Label]) -> CellId {
        let key: CellKey = Arc::from(key);
        for (manager, label) in self.labels.iter_mut().zip(key.iter()) {
            manager.add_reference(label);
        }
        let id = CellId(self.cells.insert(Cell {
            key: key.clone(),
            members: PersonSet::new(),
        }));
        tracing::trace!(cell = ?key, "created cell");
        self.by_keys.insert(key, id);
        id
    }

    fn destroy(&mut self, id: CellId) {
        let cell = self.cells.remove(id.0);
        self.by_keys.remove(&cell.key);
        for (manager, label) in self.labels.iter_mut().zip(cell.key.iter()) {
            manager.remove_reference(label);
        }
        tracing::trace!(cell = ?cell.key, "destroyed cell");
    }

    /// The live cells consistent with every constrained slot; `None` constrains nothing.
    ///
    /// The unconstrained slots are enumerated over the Cartesian product of their live labels,
    /// unless that product is larger than the number of live cells, in which case the cells are
    /// scanned instead.
    pub(crate) fn matching(&self, constraints: &[Option<&Label>]) -> Vec<CellId> {
        if constraints.iter().all(Option::is_some) {
            let key: Vec<Label> = constraints
                .iter()
                .flatten()
                .map(|label| (*label).clone())
                .collect();
            return self.get(&key).into_iter().collect();
        }

        let constrained_live = constraints
            .iter()
            .zip(&self.labels)
            .all(|(constraint, manager)| {
                constraint.map_or(true, |label| manager.contains(label))
            });
        if !constrained_live {
            return vec![];
        }

        let open: Vec<usize> = constraints.iter().positions(Option::is_none).collect();
        let combinations = open.iter().try_fold(1usize, |product, slot| {
            product.checked_mul(self.labels[*slot].len())
        });
        match combinations {
            Some(combinations) if combinations <= self.cells.len() => {
                self.enumerate(constraints, &open)
            }
            _ => self.scan(constraints),
        }
    }

    fn enumerate(&self, constraints: &[Option<&Label>], open: &[usize]) -> Vec<CellId> {
        let mut key: Vec<Label> = constraints
            .iter()
            .map(|constraint| match constraint {
                Some(label) => (*label).clone(),
                None => Label::from(false),
            })
            .collect();
        open.iter()
            .map(|slot| self.labels[*slot].labels().iter())
            .multi_cartesian_product()
            .filter_map(|labels| {
                for (slot, label) in open.iter().zip(labels) {
                    key[*slot] = label.clone();
                }
                self.get(&key)
            })
            .collect()
    }

    fn scan(&self, constraints: &[Option<&Label>]) -> Vec<CellId> {
        self.iter()
            .filter(|(_, cell)| is_consistent(cell.key(), constraints))
            .map(|(id, _)| id)
            .collect()
    }
}

/// Whether a cell key agrees with every constrained slot.
pub(crate) fn is_consistent(key: &[Label], constraints: &[Option<&Label>]) -> bool {
    key.iter()
        .zip(constraints)
        .all(|(label, constraint)| constraint.map_or(true, |expected| expected == label))
}
