use crate::attributes::PersonId;
use std::collections::HashMap;

/// A set of people with constant-time insertion, removal and positional access.
///
/// Positional access is what makes uniform sampling inside a cell constant time.
#[derive(Clone, Debug, Default)]
pub(crate) struct PersonSet {
    people: Vec<PersonId>,
    positions: HashMap<PersonId, usize>,
}

impl PersonSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the person was already present.
    pub(crate) fn insert(&mut self, person: PersonId) -> bool {
        if self.positions.contains_key(&person) {
            return false;
        }

        self.positions.insert(person, self.people.len());
        self.people.push(person);
        true
    }

    /// Returns `false` if the person was not present.
    pub(crate) fn remove(&mut self, person: PersonId) -> bool {
        let Some(position) = self.positions.remove(&person) else {
            return false;
        };
        self.people.swap_remove(position);
        if let Some(moved) = self.people.get(position) {
            self.positions.insert(*moved, position);
        }
        true
    }

    #[inline]
    pub(crate) fn contains(&self, person: PersonId) -> bool {
        self.positions.contains_key(&person)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.people.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    #[inline]
    pub(crate) fn get(&self, position: usize) -> Option<PersonId> {
        self.people.get(position).copied()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[PersonId] {
        &self.people
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A_PERSON: PersonId = PersonId::new(4);
    const ANOTHER_PERSON: PersonId = PersonId::new(9);
    const A_THIRD_PERSON: PersonId = PersonId::new(1);

    #[test]
    fn inserting_twice_is_a_no_op() {
        let mut people = PersonSet::new();

        assert!(people.insert(A_PERSON));
        assert!(!people.insert(A_PERSON));
        assert_eq!(1, people.len());
    }

    #[test]
    fn removing_an_absent_person_is_a_no_op() {
        let mut people = PersonSet::new();
        people.insert(A_PERSON);

        assert!(!people.remove(ANOTHER_PERSON));
        assert!(people.contains(A_PERSON));
    }

    #[test]
    fn removal_keeps_positions_consistent() {
        let mut people = PersonSet::new();
        people.insert(A_PERSON);
        people.insert(ANOTHER_PERSON);
        people.insert(A_THIRD_PERSON);

        people.remove(A_PERSON);
        people.remove(A_THIRD_PERSON);

        assert_eq!(&[ANOTHER_PERSON], people.as_slice());
        assert_eq!(Some(ANOTHER_PERSON), people.get(0));
        assert!(people.remove(ANOTHER_PERSON));
        assert!(people.is_empty());
    }
}
