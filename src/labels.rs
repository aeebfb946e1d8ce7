use crate::{
    attributes::{
        AttributeSource, CompartmentId, GroupTypeId, PersonId, PropertyId, RegionId, ResourceId,
        Value,
    },
    error::AttributeError,
};
use itertools::Itertools;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::{Display, Formatter},
};

/// The value a dimension function assigns to a person.
///
/// Partitions only ever compare and hash labels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Value(Value),
    Region(RegionId),
    Compartment(CompartmentId),
    GroupTypeCounts(GroupTypeCountMap),
}

impl From<Value> for Label {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for Label {
    fn from(value: bool) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i32> for Label {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<RegionId> for Label {
    fn from(region: RegionId) -> Self {
        Self::Region(region)
    }
}

impl From<CompartmentId> for Label {
    fn from(compartment: CompartmentId) -> Self {
        Self::Compartment(compartment)
    }
}

impl From<GroupTypeCountMap> for Label {
    fn from(counts: GroupTypeCountMap) -> Self {
        Self::GroupTypeCounts(counts)
    }
}

impl Display for Label {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Value(value) => write!(formatter, "{value}"),
            Self::Region(region) => write!(formatter, "{region}"),
            Self::Compartment(compartment) => write!(formatter, "{compartment}"),
            Self::GroupTypeCounts(counts) => write!(formatter, "{counts}"),
        }
    }
}

/// How many groups of each type a person belongs to.
///
/// Only positive counts are stored, so a type that is absent and a type with a count of zero
/// compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GroupTypeCountMap(BTreeMap<GroupTypeId, usize>);

impl GroupTypeCountMap {
    pub fn new<I: IntoIterator<Item = (GroupTypeId, usize)>>(counts: I) -> Self {
        Self(counts.into_iter().filter(|(_, count)| *count > 0).collect())
    }

    /// Read the counts of every defined group type for one person.
    pub fn for_person(
        source: &dyn AttributeSource,
        person: PersonId,
    ) -> Result<Self, AttributeError> {
        let mut counts = BTreeMap::new();
        for group_type in source.group_type_ids() {
            let count = source.group_count_for_person_and_type(person, group_type)?;
            if count > 0 {
                counts.insert(group_type, count);
            }
        }
        Ok(Self(counts))
    }

    #[inline]
    pub fn get(&self, group_type: GroupTypeId) -> usize {
        self.0.get(&group_type).copied().unwrap_or(0)
    }

    pub fn group_types(&self) -> impl Iterator<Item = GroupTypeId> + '_ {
        self.0.keys().copied()
    }
}

impl Display for GroupTypeCountMap {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        let counts = self
            .0
            .iter()
            .map(|(group_type, count)| format!("{group_type}: {count}"))
            .join(", ");
        write!(formatter, "{{{counts}}}")
    }
}

/// A partial assignment of labels to the dimensions of a partition.
///
/// Used both to describe a cell (every dimension assigned) and as a query where every unassigned
/// dimension matches any label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSet {
    region: Option<Label>,
    compartment: Option<Label>,
    group: Option<Label>,
    properties: BTreeMap<PropertyId, Label>,
    resources: BTreeMap<ResourceId, Label>,
}

impl LabelSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region<L: Into<Label>>(mut self, label: L) -> Self {
        self.region = Some(label.into());
        self
    }

    pub fn with_compartment<L: Into<Label>>(mut self, label: L) -> Self {
        self.compartment = Some(label.into());
        self
    }

    pub fn with_group<L: Into<Label>>(mut self, label: L) -> Self {
        self.group = Some(label.into());
        self
    }

    pub fn with_property<L: Into<Label>>(mut self, property: PropertyId, label: L) -> Self {
        self.properties.insert(property, label.into());
        self
    }

    pub fn with_resource<L: Into<Label>>(mut self, resource: ResourceId, label: L) -> Self {
        self.resources.insert(resource, label.into());
        self
    }

    #[inline]
    pub const fn region(&self) -> Option<&Label> {
        self.region.as_ref()
    }

    #[inline]
    pub const fn compartment(&self) -> Option<&Label> {
        self.compartment.as_ref()
    }

    #[inline]
    pub const fn group(&self) -> Option<&Label> {
        self.group.as_ref()
    }

    #[inline]
    pub fn property(&self, property: PropertyId) -> Option<&Label> {
        self.properties.get(&property)
    }

    #[inline]
    pub fn resource(&self, resource: ResourceId) -> Option<&Label> {
        self.resources.get(&resource)
    }

    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.properties.keys().copied()
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.keys().copied()
    }

    /// No dimension is constrained.
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.compartment.is_none()
            && self.group.is_none()
            && self.properties.is_empty()
            && self.resources.is_empty()
    }
}

impl Display for LabelSet {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(region) = &self.region {
            parts.push(format!("region: {region}"));
        }
        if let Some(compartment) = &self.compartment {
            parts.push(format!("compartment: {compartment}"));
        }
        for (property, label) in &self.properties {
            parts.push(format!("{property}: {label}"));
        }
        for (resource, label) in &self.resources {
            parts.push(format!("{resource}: {label}"));
        }
        if let Some(group) = &self.group {
            parts.push(format!("group: {group}"));
        }
        write!(formatter, "[{}]", parts.join(", "))
    }
}

/// The labels currently used by the live cells of one dimension, with how many cells use each.
///
/// Labels are also kept in a dense list so that wildcard queries can enumerate them by position.
#[derive(Clone, Debug, Default)]
pub(crate) struct LabelManager {
    entries: HashMap<Label, LabelEntry>,
    labels: Vec<Label>,
}

#[derive(Clone, Copy, Debug)]
struct LabelEntry {
    position: usize,
    references: usize,
}

impl LabelManager {
    pub(crate) fn add_reference(&mut self, label: &Label) {
        if let Some(entry) = self.entries.get_mut(label) {
            entry.references += 1;
            return;
        }

        self.entries.insert(
            label.clone(),
            LabelEntry {
                position: self.labels.len(),
                references: 1,
            },
        );
        self.labels.push(label.clone());
    }

    pub(crate) fn remove_reference(&mut self, label: &Label) {
        let Some(entry) = self.entries.get_mut(label) else {
            unreachable!("removing a reference to {label} which is not live; this is a bug");
        };
        entry.references -= 1;
        if entry.references > 0 {
            return;
        }

        let position = entry.position;
        self.entries.remove(label);
        self.labels.swap_remove(position);
        if let Some(moved) = self.labels.get(position) {
            if let Some(entry) = self.entries.get_mut(moved) {
                entry.position = position;
            }
        }
    }

    #[inline]
    pub(crate) fn contains(&self, label: &Label) -> bool {
        self.entries.contains_key(label)
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn references(&self, label: &Label) -> usize {
        self.entries.get(label).map_or(0, |entry| entry.references)
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn get(&self, position: usize) -> Option<&Label> {
        self.labels.get(position)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub(crate) fn labels(&self) -> &[Label] {
        &self.labels
    }
}
