use crate::{
    ast::{CanonicalFilter, Filter},
    attributes::{CompartmentId, GroupId, GroupTypeId, PropertyId, RegionId, ResourceId, Value},
    descriptor::PartitionDescriptor,
};
use itertools::Itertools;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
};

/// The attribute changes that can alter the outcome of a filter, or the cell of a member.
///
/// A property compared with `EQUAL` or `NOT_EQUAL` (once the negations above it are accounted
/// for) only needs to be re-evaluated when the old or the new value is the literal of the leaf; it
/// is recorded in [`Trigger::property_values()`]. Any other property leaf is recorded in
/// [`Trigger::properties()`] and reacts to every change of that property.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trigger {
    regions: BTreeSet<RegionId>,
    compartments: BTreeSet<CompartmentId>,
    properties: BTreeSet<PropertyId>,
    property_values: BTreeSet<(PropertyId, Value)>,
    resources: BTreeSet<ResourceId>,
    groups: BTreeSet<GroupId>,
    group_types: BTreeSet<GroupTypeId>,
    any_region: bool,
    any_compartment: bool,
    any_group: bool,
}

impl Trigger {
    /// The sensitivity of a filter alone.
    pub fn new(filter: &CanonicalFilter) -> Self {
        let mut trigger = Self::default();
        trigger.visit(filter.root(), false);
        trigger.normalize();
        trigger
    }

    /// The sensitivity of a whole partition: its filter, widened by its dimension functions.
    ///
    /// A region or compartment dimension watches every region or compartment, a property or
    /// resource dimension watches every change of its id and a group dimension watches every group
    /// membership change. A partition whose filter is statically `None` watches nothing.
    pub fn for_partition(descriptor: &PartitionDescriptor) -> Self {
        let mut trigger = Self::default();
        if descriptor.filter().is_none() {
            return trigger;
        }
        trigger.visit(descriptor.filter().root(), false);
        trigger.any_region |= descriptor.has_region();
        trigger.any_compartment |= descriptor.has_compartment();
        trigger.any_group |= descriptor.has_group();
        trigger
            .properties
            .extend(descriptor.property_ids().iter().copied());
        trigger
            .resources
            .extend(descriptor.resource_ids().iter().copied());
        trigger.normalize();
        trigger
    }

    fn visit(&mut self, filter: &Filter, negated: bool) {
        match filter {
            Filter::All | Filter::None => {}
            Filter::And(left, right) | Filter::Or(left, right) => {
                self.visit(left, negated);
                self.visit(right, negated);
            }
            Filter::Negate(value) => self.visit(value, !negated),
            Filter::Compartment(compartment) => {
                self.compartments.insert(*compartment);
            }
            Filter::Region(regions) => {
                self.regions.extend(regions.iter().copied());
            }
            Filter::Property(property, equality, value) => {
                let effective = if negated { !*equality } else { *equality };
                if effective.is_equality_like() {
                    self.property_values.insert((*property, value.clone()));
                } else {
                    self.properties.insert(*property);
                }
            }
            Filter::Resource(resource, _, _) => {
                self.resources.insert(*resource);
            }
            Filter::GroupMember(group) => {
                self.groups.insert(*group);
            }
            Filter::GroupsForPersonAndType(group_type, _, _) => {
                self.group_types.insert(*group_type);
            }
            Filter::GroupsForPerson(_, _) | Filter::GroupTypesForPerson(_, _) => {
                self.any_group = true;
            }
        }
    }

    fn normalize(&mut self) {
        let properties = &self.properties;
        self.property_values
            .retain(|(property, _)| !properties.contains(property));
        if self.any_region {
            self.regions.clear();
        }
        if self.any_compartment {
            self.compartments.clear();
        }
        if self.any_group {
            self.groups.clear();
            self.group_types.clear();
        }
    }

    /// Nothing but people joining or leaving the population can affect the partition.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
            && self.compartments.is_empty()
            && self.properties.is_empty()
            && self.property_values.is_empty()
            && self.resources.is_empty()
            && self.groups.is_empty()
            && self.group_types.is_empty()
            && !self.any_region
            && !self.any_compartment
            && !self.any_group
    }

    #[inline]
    pub const fn regions(&self) -> &BTreeSet<RegionId> {
        &self.regions
    }

    #[inline]
    pub const fn compartments(&self) -> &BTreeSet<CompartmentId> {
        &self.compartments
    }

    #[inline]
    pub const fn properties(&self) -> &BTreeSet<PropertyId> {
        &self.properties
    }

    #[inline]
    pub const fn property_values(&self) -> &BTreeSet<(PropertyId, Value)> {
        &self.property_values
    }

    #[inline]
    pub const fn resources(&self) -> &BTreeSet<ResourceId> {
        &self.resources
    }

    #[inline]
    pub const fn groups(&self) -> &BTreeSet<GroupId> {
        &self.groups
    }

    #[inline]
    pub const fn group_types(&self) -> &BTreeSet<GroupTypeId> {
        &self.group_types
    }

    #[inline]
    pub const fn any_region(&self) -> bool {
        self.any_region
    }

    #[inline]
    pub const fn any_compartment(&self) -> bool {
        self.any_compartment
    }

    #[inline]
    pub const fn any_group(&self) -> bool {
        self.any_group
    }
}

impl Display for Trigger {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        if self.is_empty() {
            return write!(formatter, "population only");
        }

        let mut parts = Vec::new();
        if self.any_region {
            parts.push("any region".to_string());
        } else if !self.regions.is_empty() {
            parts.push(format!("regions [{}]", self.regions.iter().join(", ")));
        }
        if self.any_compartment {
            parts.push("any compartment".to_string());
        } else if !self.compartments.is_empty() {
            parts.push(format!(
                "compartments [{}]",
                self.compartments.iter().join(", ")
            ));
        }
        if !self.properties.is_empty() {
            parts.push(format!("properties [{}]", self.properties.iter().join(", ")));
        }
        if !self.property_values.is_empty() {
            let values = self
                .property_values
                .iter()
                .map(|(property, value)| format!("{property} = {value}"))
                .join(", ");
            parts.push(format!("values [{values}]"));
        }
        if !self.resources.is_empty() {
            parts.push(format!("resources [{}]", self.resources.iter().join(", ")));
        }
        if self.any_group {
            parts.push("any group".to_string());
        } else {
            if !self.groups.is_empty() {
                parts.push(format!("groups [{}]", self.groups.iter().join(", ")));
            }
            if !self.group_types.is_empty() {
                parts.push(format!(
                    "group types [{}]",
                    self.group_types.iter().join(", ")
                ));
            }
        }
        write!(formatter, "{}", parts.join("; "))
    }
}
