use crate::{
    ast::{CanonicalFilter, Filter},
    attributes::{AttributeSource, CompartmentId, PersonId, PropertyId, RegionId, ResourceId, Value},
    error::PartitionError,
    labels::{GroupTypeCountMap, Label, LabelSet},
};
use std::{
    collections::BTreeSet,
    fmt::{Debug, Formatter},
    sync::Arc,
};

pub type RegionFunction = Arc<dyn Fn(RegionId) -> Option<Label> + Send + Sync>;
pub type CompartmentFunction = Arc<dyn Fn(CompartmentId) -> Option<Label> + Send + Sync>;
pub type PropertyFunction = Arc<dyn Fn(&Value) -> Option<Label> + Send + Sync>;
pub type ResourceFunction = Arc<dyn Fn(u64) -> Option<Label> + Send + Sync>;
pub type GroupFunction = Arc<dyn Fn(&GroupTypeCountMap) -> Option<Label> + Send + Sync>;

#[derive(Clone)]
enum Dimension {
    Region(RegionFunction),
    Compartment(CompartmentFunction),
    Property(PropertyId, PropertyFunction),
    Resource(ResourceId, ResourceFunction),
    Group(GroupFunction),
}

/// A client-built description of a partition: its dimension functions and its filter.
///
/// ```rust
/// use partition_index::{Equality, Filter, Label, PartitionSpec, PropertyId, Value};
///
/// const AGE: PropertyId = PropertyId::new(0);
///
/// let descriptor = PartitionSpec::new()
///     .region(|region| Some(Label::from(region)))
///     .property(AGE, |age| match age {
///         Value::Integer(age) if *age < 18 => Some(Label::from("child")),
///         Value::Integer(_) => Some(Label::from("adult")),
///         _ => None,
///     })
///     .filter(Filter::property(AGE, Equality::GreaterThan, 0))
///     .build()
///     .unwrap();
/// assert!(!descriptor.is_degenerate());
/// ```
#[derive(Clone, Default)]
pub struct PartitionSpec {
    dimensions: Vec<Dimension>,
    filter: Option<Filter>,
}

impl PartitionSpec {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region<F>(mut self, function: F) -> Self
    where
        F: Fn(RegionId) -> Option<Label> + Send + Sync + 'static,
    {
        self.dimensions.push(Dimension::Region(Arc::new(function)));
        self
    }

    pub fn compartment<F>(mut self, function: F) -> Self
    where
        F: Fn(CompartmentId) -> Option<Label> + Send + Sync + 'static,
    {
        self.dimensions
            .push(Dimension::Compartment(Arc::new(function)));
        self
    }

    pub fn property<F>(mut self, property: PropertyId, function: F) -> Self
    where
        F: Fn(&Value) -> Option<Label> + Send + Sync + 'static,
    {
        self.dimensions
            .push(Dimension::Property(property, Arc::new(function)));
        self
    }

    pub fn resource<F>(mut self, resource: ResourceId, function: F) -> Self
    where
        F: Fn(u64) -> Option<Label> + Send + Sync + 'static,
    {
        self.dimensions
            .push(Dimension::Resource(resource, Arc::new(function)));
        self
    }

    pub fn group<F>(mut self, function: F) -> Self
    where
        F: Fn(&GroupTypeCountMap) -> Option<Label> + Send + Sync + 'static,
    {
        self.dimensions.push(Dimension::Group(Arc::new(function)));
        self
    }

    /// Restrict the partition to the people passing `filter`; several filters are combined with
    /// `And`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Compose two specifications: the dimensions of both, and both filters.
    pub fn merge(mut self, other: Self) -> Self {
        self.dimensions.extend(other.dimensions);
        match other.filter {
            Some(filter) => self.filter(filter),
            None => self,
        }
    }

    /// Flatten the specification into its canonical descriptor.
    ///
    /// Declaring the same dimension twice is rejected.
    pub fn build(self) -> Result<PartitionDescriptor, PartitionError> {
        let mut descriptor = PartitionDescriptor {
            region: None,
            compartment: None,
            properties: Vec::new(),
            resources: Vec::new(),
            group: None,
            filter: self.filter.unwrap_or(Filter::All).canonicalize(),
            property_ids: Vec::new(),
            resource_ids: Vec::new(),
            slots: Vec::new(),
        };
        let mut properties = BTreeSet::new();
        let mut resources = BTreeSet::new();
        for dimension in self.dimensions {
            match dimension {
                Dimension::Region(function) => {
                    if descriptor.region.replace(function).is_some() {
                        return Err(PartitionError::DuplicateDimension("region".to_string()));
                    }
                }
                Dimension::Compartment(function) => {
                    if descriptor.compartment.replace(function).is_some() {
                        return Err(PartitionError::DuplicateDimension(
                            "compartment".to_string(),
                        ));
                    }
                }
                Dimension::Property(property, function) => {
                    if !properties.insert(property) {
                        return Err(PartitionError::DuplicateDimension(property.to_string()));
                    }
                    descriptor.property_ids.push(property);
                    descriptor.properties.push((property, function));
                }
                Dimension::Resource(resource, function) => {
                    if !resources.insert(resource) {
                        return Err(PartitionError::DuplicateDimension(resource.to_string()));
                    }
                    descriptor.resource_ids.push(resource);
                    descriptor.resources.push((resource, function));
                }
                Dimension::Group(function) => {
                    if descriptor.group.replace(function).is_some() {
                        return Err(PartitionError::DuplicateDimension("group".to_string()));
                    }
                }
            }
        }
        descriptor.slots = descriptor.layout();
        Ok(descriptor)
    }
}

/// The dimension occupying one position of a cell key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    Region,
    Compartment,
    Property(usize),
    Resource(usize),
    Group,
}

impl Slot {
    const fn name(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Compartment => "compartment",
            Self::Property(_) => "property",
            Self::Resource(_) => "resource",
            Self::Group => "group",
        }
    }
}

/// The canonical form of a [`PartitionSpec`].
///
/// Cell keys lay their labels out in a fixed order: region, compartment, the properties in
/// declaration order, the resources in declaration order and finally the group type counts.
#[derive(Clone)]
pub struct PartitionDescriptor {
    region: Option<RegionFunction>,
    compartment: Option<CompartmentFunction>,
    properties: Vec<(PropertyId, PropertyFunction)>,
    resources: Vec<(ResourceId, ResourceFunction)>,
    group: Option<GroupFunction>,
    filter: CanonicalFilter,
    property_ids: Vec<PropertyId>,
    resource_ids: Vec<ResourceId>,
    slots: Vec<Slot>,
}

impl PartitionDescriptor {
    /// A partition over everyone passing `filter`, without any dimension.
    pub fn filtered(filter: Filter) -> Self {
        Self {
            region: None,
            compartment: None,
            properties: Vec::new(),
            resources: Vec::new(),
            group: None,
            filter: filter.canonicalize(),
            property_ids: Vec::new(),
            resource_ids: Vec::new(),
            slots: Vec::new(),
        }
    }

    fn layout(&self) -> Vec<Slot> {
        let mut slots = Vec::with_capacity(self.dimension_count());
        if self.region.is_some() {
            slots.push(Slot::Region);
        }
        if self.compartment.is_some() {
            slots.push(Slot::Compartment);
        }
        slots.extend((0..self.properties.len()).map(Slot::Property));
        slots.extend((0..self.resources.len()).map(Slot::Resource));
        if self.group.is_some() {
            slots.push(Slot::Group);
        }
        slots
    }

    #[inline]
    pub const fn filter(&self) -> &CanonicalFilter {
        &self.filter
    }

    #[inline]
    pub const fn has_region(&self) -> bool {
        self.region.is_some()
    }

    #[inline]
    pub const fn has_compartment(&self) -> bool {
        self.compartment.is_some()
    }

    #[inline]
    pub const fn has_group(&self) -> bool {
        self.group.is_some()
    }

    /// The property ids used as dimensions, in declaration order.
    #[inline]
    pub fn property_ids(&self) -> &[PropertyId] {
        &self.property_ids
    }

    /// The resource ids used as dimensions, in declaration order.
    #[inline]
    pub fn resource_ids(&self) -> &[ResourceId] {
        &self.resource_ids
    }

    pub fn dimension_count(&self) -> usize {
        usize::from(self.region.is_some())
            + usize::from(self.compartment.is_some())
            + self.properties.len()
            + self.resources.len()
            + usize::from(self.group.is_some())
    }

    /// A partition without any dimension reduces to a filtered membership set.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.dimension_count() == 0
    }

    /// Whether every dimension named by `labels` exists in this descriptor.
    pub fn validate(&self, labels: &LabelSet) -> bool {
        (labels.region().is_none() || self.has_region())
            && (labels.compartment().is_none() || self.has_compartment())
            && (labels.group().is_none() || self.has_group())
            && labels
                .property_ids()
                .all(|property| self.property_ids.contains(&property))
            && labels
                .resource_ids()
                .all(|resource| self.resource_ids.contains(&resource))
    }

    #[inline]
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn property_slot(&self, property: PropertyId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Slot::Property(index) if self.properties[*index].0 == property))
    }

    pub(crate) fn resource_slot(&self, resource: ResourceId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Slot::Resource(index) if self.resources[*index].0 == resource))
    }

    pub(crate) fn slot_of(&self, wanted: Slot) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == wanted)
    }

    /// Compute the label of one key position for a person.
    pub(crate) fn label(
        &self,
        slot: Slot,
        source: &dyn AttributeSource,
        person: PersonId,
    ) -> Result<Label, PartitionError> {
        let label = match slot {
            Slot::Region => {
                let region = source.region_of(person)?;
                self.region.as_ref().and_then(|function| function(region))
            }
            Slot::Compartment => {
                let compartment = source.compartment_of(person)?;
                self.compartment
                    .as_ref()
                    .and_then(|function| function(compartment))
            }
            Slot::Property(index) => {
                let (property, function) = &self.properties[index];
                function(&source.property_value(person, *property)?)
            }
            Slot::Resource(index) => {
                let (resource, function) = &self.resources[index];
                function(source.resource_level(person, *resource)?)
            }
            Slot::Group => {
                let counts = GroupTypeCountMap::for_person(source, person)?;
                self.group.as_ref().and_then(|function| function(&counts))
            }
        };
        label.ok_or(PartitionError::MissingLabel {
            dimension: slot.name(),
            person,
        })
    }

    /// Compute the full cell key of a person.
    pub(crate) fn key(
        &self,
        source: &dyn AttributeSource,
        person: PersonId,
    ) -> Result<Box<[Label]>, PartitionError> {
        self.slots
            .iter()
            .map(|slot| self.label(*slot, source, person))
            .collect()
    }

    /// The constraint `labels` puts on every key position; `None` matches any label.
    pub(crate) fn constraints<'a>(&self, labels: &'a LabelSet) -> Vec<Option<&'a Label>> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Region => labels.region(),
                Slot::Compartment => labels.compartment(),
                Slot::Property(index) => labels.property(self.properties[*index].0),
                Slot::Resource(index) => labels.resource(self.resources[*index].0),
                Slot::Group => labels.group(),
            })
            .collect()
    }

    /// Describe a cell key as a fully assigned label set.
    pub(crate) fn label_set(&self, key: &[Label]) -> LabelSet {
        self.slots
            .iter()
            .zip(key)
            .fold(LabelSet::new(), |labels, (slot, label)| match slot {
                Slot::Region => labels.with_region(label.clone()),
                Slot::Compartment => labels.with_compartment(label.clone()),
                Slot::Property(index) => {
                    labels.with_property(self.properties[*index].0, label.clone())
                }
                Slot::Resource(index) => {
                    labels.with_resource(self.resources[*index].0, label.clone())
                }
                Slot::Group => labels.with_group(label.clone()),
            })
    }
}

impl Debug for PartitionDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PartitionDescriptor")
            .field("region", &self.has_region())
            .field("compartment", &self.has_compartment())
            .field("properties", &self.property_ids)
            .field("resources", &self.resource_ids)
            .field("group", &self.has_group())
            .field("filter", &self.filter)
            .finish()
    }
}
