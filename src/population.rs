use crate::{
    attributes::{
        AttributeSource, CompartmentId, GroupId, GroupTypeId, IndexProbe, PersonId, PropertyId,
        RegionId, ResourceId, Value,
    },
    error::AttributeError,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Whether a [`Population`] maintains reverse indices for regions, compartments and property
/// values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MapOption {
    #[default]
    None,
    Indexed,
}

/// An in-memory [`AttributeSource`].
///
/// Every mutator returns the value it replaced so that the caller can describe the change to a
/// [`crate::PartitionRegistry`].
#[derive(Clone, Debug, Default)]
pub struct Population {
    people: Vec<Option<PersonRecord>>,
    size: usize,
    properties: BTreeMap<PropertyId, Value>,
    resources: BTreeSet<ResourceId>,
    group_types: BTreeSet<GroupTypeId>,
    groups: Vec<Option<GroupRecord>>,
    map_option: MapOption,
    by_regions: HashMap<RegionId, BTreeSet<PersonId>>,
    by_compartments: HashMap<CompartmentId, BTreeSet<PersonId>>,
    by_property_values: HashMap<(PropertyId, Value), BTreeSet<PersonId>>,
}

#[derive(Clone, Debug)]
struct PersonRecord {
    region: RegionId,
    compartment: CompartmentId,
    properties: BTreeMap<PropertyId, Value>,
    resources: BTreeMap<ResourceId, u64>,
    groups: BTreeSet<GroupId>,
}

#[derive(Clone, Debug)]
struct GroupRecord {
    group_type: GroupTypeId,
    members: BTreeSet<PersonId>,
}

impl Population {
    pub fn new(map_option: MapOption) -> Self {
        Self {
            map_option,
            ..Self::default()
        }
    }

    /// Define a property along with the value every person starts with.
    pub fn define_property<V: Into<Value>>(&mut self, property: PropertyId, default: V) {
        self.properties.insert(property, default.into());
    }

    pub fn define_resource(&mut self, resource: ResourceId) {
        self.resources.insert(resource);
    }

    pub fn define_group_type(&mut self, group_type: GroupTypeId) {
        self.group_types.insert(group_type);
    }

    pub fn add_group(&mut self, group_type: GroupTypeId) -> Result<GroupId, AttributeError> {
        if !self.group_types.contains(&group_type) {
            return Err(AttributeError::UnknownGroupType(group_type));
        }

        let group = GroupId::new(self.groups.len());
        self.groups.push(Some(GroupRecord {
            group_type,
            members: BTreeSet::new(),
        }));
        Ok(group)
    }

    /// Add a person with the default value of every defined property and no resources.
    pub fn add_person(&mut self, region: RegionId, compartment: CompartmentId) -> PersonId {
        let person = PersonId::new(self.people.len());
        let record = PersonRecord {
            region,
            compartment,
            properties: self.properties.clone(),
            resources: self.resources.iter().map(|id| (*id, 0)).collect(),
            groups: BTreeSet::new(),
        };
        if self.is_indexed() {
            self.by_regions.entry(region).or_default().insert(person);
            self.by_compartments
                .entry(compartment)
                .or_default()
                .insert(person);
            for (property, value) in &record.properties {
                self.by_property_values
                    .entry((*property, value.clone()))
                    .or_default()
                    .insert(person);
            }
        }
        self.people.push(Some(record));
        self.size += 1;
        person
    }

    pub fn remove_person(&mut self, person: PersonId) -> Result<(), AttributeError> {
        let record = self
            .people
            .get_mut(person.index())
            .and_then(Option::take)
            .ok_or(AttributeError::UnknownPerson(person))?;
        for group in &record.groups {
            if let Some(Some(group)) = self.groups.get_mut(group.index()) {
                group.members.remove(&person);
            }
        }
        if self.is_indexed() {
            unindex(&mut self.by_regions, &record.region, person);
            unindex(&mut self.by_compartments, &record.compartment, person);
            for (property, value) in record.properties {
                unindex(&mut self.by_property_values, &(property, value), person);
            }
        }
        self.size -= 1;
        Ok(())
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn set_region(
        &mut self,
        person: PersonId,
        region: RegionId,
    ) -> Result<RegionId, AttributeError> {
        let indexed = self.is_indexed();
        let record = record_mut(&mut self.people, person)?;
        let old = std::mem::replace(&mut record.region, region);
        if indexed {
            unindex(&mut self.by_regions, &old, person);
            self.by_regions.entry(region).or_default().insert(person);
        }
        Ok(old)
    }

    pub fn set_compartment(
        &mut self,
        person: PersonId,
        compartment: CompartmentId,
    ) -> Result<CompartmentId, AttributeError> {
        let indexed = self.is_indexed();
        let record = record_mut(&mut self.people, person)?;
        let old = std::mem::replace(&mut record.compartment, compartment);
        if indexed {
            unindex(&mut self.by_compartments, &old, person);
            self.by_compartments
                .entry(compartment)
                .or_default()
                .insert(person);
        }
        Ok(old)
    }

    pub fn set_property<V: Into<Value>>(
        &mut self,
        person: PersonId,
        property: PropertyId,
        value: V,
    ) -> Result<Value, AttributeError> {
        let value = value.into();
        let indexed = self.is_indexed();
        let record = record_mut(&mut self.people, person)?;
        let slot = record
            .properties
            .get_mut(&property)
            .ok_or(AttributeError::UnknownProperty(property))?;
        let old = std::mem::replace(slot, value.clone());
        if indexed {
            unindex(&mut self.by_property_values, &(property, old.clone()), person);
            self.by_property_values
                .entry((property, value))
                .or_default()
                .insert(person);
        }
        Ok(old)
    }

    pub fn set_resource_level(
        &mut self,
        person: PersonId,
        resource: ResourceId,
        level: u64,
    ) -> Result<u64, AttributeError> {
        let record = record_mut(&mut self.people, person)?;
        let slot = record
            .resources
            .get_mut(&resource)
            .ok_or(AttributeError::UnknownResource(resource))?;
        Ok(std::mem::replace(slot, level))
    }

    /// Returns `false` if the person already belonged to the group.
    pub fn add_to_group(&mut self, person: PersonId, group: GroupId) -> Result<bool, AttributeError> {
        let members = &mut group_mut(&mut self.groups, group)?.members;
        let record = record_mut(&mut self.people, person)?;
        record.groups.insert(group);
        Ok(members.insert(person))
    }

    /// Returns `false` if the person did not belong to the group.
    pub fn remove_from_group(
        &mut self,
        person: PersonId,
        group: GroupId,
    ) -> Result<bool, AttributeError> {
        let members = &mut group_mut(&mut self.groups, group)?.members;
        let record = record_mut(&mut self.people, person)?;
        record.groups.remove(&group);
        Ok(members.remove(&person))
    }

    #[inline]
    fn is_indexed(&self) -> bool {
        matches!(self.map_option, MapOption::Indexed)
    }

    fn record(&self, person: PersonId) -> Result<&PersonRecord, AttributeError> {
        self.people
            .get(person.index())
            .and_then(Option::as_ref)
            .ok_or(AttributeError::UnknownPerson(person))
    }

    fn group(&self, group: GroupId) -> Result<&GroupRecord, AttributeError> {
        self.groups
            .get(group.index())
            .and_then(Option::as_ref)
            .ok_or(AttributeError::UnknownGroup(group))
    }
}

fn record_mut(
    people: &mut [Option<PersonRecord>],
    person: PersonId,
) -> Result<&mut PersonRecord, AttributeError> {
    people
        .get_mut(person.index())
        .and_then(Option::as_mut)
        .ok_or(AttributeError::UnknownPerson(person))
}

fn group_mut(
    groups: &mut [Option<GroupRecord>],
    group: GroupId,
) -> Result<&mut GroupRecord, AttributeError> {
    groups
        .get_mut(group.index())
        .and_then(Option::as_mut)
        .ok_or(AttributeError::UnknownGroup(group))
}

fn unindex<K: std::hash::Hash + Eq>(
    index: &mut HashMap<K, BTreeSet<PersonId>>,
    key: &K,
    person: PersonId,
) {
    if let Some(people) = index.get_mut(key) {
        people.remove(&person);
        if people.is_empty() {
            index.remove(key);
        }
    }
}

impl AttributeSource for Population {
    fn people(&self) -> Vec<PersonId> {
        self.people
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_some())
            .map(|(index, _)| PersonId::new(index))
            .collect()
    }

    #[inline]
    fn contains_person(&self, person: PersonId) -> bool {
        self.record(person).is_ok()
    }

    fn region_of(&self, person: PersonId) -> Result<RegionId, AttributeError> {
        Ok(self.record(person)?.region)
    }

    fn compartment_of(&self, person: PersonId) -> Result<CompartmentId, AttributeError> {
        Ok(self.record(person)?.compartment)
    }

    fn property_value(
        &self,
        person: PersonId,
        property: PropertyId,
    ) -> Result<Value, AttributeError> {
        let record = self.record(person)?;
        if !self.properties.contains_key(&property) {
            return Err(AttributeError::UnknownProperty(property));
        }
        record
            .properties
            .get(&property)
            .cloned()
            .ok_or(AttributeError::MissingPropertyValue { person, property })
    }

    fn resource_level(&self, person: PersonId, resource: ResourceId) -> Result<u64, AttributeError> {
        self.record(person)?
            .resources
            .get(&resource)
            .copied()
            .ok_or(AttributeError::UnknownResource(resource))
    }

    fn is_group_member(&self, person: PersonId, group: GroupId) -> Result<bool, AttributeError> {
        let group = self.group(group)?;
        self.record(person)?;
        Ok(group.members.contains(&person))
    }

    fn group_type_of(&self, group: GroupId) -> Result<GroupTypeId, AttributeError> {
        Ok(self.group(group)?.group_type)
    }

    fn group_count_for_person_and_type(
        &self,
        person: PersonId,
        group_type: GroupTypeId,
    ) -> Result<usize, AttributeError> {
        if !self.group_types.contains(&group_type) {
            return Err(AttributeError::UnknownGroupType(group_type));
        }
        let record = self.record(person)?;
        let mut count = 0;
        for group in &record.groups {
            if self.group(*group)?.group_type == group_type {
                count += 1;
            }
        }
        Ok(count)
    }

    fn group_count_for_person(&self, person: PersonId) -> Result<usize, AttributeError> {
        Ok(self.record(person)?.groups.len())
    }

    fn group_type_count_for_person(&self, person: PersonId) -> Result<usize, AttributeError> {
        let record = self.record(person)?;
        let mut group_types = BTreeSet::new();
        for group in &record.groups {
            group_types.insert(self.group(*group)?.group_type);
        }
        Ok(group_types.len())
    }

    fn property_ids(&self) -> Vec<PropertyId> {
        self.properties.keys().copied().collect()
    }

    fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources.iter().copied().collect()
    }

    fn group_type_ids(&self) -> Vec<GroupTypeId> {
        self.group_types.iter().copied().collect()
    }

    fn indexed_people(&self, probe: &IndexProbe) -> Option<Vec<PersonId>> {
        if !self.is_indexed() {
            return None;
        }

        let people = match probe {
            IndexProbe::Region(region) => self.by_regions.get(region),
            IndexProbe::Compartment(compartment) => self.by_compartments.get(compartment),
            IndexProbe::Property(property, value) => {
                if !self.properties.contains_key(property) {
                    return None;
                }
                self.by_property_values.get(&(*property, value.clone()))
            }
        };
        Some(people.map_or_else(Vec::new, |people| people.iter().copied().collect()))
    }
}
