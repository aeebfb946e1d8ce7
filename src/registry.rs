use crate::{
    attributes::{
        AttributeSource, CompartmentId, ComponentId, GroupId, GroupTypeId, PersonId, PropertyId,
        RegionId, ResourceId, Value,
    },
    config::RegistryConfig,
    descriptor::PartitionDescriptor,
    error::PartitionError,
    events::{PopulationEvent, Report, TransactionId},
    labels::LabelSet,
    matcher::{IndexedScan, PopulationMatcher},
    partition::{new_partition, Partition},
    random::RandomStreams,
    sampling::{Sample, SamplerConfig, SamplingScratch},
    traced::TracedPartition,
    trigger::Trigger,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{Debug, Formatter},
    hash::Hash,
};

/// Partitions are numbered in registration order; ids are never reused.
type PartitionId = u64;
type Interested = BTreeSet<PartitionId>;

/// Owns the partitions of a simulation and keeps them up to date as the population changes.
///
/// Every change is described to [`PartitionRegistry::handle()`], which forwards it only to the
/// partitions whose [`Trigger`] it can affect, in registration order.
///
/// # Examples
///
/// ```rust
/// use partition_index::{
///     ComponentId, CompartmentId, Equality, Filter, MapOption, PartitionRegistry, PartitionSpec,
///     Population, PopulationEvent, PropertyId, RegionId, RegistryConfig,
/// };
///
/// const AGE: PropertyId = PropertyId::new(0);
///
/// let mut population = Population::new(MapOption::None);
/// population.define_property(AGE, 0);
/// let mut registry = PartitionRegistry::new(RegistryConfig::default());
/// let adults = PartitionSpec::new()
///     .filter(Filter::property(AGE, Equality::GreaterThanEqual, 18))
///     .build()
///     .unwrap();
/// registry
///     .add_partition(ComponentId::new(0), adults, "adults", &population)
///     .unwrap();
///
/// let person = population.add_person(RegionId::new(0), CompartmentId::new(0));
/// registry
///     .handle(&population, &PopulationEvent::PersonAdded { person })
///     .unwrap();
/// let old = population.set_property(person, AGE, 30).unwrap();
/// let report = registry
///     .handle(
///         &population,
///         &PopulationEvent::PropertyChanged { person, property: AGE, old, new: 30.into() },
///     )
///     .unwrap();
///
/// assert_eq!(&[("adults", person)], report.joined());
/// assert!(registry.contains(&"adults", person).unwrap());
/// ```
pub struct PartitionRegistry<K> {
    config: RegistryConfig,
    partitions: BTreeMap<PartitionId, Registration<K>>,
    partitions_by_keys: HashMap<K, PartitionId>,
    next_partition: PartitionId,
    transaction: TransactionId,
    streams: RandomStreams,
    scratch: SamplingScratch,
    matcher: Box<dyn PopulationMatcher + Send + Sync>,
    regions: HashMap<RegionId, Interested>,
    compartments: HashMap<CompartmentId, Interested>,
    properties: HashMap<PropertyId, Interested>,
    property_values: HashMap<(PropertyId, Value), Interested>,
    resources: HashMap<ResourceId, Interested>,
    groups: HashMap<GroupId, Interested>,
    group_types: HashMap<GroupTypeId, Interested>,
    any_region: Interested,
    any_compartment: Interested,
    any_group: Interested,
}

#[derive(Debug)]
struct Registration<K> {
    key: K,
    owner: ComponentId,
    trigger: Trigger,
    partition: Box<dyn Partition>,
}

impl<K: Eq + Hash + Clone + Debug> PartitionRegistry<K> {
    /// Create an empty registry that matches the initial members of its partitions with
    /// [`IndexedScan`].
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            partitions: BTreeMap::new(),
            partitions_by_keys: HashMap::with_capacity(config.partition_capacity()),
            next_partition: 0,
            transaction: TransactionId::new(0),
            streams: RandomStreams::new(config.seed()),
            scratch: SamplingScratch::default(),
            matcher: Box::new(IndexedScan),
            regions: HashMap::new(),
            compartments: HashMap::new(),
            properties: HashMap::new(),
            property_values: HashMap::new(),
            resources: HashMap::new(),
            groups: HashMap::new(),
            group_types: HashMap::new(),
            any_region: BTreeSet::new(),
            any_compartment: BTreeSet::new(),
            any_group: BTreeSet::new(),
        }
    }

    /// Replace the matcher used to find the initial members of new partitions.
    pub fn with_matcher<M>(mut self, matcher: M) -> Self
    where
        M: PopulationMatcher + Send + Sync + 'static,
    {
        self.matcher = Box::new(matcher);
        self
    }

    #[inline]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Index the people of `source` according to `descriptor` and register the partition under
    /// `key`.
    ///
    /// The partition starts with the people currently passing its filter; it is then kept up to
    /// date by [`PartitionRegistry::handle()`].
    pub fn add_partition(
        &mut self,
        owner: ComponentId,
        descriptor: PartitionDescriptor,
        key: K,
        source: &dyn AttributeSource,
    ) -> Result<(), PartitionError> {
        if self.partitions_by_keys.contains_key(&key) {
            return Err(PartitionError::DuplicateKey(format!("{key:?}")));
        }

        let trigger = Trigger::for_partition(&descriptor);
        let people = self
            .matcher
            .matching_people(descriptor.filter(), source)?;
        let mut partition = new_partition(descriptor, self.config.person_capacity());
        if self.config.trace_partitions() {
            partition = Box::new(TracedPartition::new(format!("{key:?}"), partition));
        }
        partition.init(source, &people)?;

        let id = self.next_partition;
        self.next_partition += 1;
        self.register(id, &trigger);
        tracing::debug!(
            key = ?key,
            kind = if partition.is_degenerate() { "degenerate" } else { "cells" },
            count = partition.count(),
            trigger = %trigger,
            "added partition"
        );
        self.partitions_by_keys.insert(key.clone(), id);
        self.partitions.insert(
            id,
            Registration {
                key,
                owner,
                trigger,
                partition,
            },
        );
        Ok(())
    }

    /// Drop the partition registered under `key` and stop routing changes to it.
    pub fn remove_partition(&mut self, key: &K) -> Result<(), PartitionError> {
        let id = self.id_of(key)?;
        self.partitions_by_keys.remove(key);
        if let Some(registration) = self.partitions.remove(&id) {
            self.unregister(id, &registration.trigger);
            tracing::debug!(key = ?key, "removed partition");
        }
        Ok(())
    }

    #[inline]
    pub fn partition_exists(&self, key: &K) -> bool {
        self.partitions_by_keys.contains_key(key)
    }

    /// Update every partition the change can affect.
    ///
    /// The change must already have been applied to `source`. The returned [`Report`] lists who
    /// joined or left which partition, in registration order.
    pub fn handle(
        &mut self,
        source: &dyn AttributeSource,
        event: &PopulationEvent,
    ) -> Result<Report<K>, PartitionError> {
        self.transaction = self.transaction.next();
        let transaction = self.transaction;
        let interested = self.interested(source, event)?;
        tracing::trace!(%transaction, %event, partitions = interested.len(), "routing event");

        let person = event.person();
        let mut report = Report::new();
        for id in interested {
            let Some(registration) = self.partitions.get_mut(&id) else {
                unreachable!("partition {id} is routed but not registered; this is a bug");
            };
            if let Some(change) = registration
                .partition
                .handle(source, transaction, event)?
            {
                report.record(registration.key.clone(), person, change);
            }
        }
        Ok(report)
    }

    pub fn people(&self, key: &K) -> Result<Vec<PersonId>, PartitionError> {
        Ok(self.partition(key)?.people())
    }

    /// The members of the cells matching `labels`.
    pub fn people_in(&self, key: &K, labels: &LabelSet) -> Result<Vec<PersonId>, PartitionError> {
        Ok(self.checked(key, labels)?.people_in(labels))
    }

    pub fn count(&self, key: &K) -> Result<usize, PartitionError> {
        Ok(self.partition(key)?.count())
    }

    pub fn count_in(&self, key: &K, labels: &LabelSet) -> Result<usize, PartitionError> {
        Ok(self.checked(key, labels)?.count_in(labels))
    }

    pub fn contains(&self, key: &K, person: PersonId) -> Result<bool, PartitionError> {
        Ok(self.partition(key)?.contains(person))
    }

    pub fn contains_in(
        &self,
        key: &K,
        person: PersonId,
        labels: &LabelSet,
    ) -> Result<bool, PartitionError> {
        Ok(self.checked(key, labels)?.contains_in(person, labels))
    }

    /// Draw a member of the partition.
    ///
    /// An invalid weight yields [`Sample::Rejected`] rather than an error, and a partition without
    /// eligible members yields [`Sample::Empty`].
    pub fn sample_partition(
        &mut self,
        key: &K,
        config: &SamplerConfig,
        source: &dyn AttributeSource,
    ) -> Result<Sample, PartitionError> {
        let id = self.id_of(key)?;
        let Some(registration) = self.partitions.get(&id) else {
            unreachable!("{key:?} is keyed but not registered; this is a bug");
        };
        let partition = registration.partition.as_ref();
        if let Some(labels) = config.labels() {
            check_label_set(partition, labels)?;
        }

        let rng = self.streams.stream(config.random_stream());
        Ok(partition.sample(source, config, &mut self.scratch, rng))
    }

    /// Whether `labels` only names dimensions declared by the partition.
    pub fn validate_label_set(&self, key: &K, labels: &LabelSet) -> Result<bool, PartitionError> {
        Ok(self.partition(key)?.validate_label_set(labels))
    }

    pub fn owning_component(&self, key: &K) -> Result<ComponentId, PartitionError> {
        Ok(self.registration(key)?.owner)
    }

    pub fn is_degenerate(&self, key: &K) -> Result<bool, PartitionError> {
        Ok(self.partition(key)?.is_degenerate())
    }

    /// The attribute changes routed to the partition.
    pub fn trigger(&self, key: &K) -> Result<&Trigger, PartitionError> {
        Ok(&self.registration(key)?.trigger)
    }

    /// The keys of every partition, in registration order.
    pub fn partition_keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.partitions.values().map(|registration| &registration.key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// The random streams samples are drawn from.
    #[inline]
    pub fn random_streams(&mut self) -> &mut RandomStreams {
        &mut self.streams
    }

    fn id_of(&self, key: &K) -> Result<PartitionId, PartitionError> {
        self.partitions_by_keys
            .get(key)
            .copied()
            .ok_or_else(|| PartitionError::UnknownKey(format!("{key:?}")))
    }

    fn registration(&self, key: &K) -> Result<&Registration<K>, PartitionError> {
        let id = self.id_of(key)?;
        match self.partitions.get(&id) {
            Some(registration) => Ok(registration),
            None => unreachable!("{key:?} is keyed but not registered; this is a bug"),
        }
    }

    #[inline]
    fn partition(&self, key: &K) -> Result<&dyn Partition, PartitionError> {
        Ok(self.registration(key)?.partition.as_ref())
    }

    fn checked(&self, key: &K, labels: &LabelSet) -> Result<&dyn Partition, PartitionError> {
        let partition = self.partition(key)?;
        check_label_set(partition, labels)?;
        Ok(partition)
    }

    fn interested(
        &self,
        source: &dyn AttributeSource,
        event: &PopulationEvent,
    ) -> Result<Interested, PartitionError> {
        let mut interested = BTreeSet::new();
        match event {
            PopulationEvent::PersonAdded { .. } | PopulationEvent::PersonRemoved { .. } => {
                interested.extend(self.partitions.keys().copied());
            }
            PopulationEvent::RegionChanged { old, new, .. } => {
                extend(&mut interested, self.regions.get(old));
                extend(&mut interested, self.regions.get(new));
                interested.extend(&self.any_region);
            }
            PopulationEvent::CompartmentChanged { old, new, .. } => {
                extend(&mut interested, self.compartments.get(old));
                extend(&mut interested, self.compartments.get(new));
                interested.extend(&self.any_compartment);
            }
            PopulationEvent::PropertyChanged {
                property, old, new, ..
            } => {
                extend(&mut interested, self.properties.get(property));
                extend(
                    &mut interested,
                    self.property_values.get(&(*property, old.clone())),
                );
                extend(
                    &mut interested,
                    self.property_values.get(&(*property, new.clone())),
                );
            }
            PopulationEvent::ResourceChanged { resource, .. } => {
                extend(&mut interested, self.resources.get(resource));
            }
            PopulationEvent::GroupMemberAdded { group, .. }
            | PopulationEvent::GroupMemberRemoved { group, .. } => {
                let group_type = source.group_type_of(*group)?;
                extend(&mut interested, self.groups.get(group));
                extend(&mut interested, self.group_types.get(&group_type));
                interested.extend(&self.any_group);
            }
        }
        Ok(interested)
    }

    fn register(&mut self, id: PartitionId, trigger: &Trigger) {
        add_to(&mut self.regions, trigger.regions(), id);
        add_to(&mut self.compartments, trigger.compartments(), id);
        add_to(&mut self.properties, trigger.properties(), id);
        add_to(&mut self.property_values, trigger.property_values(), id);
        add_to(&mut self.resources, trigger.resources(), id);
        add_to(&mut self.groups, trigger.groups(), id);
        add_to(&mut self.group_types, trigger.group_types(), id);
        if trigger.any_region() {
            self.any_region.insert(id);
        }
        if trigger.any_compartment() {
            self.any_compartment.insert(id);
        }
        if trigger.any_group() {
            self.any_group.insert(id);
        }
    }

    fn unregister(&mut self, id: PartitionId, trigger: &Trigger) {
        remove_from(&mut self.regions, trigger.regions(), id);
        remove_from(&mut self.compartments, trigger.compartments(), id);
        remove_from(&mut self.properties, trigger.properties(), id);
        remove_from(&mut self.property_values, trigger.property_values(), id);
        remove_from(&mut self.resources, trigger.resources(), id);
        remove_from(&mut self.groups, trigger.groups(), id);
        remove_from(&mut self.group_types, trigger.group_types(), id);
        self.any_region.remove(&id);
        self.any_compartment.remove(&id);
        self.any_group.remove(&id);
    }
}

impl<K: Debug> Debug for PartitionRegistry<K> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PartitionRegistry")
            .field("config", &self.config)
            .field("partitions", &self.partitions)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

fn check_label_set(partition: &dyn Partition, labels: &LabelSet) -> Result<(), PartitionError> {
    if partition.validate_label_set(labels) {
        Ok(())
    } else {
        Err(PartitionError::IncompatibleLabelSet(labels.to_string()))
    }
}

#[inline]
fn extend(interested: &mut Interested, partitions: Option<&Interested>) {
    if let Some(partitions) = partitions {
        interested.extend(partitions);
    }
}

fn add_to<T: Eq + Hash + Clone>(
    map: &mut HashMap<T, Interested>,
    ids: &BTreeSet<T>,
    partition: PartitionId,
) {
    for id in ids {
        map.entry(id.clone()).or_default().insert(partition);
    }
}

fn remove_from<T: Eq + Hash>(
    map: &mut HashMap<T, Interested>,
    ids: &BTreeSet<T>,
    partition: PartitionId,
) {
    for id in ids {
        let Some(partitions) = map.get_mut(id) else {
            unreachable!("a registered trigger has no routing entry; this is a bug");
        };
        partitions.remove(&partition);
        if partitions.is_empty() {
            map.remove(id);
        }
    }
}
