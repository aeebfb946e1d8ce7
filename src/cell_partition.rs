use crate::{
    attributes::{AttributeSource, PersonId},
    descriptor::{PartitionDescriptor, Slot},
    error::PartitionError,
    evaluation::FilterEvaluator,
    events::{MembershipChange, PopulationEvent, TransactionId},
    keys::{is_consistent, CellId, CellTable},
    labels::{Label, LabelSet},
    partition::{passes, Partition, TransactionLog},
    people_set::PersonSet,
    sampling::{sample_cells, Sample, SamplerConfig, SamplingScratch},
};
use rand::RngCore;

/// A partition whose members are split into cells keyed by the labels of its dimensions.
///
/// A person is mapped to a cell exactly while they pass the filter. A change of a dimension only
/// recomputes the label of that dimension and moves the person when the label differs.
#[derive(Debug)]
pub(crate) struct CellPartition {
    descriptor: PartitionDescriptor,
    evaluator: FilterEvaluator,
    cells: CellTable,
    cells_by_people: Vec<Option<CellId>>,
    transactions: TransactionLog,
    size: usize,
}

impl CellPartition {
    pub(crate) fn new(descriptor: PartitionDescriptor, person_capacity: usize) -> Self {
        Self {
            evaluator: FilterEvaluator::new(descriptor.filter()),
            cells: CellTable::new(descriptor.slots().len()),
            descriptor,
            cells_by_people: Vec::with_capacity(person_capacity),
            transactions: TransactionLog::with_capacity(person_capacity),
            size: 0,
        }
    }

    #[inline]
    fn cell_of(&self, person: PersonId) -> Option<CellId> {
        self.cells_by_people.get(person.index()).copied().flatten()
    }

    fn set_cell(&mut self, person: PersonId, cell: Option<CellId>) {
        let index = person.index();
        if index >= self.cells_by_people.len() {
            self.cells_by_people.resize(index + 1, None);
        }
        self.cells_by_people[index] = cell;
    }

    fn join(
        &mut self,
        source: &dyn AttributeSource,
        person: PersonId,
    ) -> Result<(), PartitionError> {
        let key = self.descriptor.key(source, person)?;
        let cell = self.cells.insert(&key, person);
        self.set_cell(person, Some(cell));
        self.size += 1;
        tracing::trace!(%person, cell = ?key, "joined");
        Ok(())
    }

    fn leave(&mut self, person: PersonId) -> bool {
        let Some(cell) = self.cell_of(person) else {
            return false;
        };
        self.cells.remove(cell, person);
        self.set_cell(person, None);
        self.size -= 1;
        tracing::trace!(%person, "left");
        true
    }

    /// The key positions a change can affect for a person who stays a member.
    fn affected_slots(&self, event: &PopulationEvent) -> Vec<usize> {
        let slot = match event {
            PopulationEvent::PersonAdded { .. } => {
                return (0..self.descriptor.slots().len()).collect()
            }
            PopulationEvent::PersonRemoved { .. } => None,
            PopulationEvent::RegionChanged { .. } => self.descriptor.slot_of(Slot::Region),
            PopulationEvent::CompartmentChanged { .. } => {
                self.descriptor.slot_of(Slot::Compartment)
            }
            PopulationEvent::PropertyChanged { property, .. } => {
                self.descriptor.property_slot(*property)
            }
            PopulationEvent::ResourceChanged { resource, .. } => {
                self.descriptor.resource_slot(*resource)
            }
            PopulationEvent::GroupMemberAdded { .. }
            | PopulationEvent::GroupMemberRemoved { .. } => self.descriptor.slot_of(Slot::Group),
        };
        slot.into_iter().collect()
    }

    /// Move a member to the cell matching their current labels.
    fn relabel(
        &mut self,
        source: &dyn AttributeSource,
        person: PersonId,
        cell: CellId,
        event: &PopulationEvent,
    ) -> Result<(), PartitionError> {
        let mut new_key: Option<Vec<Label>> = None;
        let old_key = self.cells.cell(cell).key();
        for slot in self.affected_slots(event) {
            let label = self
                .descriptor
                .label(self.descriptor.slots()[slot], source, person)?;
            if label != old_key[slot] {
                new_key.get_or_insert_with(|| old_key.to_vec())[slot] = label;
            }
        }
        let Some(new_key) = new_key else {
            return Ok(());
        };

        let new_cell = self.cells.insert(&new_key, person);
        self.cells.remove(cell, person);
        self.set_cell(person, Some(new_cell));
        tracing::trace!(%person, cell = ?new_key, "moved");
        Ok(())
    }

    fn matching_cells(&self, labels: &LabelSet) -> Vec<CellId> {
        self.cells.matching(&self.descriptor.constraints(labels))
    }

    fn members(&self, cells: &[CellId]) -> Vec<PersonId> {
        cells
            .iter()
            .flat_map(|cell| self.cells.cell(*cell).members().as_slice())
            .copied()
            .collect()
    }
}

impl Partition for CellPartition {
    #[inline]
    fn descriptor(&self) -> &PartitionDescriptor {
        &self.descriptor
    }

    #[inline]
    fn is_degenerate(&self) -> bool {
        false
    }

    fn init(
        &mut self,
        source: &dyn AttributeSource,
        people: &[PersonId],
    ) -> Result<(), PartitionError> {
        for person in people {
            if self.cell_of(*person).is_none() {
                self.join(source, *person)?;
            }
        }
        Ok(())
    }

    fn handle(
        &mut self,
        source: &dyn AttributeSource,
        transaction: TransactionId,
        event: &PopulationEvent,
    ) -> Result<Option<MembershipChange>, PartitionError> {
        let person = event.person();
        if !self.transactions.record(person, transaction) {
            return Ok(None);
        }

        let passing = passes(&self.evaluator, source, event)?;
        match (passing, self.cell_of(person)) {
            (false, None) => Ok(None),
            (false, Some(_)) => {
                self.leave(person);
                Ok(Some(MembershipChange::Left))
            }
            (true, None) => {
                self.join(source, person)?;
                Ok(Some(MembershipChange::Joined))
            }
            (true, Some(cell)) => {
                self.relabel(source, person, cell, event)?;
                Ok(None)
            }
        }
    }

    #[inline]
    fn contains(&self, person: PersonId) -> bool {
        self.cell_of(person).is_some()
    }

    fn contains_in(&self, person: PersonId, labels: &LabelSet) -> bool {
        self.cell_of(person).is_some_and(|cell| {
            is_consistent(
                self.cells.cell(cell).key(),
                &self.descriptor.constraints(labels),
            )
        })
    }

    #[inline]
    fn count(&self) -> usize {
        self.size
    }

    fn count_in(&self, labels: &LabelSet) -> usize {
        self.matching_cells(labels)
            .iter()
            .map(|cell| self.cells.cell(*cell).members().len())
            .sum()
    }

    fn people(&self) -> Vec<PersonId> {
        self.cells
            .iter()
            .flat_map(|(_, cell)| cell.members().as_slice())
            .copied()
            .collect()
    }

    fn people_in(&self, labels: &LabelSet) -> Vec<PersonId> {
        self.members(&self.matching_cells(labels))
    }

    fn sample(
        &self,
        source: &dyn AttributeSource,
        config: &SamplerConfig,
        scratch: &mut SamplingScratch,
        rng: &mut dyn RngCore,
    ) -> Sample {
        let cells: Vec<CellId> = match config.labels() {
            Some(labels) => self.matching_cells(labels),
            None => self.cells.iter().map(|(id, _)| id).collect(),
        };
        let members: Vec<&PersonSet> = cells
            .iter()
            .map(|cell| self.cells.cell(*cell).members())
            .collect();
        let label_set = |position: usize| {
            self.descriptor
                .label_set(self.cells.cell(cells[position]).key())
        };
        sample_cells(&members, label_set, config, source, scratch, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::Filter,
        attributes::{CompartmentId, GroupId, RegionId, Value},
        descriptor::PartitionSpec,
        equality::Equality,
        labels::GroupTypeCountMap,
        population::{MapOption, Population},
        test_utils::{
            a_filter, a_mutation, a_population, matching, AGE, HOUSEHOLD, MONEY, VACCINATED,
        },
    };
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    const NORTH: RegionId = RegionId::new(0);
    const SOUTH: RegionId = RegionId::new(1);
    const A_COMPARTMENT: CompartmentId = CompartmentId::new(0);
    const A_HOUSEHOLD: GroupId = GroupId::new(0);

    fn age_group(age: &Value) -> Option<Label> {
        match age {
            Value::Integer(age) if *age < 18 => Some(Label::from("child")),
            Value::Integer(age) if *age < 65 => Some(Label::from("adult")),
            Value::Integer(_) => Some(Label::from("senior")),
            _ => None,
        }
    }

    fn a_region_by_age_spec() -> PartitionSpec {
        PartitionSpec::new()
            .region(|region| Some(Label::from(region)))
            .property(AGE, age_group)
    }

    struct Fixture {
        population: Population,
        partition: CellPartition,
        transaction: TransactionId,
    }

    impl Fixture {
        fn new(spec: PartitionSpec) -> Self {
            Self {
                population: a_population(MapOption::None),
                partition: CellPartition::new(spec.build().unwrap(), 0),
                transaction: TransactionId::new(0),
            }
        }

        fn deliver(&mut self, event: &PopulationEvent) -> Option<MembershipChange> {
            self.transaction = self.transaction.next();
            self.partition
                .handle(&self.population, self.transaction, event)
                .unwrap()
        }

        fn add(&mut self, region: RegionId, age: i64) -> PersonId {
            let person = self.population.add_person(region, A_COMPARTMENT);
            self.population.set_property(person, AGE, age).unwrap();
            self.deliver(&PopulationEvent::PersonAdded { person });
            person
        }

        fn set_age(&mut self, person: PersonId, age: i64) -> Option<MembershipChange> {
            let old = self.population.set_property(person, AGE, age).unwrap();
            self.deliver(&PopulationEvent::PropertyChanged {
                person,
                property: AGE,
                old,
                new: Value::from(age),
            })
        }

        fn set_region(&mut self, person: PersonId, region: RegionId) -> Option<MembershipChange> {
            let old = self.population.set_region(person, region).unwrap();
            self.deliver(&PopulationEvent::RegionChanged {
                person,
                old,
                new: region,
            })
        }
    }

    fn sorted(mut people: Vec<PersonId>) -> Vec<PersonId> {
        people.sort_unstable();
        people
    }

    #[test]
    fn members_are_split_by_their_labels() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        let a_child = fixture.add(NORTH, 5);
        let an_adult = fixture.add(NORTH, 30);
        let another_adult = fixture.add(SOUTH, 40);

        let adults = LabelSet::new().with_property(AGE, "adult");
        let northern_adults = adults.clone().with_region(NORTH);

        assert_eq!(3, fixture.partition.count());
        assert_eq!(3, fixture.partition.cells.len());
        assert_eq!(2, fixture.partition.count_in(&adults));
        assert_eq!(vec![an_adult], fixture.partition.people_in(&northern_adults));
        assert!(fixture.partition.contains_in(a_child, &LabelSet::new().with_region(NORTH)));
        assert!(!fixture.partition.contains_in(another_adult, &northern_adults));
    }

    #[test]
    fn a_dimension_change_moves_the_person_to_another_cell() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        let person = fixture.add(NORTH, 17);

        let change = fixture.set_age(person, 18);

        assert_eq!(None, change);
        let adults = LabelSet::new().with_property(AGE, "adult");
        assert_eq!(vec![person], fixture.partition.people_in(&adults));
        assert_eq!(1, fixture.partition.cells.len());
        assert!(!fixture
            .partition
            .cells
            .label_manager(1)
            .contains(&Label::from("child")));
    }

    #[test]
    fn a_change_within_the_same_label_keeps_the_cell() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        let person = fixture.add(NORTH, 20);
        let cell = fixture.partition.cell_of(person);

        fixture.set_age(person, 21);

        assert_eq!(cell, fixture.partition.cell_of(person));
    }

    #[test]
    fn a_region_change_moves_the_person() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        let person = fixture.add(NORTH, 20);
        fixture.add(NORTH, 25);

        fixture.set_region(person, SOUTH);

        let southerners = LabelSet::new().with_region(SOUTH);
        assert_eq!(vec![person], fixture.partition.people_in(&southerners));
        assert_eq!(
            2,
            fixture
                .partition
                .cells
                .label_manager(1)
                .references(&Label::from("adult"))
        );
    }

    #[test]
    fn the_filter_decides_membership() {
        let spec =
            a_region_by_age_spec().filter(Filter::property(VACCINATED, Equality::Equal, true));
        let mut fixture = Fixture::new(spec);
        let person = fixture.add(NORTH, 20);
        assert!(!fixture.partition.contains(person));

        fixture.population.set_property(person, VACCINATED, true).unwrap();
        let change = fixture.deliver(&PopulationEvent::PropertyChanged {
            person,
            property: VACCINATED,
            old: Value::from(false),
            new: Value::from(true),
        });

        assert_eq!(Some(MembershipChange::Joined), change);
        assert!(fixture.partition.contains(person));
    }

    #[test]
    fn group_counts_can_label_a_dimension() {
        let spec = PartitionSpec::new().group(|counts| Some(Label::from(counts.clone())));
        let mut fixture = Fixture::new(spec);
        let person = fixture.add(NORTH, 20);

        fixture.population.add_to_group(person, A_HOUSEHOLD).unwrap();
        fixture.deliver(&PopulationEvent::GroupMemberAdded {
            person,
            group: A_HOUSEHOLD,
        });

        let in_a_household = LabelSet::new().with_group(GroupTypeCountMap::new([(HOUSEHOLD, 1)]));
        let in_no_group = LabelSet::new().with_group(GroupTypeCountMap::default());
        assert_eq!(vec![person], fixture.partition.people_in(&in_a_household));
        assert_eq!(0, fixture.partition.count_in(&in_no_group));
    }

    #[test]
    fn a_resource_dimension_follows_the_level() {
        let spec = PartitionSpec::new().resource(MONEY, |level| Some(Label::from(level >= 5)));
        let mut fixture = Fixture::new(spec);
        let person = fixture.add(NORTH, 20);

        fixture.population.set_resource_level(person, MONEY, 7).unwrap();
        fixture.deliver(&PopulationEvent::ResourceChanged {
            person,
            resource: MONEY,
        });

        let rich = LabelSet::new().with_resource(MONEY, true);
        assert!(fixture.partition.contains_in(person, &rich));
    }

    #[test]
    fn return_an_error_when_a_changed_dimension_has_no_label() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        let person = fixture.add(NORTH, 20);
        fixture.population.define_property(AGE, "unknown");
        let old = fixture.population.set_property(person, AGE, "unknown").unwrap();
        fixture.transaction = fixture.transaction.next();

        let result = fixture.partition.handle(
            &fixture.population,
            fixture.transaction,
            &PopulationEvent::PropertyChanged {
                person,
                property: AGE,
                old,
                new: Value::from("unknown"),
            },
        );

        assert!(matches!(
            result,
            Err(PartitionError::MissingLabel {
                dimension: "property",
                ..
            })
        ));
    }

    #[test]
    fn a_removed_person_leaves_their_cell() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        let person = fixture.add(NORTH, 20);

        fixture.population.remove_person(person).unwrap();
        let change = fixture.deliver(&PopulationEvent::PersonRemoved { person });

        assert_eq!(Some(MembershipChange::Left), change);
        assert_eq!(0, fixture.partition.cells.len());
        assert_eq!(0, fixture.partition.count());
    }

    #[test]
    fn sampling_respects_the_label_restriction() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        fixture.add(NORTH, 5);
        let an_adult = fixture.add(SOUTH, 30);
        let config =
            SamplerConfig::new().with_labels(LabelSet::new().with_property(AGE, "adult"));
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..20 {
            let sample = fixture.partition.sample(
                &fixture.population,
                &config,
                &mut SamplingScratch::default(),
                &mut rng,
            );
            assert_eq!(Sample::Chosen(an_adult), sample);
        }
    }

    #[test]
    fn weights_receive_the_labels_of_each_cell() {
        let mut fixture = Fixture::new(a_region_by_age_spec());
        fixture.add(NORTH, 5);
        let a_southerner = fixture.add(SOUTH, 30);
        let config = SamplerConfig::new().with_weight(|_, labels| {
            if labels.region() == Some(&Label::from(SOUTH)) {
                1.0
            } else {
                0.0
            }
        });
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let sample = fixture.partition.sample(
            &fixture.population,
            &config,
            &mut SamplingScratch::default(),
            &mut rng,
        );

        assert_eq!(Sample::Chosen(a_southerner), sample);
    }

    proptest! {
        #[test]
        #[cfg_attr(miri, ignore)]
        fn membership_follows_the_filter_and_cells_partition_the_members(filter in a_filter(), mutations in prop::collection::vec(a_mutation(), 1..60)) {
            let spec = PartitionSpec::new()
                .region(|region| Some(Label::from(region)))
                .property(AGE, age_group)
                .resource(MONEY, |level| Some(Label::from(level >= 5)))
                .group(|counts| Some(Label::from(counts.clone())))
                .filter(filter.clone());
            let mut fixture = Fixture::new(spec);

            for mutation in &mutations {
                if let Some(event) = mutation.apply(&mut fixture.population) {
                    fixture.deliver(&event);
                }
            }

            let expected = matching(&fixture.population, &filter);
            prop_assert_eq!(&expected, &sorted(fixture.partition.people()));
            prop_assert_eq!(expected.len(), fixture.partition.count());
            let mut seen = BTreeSet::new();
            for (_, cell) in fixture.partition.cells.iter() {
                prop_assert!(!cell.members().is_empty());
                for person in cell.members().as_slice() {
                    prop_assert!(seen.insert(*person));
                    let key = fixture
                        .partition
                        .descriptor
                        .key(&fixture.population, *person)
                        .unwrap();
                    prop_assert_eq!(&key[..], cell.key());
                }
            }
            prop_assert_eq!(expected.len(), seen.len());
        }

        #[test]
        #[cfg_attr(miri, ignore)]
        fn label_references_count_the_live_cells(mutations in prop::collection::vec(a_mutation(), 1..60)) {
            let mut fixture = Fixture::new(a_region_by_age_spec());

            for mutation in &mutations {
                if let Some(event) = mutation.apply(&mut fixture.population) {
                    fixture.deliver(&event);
                }
            }

            for slot in 0..2 {
                let manager = fixture.partition.cells.label_manager(slot);
                for label in manager.labels() {
                    let cells = fixture
                        .partition
                        .cells
                        .iter()
                        .filter(|(_, cell)| &cell.key()[slot] == label)
                        .count();
                    prop_assert_eq!(cells, manager.references(label));
                }
            }
        }

        #[test]
        #[cfg_attr(miri, ignore)]
        fn delivering_an_event_twice_is_the_same_as_delivering_it_once(mutations in prop::collection::vec(a_mutation(), 1..40)) {
            let mut once = Fixture::new(a_region_by_age_spec());
            let mut twice = Fixture::new(a_region_by_age_spec());

            for mutation in &mutations {
                let event = mutation.apply(&mut once.population);
                mutation.apply(&mut twice.population);
                if let Some(event) = event {
                    once.deliver(&event);
                    twice.deliver(&event);
                    twice
                        .partition
                        .handle(&twice.population, twice.transaction, &event)
                        .unwrap();
                }
            }

            prop_assert_eq!(sorted(once.partition.people()), sorted(twice.partition.people()));
            prop_assert_eq!(once.partition.cells.len(), twice.partition.cells.len());
        }
    }
}
