use crate::{
    ast::{CanonicalFilter, Filter},
    attributes::{AttributeSource, IndexProbe, PersonId},
    equality::Equality,
    error::AttributeError,
    evaluation::FilterEvaluator,
};

/// Finds the people matching a filter when a partition is created.
pub trait PopulationMatcher {
    /// Every person passing `filter`, in ascending id order.
    fn matching_people(
        &self,
        filter: &CanonicalFilter,
        source: &dyn AttributeSource,
    ) -> Result<Vec<PersonId>, AttributeError>;
}

/// The default [`PopulationMatcher`].
///
/// When the filter requires a region, a compartment or a property value that the attribute source
/// keeps a reverse index for, only the people of that index are tested; everyone is tested
/// otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexedScan;

impl PopulationMatcher for IndexedScan {
    fn matching_people(
        &self,
        filter: &CanonicalFilter,
        source: &dyn AttributeSource,
    ) -> Result<Vec<PersonId>, AttributeError> {
        if filter.is_none() {
            return Ok(vec![]);
        }

        let candidates =
            smallest_candidates(filter.root(), source).unwrap_or_else(|| source.people());
        if filter.is_all() {
            return Ok(candidates);
        }

        let evaluator = FilterEvaluator::new(filter);
        let mut people = Vec::with_capacity(candidates.len());
        for person in candidates {
            if evaluator.evaluate(source, person)? {
                people.push(person);
            }
        }
        Ok(people)
    }
}

/// The smallest candidate set among the indexed leaves every match must satisfy.
fn smallest_candidates(filter: &Filter, source: &dyn AttributeSource) -> Option<Vec<PersonId>> {
    let mut probes = Vec::new();
    required_probes(filter, &mut probes);
    probes
        .iter()
        .filter_map(|probes| {
            let mut people = Vec::new();
            for probe in probes {
                people.extend(source.indexed_people(probe)?);
            }
            Some(people)
        })
        .min_by_key(Vec::len)
        .map(|mut people| {
            people.sort_unstable();
            people.dedup();
            people
        })
}

/// Collect, for every leaf on the conjunction spine of the filter, the probes whose union
/// contains every person passing the leaf.
fn required_probes(filter: &Filter, probes: &mut Vec<Vec<IndexProbe>>) {
    match filter {
        Filter::And(left, right) => {
            required_probes(left, probes);
            required_probes(right, probes);
        }
        Filter::Compartment(compartment) => {
            probes.push(vec![IndexProbe::Compartment(*compartment)]);
        }
        Filter::Region(regions) => {
            probes.push(regions.iter().map(|region| IndexProbe::Region(*region)).collect());
        }
        Filter::Property(property, Equality::Equal, value) => {
            probes.push(vec![IndexProbe::Property(*property, value.clone())]);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attributes::{CompartmentId, GroupId, GroupTypeId, PropertyId, RegionId, Value},
        population::{MapOption, Population},
        test_utils::{a_filter, a_mutation, a_population, filters::and, matching},
    };
    use proptest::prelude::*;
    use std::cell::Cell;

    const AGE: PropertyId = PropertyId::new(0);
    const NORTH: RegionId = RegionId::new(0);
    const SOUTH: RegionId = RegionId::new(1);
    const HEALTHY: CompartmentId = CompartmentId::new(0);
    const SICK: CompartmentId = CompartmentId::new(1);

    /// Counts how many times the matcher enumerated the whole population.
    struct Spy<'a> {
        population: &'a Population,
        scans: Cell<usize>,
    }

    impl AttributeSource for Spy<'_> {
        fn people(&self) -> Vec<PersonId> {
            self.scans.set(self.scans.get() + 1);
            self.population.people()
        }

        fn contains_person(&self, person: PersonId) -> bool {
            self.population.contains_person(person)
        }

        fn region_of(&self, person: PersonId) -> Result<RegionId, AttributeError> {
            self.population.region_of(person)
        }

        fn compartment_of(&self, person: PersonId) -> Result<CompartmentId, AttributeError> {
            self.population.compartment_of(person)
        }

        fn property_value(
            &self,
            person: PersonId,
            property: PropertyId,
        ) -> Result<Value, AttributeError> {
            self.population.property_value(person, property)
        }

        fn resource_level(
            &self,
            person: PersonId,
            resource: crate::attributes::ResourceId,
        ) -> Result<u64, AttributeError> {
            self.population.resource_level(person, resource)
        }

        fn is_group_member(
            &self,
            person: PersonId,
            group: GroupId,
        ) -> Result<bool, AttributeError> {
            self.population.is_group_member(person, group)
        }

        fn group_type_of(&self, group: GroupId) -> Result<GroupTypeId, AttributeError> {
            self.population.group_type_of(group)
        }

        fn group_count_for_person_and_type(
            &self,
            person: PersonId,
            group_type: GroupTypeId,
        ) -> Result<usize, AttributeError> {
            self.population
                .group_count_for_person_and_type(person, group_type)
        }

        fn group_count_for_person(&self, person: PersonId) -> Result<usize, AttributeError> {
            self.population.group_count_for_person(person)
        }

        fn group_type_count_for_person(&self, person: PersonId) -> Result<usize, AttributeError> {
            self.population.group_type_count_for_person(person)
        }

        fn property_ids(&self) -> Vec<PropertyId> {
            self.population.property_ids()
        }

        fn resource_ids(&self) -> Vec<crate::attributes::ResourceId> {
            self.population.resource_ids()
        }

        fn group_type_ids(&self) -> Vec<GroupTypeId> {
            self.population.group_type_ids()
        }

        fn indexed_people(&self, probe: &IndexProbe) -> Option<Vec<PersonId>> {
            self.population.indexed_people(probe)
        }
    }

    fn a_small_town(map_option: MapOption) -> Population {
        let mut population = Population::new(map_option);
        population.define_property(AGE, 0);
        for (region, compartment, age) in [
            (NORTH, HEALTHY, 10),
            (NORTH, SICK, 40),
            (SOUTH, SICK, 70),
            (SOUTH, HEALTHY, 40),
        ] {
            let person = population.add_person(region, compartment);
            population.set_property(person, AGE, age).unwrap();
        }
        population
    }

    #[test]
    fn a_statically_false_filter_matches_nobody() {
        let population = a_small_town(MapOption::None);

        let people = IndexedScan
            .matching_people(&Filter::None.canonicalize(), &population)
            .unwrap();

        assert!(people.is_empty());
    }

    #[test]
    fn an_unfiltered_partition_matches_everyone() {
        let population = a_small_town(MapOption::None);

        let people = IndexedScan
            .matching_people(&Filter::All.canonicalize(), &population)
            .unwrap();

        assert_eq!(4, people.len());
    }

    #[test]
    fn use_the_index_of_a_required_leaf() {
        let population = a_small_town(MapOption::Indexed);
        let spy = Spy {
            population: &population,
            scans: Cell::new(0),
        };
        let filter = and!(
            Filter::compartment(SICK),
            Filter::property(AGE, Equality::Equal, 40)
        );

        let people = IndexedScan
            .matching_people(&filter.canonicalize(), &spy)
            .unwrap();

        assert_eq!(vec![PersonId::new(1)], people);
        assert_eq!(0, spy.scans.get());
    }

    #[test]
    fn scan_everyone_without_an_index() {
        let population = a_small_town(MapOption::None);
        let spy = Spy {
            population: &population,
            scans: Cell::new(0),
        };

        let people = IndexedScan
            .matching_people(&Filter::region([SOUTH]).canonicalize(), &spy)
            .unwrap();

        assert_eq!(vec![PersonId::new(2), PersonId::new(3)], people);
        assert_eq!(1, spy.scans.get());
    }

    #[test]
    fn scan_everyone_when_no_leaf_is_required() {
        let population = a_small_town(MapOption::Indexed);
        let spy = Spy {
            population: &population,
            scans: Cell::new(0),
        };
        let filter = Filter::region([NORTH]).or(Filter::property(AGE, Equality::GreaterThan, 60));

        let people = IndexedScan
            .matching_people(&filter.canonicalize(), &spy)
            .unwrap();

        assert_eq!(vec![PersonId::new(0), PersonId::new(1), PersonId::new(2)], people);
        assert_eq!(1, spy.scans.get());
    }

    proptest! {
        #[test]
        #[cfg_attr(miri, ignore)]
        fn indexed_and_plain_matching_agree(filter in a_filter(), mutations in prop::collection::vec(a_mutation(), 1..40)) {
            let mut plain = a_population(MapOption::None);
            let mut indexed = a_population(MapOption::Indexed);
            for mutation in &mutations {
                mutation.apply(&mut plain);
                mutation.apply(&mut indexed);
            }
            let canonical = filter.clone().canonicalize();

            let expected = matching(&plain, &filter);

            prop_assert_eq!(&expected, &IndexedScan.matching_people(&canonical, &plain).unwrap());
            prop_assert_eq!(&expected, &IndexedScan.matching_people(&canonical, &indexed).unwrap());
        }
    }
}
