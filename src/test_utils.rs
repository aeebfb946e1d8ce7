use crate::{
    ast::Filter,
    attributes::{
        AttributeSource, CompartmentId, GroupId, GroupTypeId, PersonId, PropertyId, RegionId,
        ResourceId,
    },
    equality::Equality,
    events::PopulationEvent,
    population::{MapOption, Population},
};
use proptest::prelude::*;

pub mod filters {
    macro_rules! or {
        ($left:expr, $right:expr) => {
            $crate::ast::Filter::Or(Box::new($left), Box::new($right))
        };
    }

    macro_rules! and {
        ($left:expr, $right:expr) => {
            $crate::ast::Filter::And(Box::new($left), Box::new($right))
        };
    }

    macro_rules! not {
        ($value:expr) => {
            $crate::ast::Filter::Negate(Box::new($value))
        };
    }

    pub(crate) use and;
    pub(crate) use not;
    pub(crate) use or;
}

pub const AGE: PropertyId = PropertyId::new(0);
pub const VACCINATED: PropertyId = PropertyId::new(1);
pub const MONEY: ResourceId = ResourceId::new(0);
pub const HOUSEHOLD: GroupTypeId = GroupTypeId::new(0);
pub const SCHOOL: GroupTypeId = GroupTypeId::new(1);

const REGIONS: usize = 3;
const COMPARTMENTS: usize = 3;
const GROUPS: usize = 4;

const EQUALITIES: [Equality; 6] = [
    Equality::LessThan,
    Equality::LessThanEqual,
    Equality::Equal,
    Equality::NotEqual,
    Equality::GreaterThanEqual,
    Equality::GreaterThan,
];

/// A population with the attributes the strategies below refer to, and nobody in it.
///
/// Groups alternate between the household and the school types.
pub fn a_population(map_option: MapOption) -> Population {
    let mut population = Population::new(map_option);
    population.define_property(AGE, 0);
    population.define_property(VACCINATED, false);
    population.define_resource(MONEY);
    population.define_group_type(HOUSEHOLD);
    population.define_group_type(SCHOOL);
    for group in 0..GROUPS {
        let group_type = if group % 2 == 0 { HOUSEHOLD } else { SCHOOL };
        population
            .add_group(group_type)
            .expect("the group types are defined above");
    }
    population
}

pub fn an_equality() -> impl Strategy<Value = Equality> {
    prop::sample::select(EQUALITIES.to_vec())
}

fn a_leaf() -> impl Strategy<Value = Filter> {
    prop_oneof![
        Just(Filter::All),
        Just(Filter::None),
        (0..COMPARTMENTS)
            .prop_map(|compartment| Filter::compartment(CompartmentId::new(compartment))),
        prop::collection::btree_set(0..REGIONS, 0..REGIONS)
            .prop_map(|regions| Filter::region(regions.into_iter().map(RegionId::new))),
        (an_equality(), 0..100i64)
            .prop_map(|(equality, age)| Filter::property(AGE, equality, age)),
        (an_equality(), any::<bool>())
            .prop_map(|(equality, vaccinated)| Filter::property(VACCINATED, equality, vaccinated)),
        (an_equality(), 0..10u64)
            .prop_map(|(equality, level)| Filter::resource(MONEY, equality, level)),
        (0..GROUPS).prop_map(|group| Filter::group_member(GroupId::new(group))),
        (an_equality(), 0..3usize)
            .prop_map(|(equality, count)| Filter::groups_for_person(equality, count)),
        (0..2usize, an_equality(), 0..3usize).prop_map(|(group_type, equality, count)| {
            Filter::groups_for_person_and_type(GroupTypeId::new(group_type), equality, count)
        }),
        (an_equality(), 0..3usize)
            .prop_map(|(equality, count)| Filter::group_types_for_person(equality, count)),
    ]
}

/// Any filter over the attributes of [`a_population()`].
pub fn a_filter() -> impl Strategy<Value = Filter> {
    a_leaf().prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(left, right)| left.and(right)),
            (inner.clone(), inner.clone()).prop_map(|(left, right)| left.or(right)),
            inner.prop_map(|value| !value),
        ]
    })
}

/// A population holding a single person with arbitrary attributes.
pub fn a_population_state() -> impl Strategy<Value = (Population, PersonId)> {
    (
        0..REGIONS,
        0..COMPARTMENTS,
        0..100i64,
        any::<bool>(),
        0..10u64,
        prop::collection::btree_set(0..GROUPS, 0..=GROUPS),
    )
        .prop_map(|(region, compartment, age, vaccinated, money, groups)| {
            let mut population = a_population(MapOption::None);
            let person =
                population.add_person(RegionId::new(region), CompartmentId::new(compartment));
            population.set_property(person, AGE, age).unwrap();
            population.set_property(person, VACCINATED, vaccinated).unwrap();
            population.set_resource_level(person, MONEY, money).unwrap();
            for group in groups {
                population.add_to_group(person, GroupId::new(group)).unwrap();
            }
            (population, person)
        })
}

/// One change to a population.
///
/// People are designated by a selector that is resolved against the people alive at the time the
/// mutation is applied.
#[derive(Clone, Debug)]
pub enum Mutation {
    AddPerson(usize, usize),
    RemovePerson(usize),
    SetRegion(usize, usize),
    SetCompartment(usize, usize),
    SetAge(usize, i64),
    SetVaccinated(usize, bool),
    SetMoney(usize, u64),
    JoinGroup(usize, usize),
    LeaveGroup(usize, usize),
}

impl Mutation {
    /// Apply the mutation and describe it, or do nothing if it does not apply.
    pub fn apply(&self, population: &mut Population) -> Option<PopulationEvent> {
        let people = population.people();
        let select =
            |selector: usize| (!people.is_empty()).then(|| people[selector % people.len()]);
        match *self {
            Self::AddPerson(region, compartment) => {
                let person =
                    population.add_person(RegionId::new(region), CompartmentId::new(compartment));
                Some(PopulationEvent::PersonAdded { person })
            }
            Self::RemovePerson(selector) => {
                let person = select(selector)?;
                population.remove_person(person).unwrap();
                Some(PopulationEvent::PersonRemoved { person })
            }
            Self::SetRegion(selector, region) => {
                let person = select(selector)?;
                let new = RegionId::new(region);
                let old = population.set_region(person, new).unwrap();
                Some(PopulationEvent::RegionChanged { person, old, new })
            }
            Self::SetCompartment(selector, compartment) => {
                let person = select(selector)?;
                let new = CompartmentId::new(compartment);
                let old = population.set_compartment(person, new).unwrap();
                Some(PopulationEvent::CompartmentChanged { person, old, new })
            }
            Self::SetAge(selector, age) => {
                let person = select(selector)?;
                let old = population.set_property(person, AGE, age).unwrap();
                Some(PopulationEvent::PropertyChanged {
                    person,
                    property: AGE,
                    old,
                    new: age.into(),
                })
            }
            Self::SetVaccinated(selector, vaccinated) => {
                let person = select(selector)?;
                let old = population.set_property(person, VACCINATED, vaccinated).unwrap();
                Some(PopulationEvent::PropertyChanged {
                    person,
                    property: VACCINATED,
                    old,
                    new: vaccinated.into(),
                })
            }
            Self::SetMoney(selector, level) => {
                let person = select(selector)?;
                population.set_resource_level(person, MONEY, level).unwrap();
                Some(PopulationEvent::ResourceChanged {
                    person,
                    resource: MONEY,
                })
            }
            Self::JoinGroup(selector, group) => {
                let person = select(selector)?;
                let group = GroupId::new(group);
                population
                    .add_to_group(person, group)
                    .unwrap()
                    .then_some(PopulationEvent::GroupMemberAdded { person, group })
            }
            Self::LeaveGroup(selector, group) => {
                let person = select(selector)?;
                let group = GroupId::new(group);
                population
                    .remove_from_group(person, group)
                    .unwrap()
                    .then_some(PopulationEvent::GroupMemberRemoved { person, group })
            }
        }
    }
}

pub fn a_mutation() -> impl Strategy<Value = Mutation> {
    let selector = any::<usize>();
    prop_oneof![
        3 => (0..REGIONS, 0..COMPARTMENTS)
            .prop_map(|(region, compartment)| Mutation::AddPerson(region, compartment)),
        1 => selector.clone().prop_map(Mutation::RemovePerson),
        2 => (selector.clone(), 0..REGIONS)
            .prop_map(|(person, region)| Mutation::SetRegion(person, region)),
        2 => (selector.clone(), 0..COMPARTMENTS)
            .prop_map(|(person, compartment)| Mutation::SetCompartment(person, compartment)),
        3 => (selector.clone(), 0..100i64).prop_map(|(person, age)| Mutation::SetAge(person, age)),
        2 => (selector.clone(), any::<bool>())
            .prop_map(|(person, vaccinated)| Mutation::SetVaccinated(person, vaccinated)),
        2 => (selector.clone(), 0..10u64)
            .prop_map(|(person, level)| Mutation::SetMoney(person, level)),
        2 => (selector.clone(), 0..GROUPS)
            .prop_map(|(person, group)| Mutation::JoinGroup(person, group)),
        2 => (selector, 0..GROUPS).prop_map(|(person, group)| Mutation::LeaveGroup(person, group)),
    ]
}

/// Every person of the population for which the filter holds.
pub fn matching(population: &Population, filter: &Filter) -> Vec<PersonId> {
    population
        .people()
        .into_iter()
        .filter(|person| filter.evaluate(population, *person).unwrap())
        .collect()
}
