//! Incrementally maintained filter and partition indexes over the population of an agent-based
//! simulation.
//!
//! A partition is the set of people passing a [`Filter`], optionally split into cells by the
//! labels that dimension functions derive from their region, compartment, property values,
//! resource levels and group memberships. The [`PartitionRegistry`] keeps every partition up to
//! date as the population changes, so that simulation components can count, list and sample the
//! people of a cell without scanning the population.
//!
//! # Examples
//!
//! Splitting the vaccinated people by region and sampling one of them:
//!
//! ```
//! use partition_index::{
//!     AttributeSource, CompartmentId, ComponentId, Equality, Filter, Label, LabelSet, MapOption,
//!     PartitionRegistry, PartitionSpec, Population, PopulationEvent, PropertyId, RegionId,
//!     RegistryConfig, SamplerConfig,
//! };
//!
//! const VACCINATED: PropertyId = PropertyId::new(0);
//! const NORTH: RegionId = RegionId::new(0);
//! const SOUTH: RegionId = RegionId::new(1);
//!
//! let mut population = Population::new(MapOption::Indexed);
//! population.define_property(VACCINATED, false);
//! let mut registry = PartitionRegistry::new(RegistryConfig::default().with_seed(42));
//!
//! let vaccinated = PartitionSpec::new()
//!     .region(|region| Some(Label::from(region)))
//!     .filter(Filter::property(VACCINATED, Equality::Equal, true))
//!     .build()
//!     .unwrap();
//! registry
//!     .add_partition(ComponentId::new(0), vaccinated, "vaccinated", &population)
//!     .unwrap();
//!
//! for region in [NORTH, SOUTH, SOUTH] {
//!     let person = population.add_person(region, CompartmentId::new(0));
//!     registry
//!         .handle(&population, &PopulationEvent::PersonAdded { person })
//!         .unwrap();
//!     let old = population.set_property(person, VACCINATED, true).unwrap();
//!     let event = PopulationEvent::PropertyChanged {
//!         person,
//!         property: VACCINATED,
//!         old,
//!         new: true.into(),
//!     };
//!     registry.handle(&population, &event).unwrap();
//! }
//!
//! let south = LabelSet::new().with_region(SOUTH);
//! assert_eq!(3, registry.count(&"vaccinated").unwrap());
//! assert_eq!(2, registry.count_in(&"vaccinated", &south).unwrap());
//!
//! let sample = registry
//!     .sample_partition(
//!         &"vaccinated",
//!         &SamplerConfig::new().with_labels(south),
//!         &population,
//!     )
//!     .unwrap();
//! let person = sample.person().unwrap();
//! assert_eq!(SOUTH, population.region_of(person).unwrap());
//! ```
//!
//! # Filters
//!
//! Filters are built from the following leaves and combined with `and`, `or` and `!`:
//!
//! * `Compartment`: the person is in a compartment;
//! * `Region`: the person is in one of a set of regions;
//! * `Property`: a property value compared with a literal;
//! * `Resource`: a resource level compared with a literal;
//! * `GroupMember`: the person belongs to a group;
//! * `GroupsForPerson`, `GroupsForPersonAndType` and `GroupTypesForPerson`: group counts compared
//!   with a literal.
//!
//! # Routing
//!
//! Before a partition is registered, its filter is canonicalized and analyzed to find which
//! attribute changes can alter its outcome (its [`Trigger`]):
//!
//! * Constant sub-expressions are folded away;
//! * A property compared for (in)equality, once the negations above it are accounted for, is only
//!   watched for changes to or from its literal;
//! * A dimension watches every change of its attribute, so that members always sit in the right
//!   cell;
//! * A partition without any sensitivity only hears about people joining or leaving the
//!   population.
mod ast;
mod attributes;
mod cell_partition;
mod config;
mod degenerate;
mod descriptor;
mod equality;
mod error;
mod evaluation;
mod events;
mod keys;
mod labels;
mod matcher;
mod partition;
mod people_set;
mod population;
mod random;
mod registry;
mod sampling;
#[cfg(test)]
mod test_utils;
mod traced;
mod trigger;

pub use crate::{
    ast::{CanonicalFilter, Filter, FilterNode},
    attributes::{
        AttributeSource, CompartmentId, ComponentId, GroupId, GroupTypeId, IndexProbe, PersonId,
        PropertyId, RegionId, ResourceId, Value,
    },
    config::RegistryConfig,
    descriptor::{
        CompartmentFunction, GroupFunction, PartitionDescriptor, PartitionSpec, PropertyFunction,
        RegionFunction, ResourceFunction,
    },
    equality::Equality,
    error::{AttributeError, PartitionError},
    evaluation::FilterEvaluator,
    events::{MembershipChange, PopulationEvent, Report, TransactionId},
    labels::{GroupTypeCountMap, Label, LabelSet},
    matcher::{IndexedScan, PopulationMatcher},
    population::{MapOption, Population},
    random::RandomStreams,
    registry::PartitionRegistry,
    sampling::{Sample, SamplerConfig, WeightFunction},
    trigger::Trigger,
};
