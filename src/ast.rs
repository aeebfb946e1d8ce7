use crate::{
    attributes::{
        AttributeSource, CompartmentId, GroupId, GroupTypeId, PersonId, PropertyId, RegionId,
        ResourceId, Value,
    },
    equality::Equality,
    error::AttributeError,
};
use itertools::Itertools;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    ops::Not,
};

pub type FilterNode = Box<Filter>;

/// A logical predicate over the attributes of one person.
///
/// Filters are built by the client with the constructors below and combined with
/// [`Filter::and()`], [`Filter::or()`] and `!`:
///
/// ```rust
/// use partition_index::{Equality, Filter, PropertyId, RegionId};
///
/// const AGE: PropertyId = PropertyId::new(0);
///
/// let adults_outside_the_capital = Filter::property(AGE, Equality::GreaterThanEqual, 18)
///     .and(!Filter::region([RegionId::new(0)]));
/// assert!(!adults_outside_the_capital.clone().canonicalize().is_all());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    All,
    None,
    And(FilterNode, FilterNode),
    Or(FilterNode, FilterNode),
    Negate(FilterNode),
    Compartment(CompartmentId),
    Region(BTreeSet<RegionId>),
    Property(PropertyId, Equality, Value),
    Resource(ResourceId, Equality, u64),
    GroupMember(GroupId),
    GroupsForPerson(Equality, usize),
    GroupsForPersonAndType(GroupTypeId, Equality, usize),
    GroupTypesForPerson(Equality, usize),
}

impl Filter {
    #[inline]
    pub fn compartment(compartment: CompartmentId) -> Self {
        Self::Compartment(compartment)
    }

    pub fn region<I: IntoIterator<Item = RegionId>>(regions: I) -> Self {
        Self::Region(regions.into_iter().collect())
    }

    pub fn property<V: Into<Value>>(property: PropertyId, equality: Equality, value: V) -> Self {
        Self::Property(property, equality, value.into())
    }

    #[inline]
    pub fn resource(resource: ResourceId, equality: Equality, level: u64) -> Self {
        Self::Resource(resource, equality, level)
    }

    #[inline]
    pub fn group_member(group: GroupId) -> Self {
        Self::GroupMember(group)
    }

    #[inline]
    pub fn groups_for_person(equality: Equality, count: usize) -> Self {
        Self::GroupsForPerson(equality, count)
    }

    #[inline]
    pub fn groups_for_person_and_type(
        group_type: GroupTypeId,
        equality: Equality,
        count: usize,
    ) -> Self {
        Self::GroupsForPersonAndType(group_type, equality, count)
    }

    #[inline]
    pub fn group_types_for_person(equality: Equality, count: usize) -> Self {
        Self::GroupTypesForPerson(equality, count)
    }

    #[inline]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[inline]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Collapse every `All`/`None` sub-tree that sits beneath a logical combinator.
    #[inline]
    pub fn canonicalize(self) -> CanonicalFilter {
        CanonicalFilter(self.collapse())
    }

    fn collapse(self) -> Self {
        match self {
            Self::And(left, right) => match (left.collapse(), right.collapse()) {
                (Self::None, _) | (_, Self::None) => Self::None,
                (Self::All, other) | (other, Self::All) => other,
                (left, right) => Self::And(Box::new(left), Box::new(right)),
            },
            Self::Or(left, right) => match (left.collapse(), right.collapse()) {
                (Self::All, _) | (_, Self::All) => Self::All,
                (Self::None, other) | (other, Self::None) => other,
                (left, right) => Self::Or(Box::new(left), Box::new(right)),
            },
            Self::Negate(value) => match value.collapse() {
                Self::All => Self::None,
                Self::None => Self::All,
                other => Self::Negate(Box::new(other)),
            },
            leaf => leaf,
        }
    }

    /// Evaluate the filter by walking the tree.
    ///
    /// This is the reference semantics; partitions use the compiled
    /// [`crate::FilterEvaluator`] instead.
    pub fn evaluate(
        &self,
        source: &dyn AttributeSource,
        person: PersonId,
    ) -> Result<bool, AttributeError> {
        Ok(match self {
            Self::All => true,
            Self::None => false,
            Self::And(left, right) => {
                left.evaluate(source, person)? && right.evaluate(source, person)?
            }
            Self::Or(left, right) => {
                left.evaluate(source, person)? || right.evaluate(source, person)?
            }
            Self::Negate(value) => !value.evaluate(source, person)?,
            Self::Compartment(compartment) => source.compartment_of(person)? == *compartment,
            Self::Region(regions) => regions.contains(&source.region_of(person)?),
            Self::Property(property, equality, value) => {
                equality.compare(&source.property_value(person, *property)?, value)
            }
            Self::Resource(resource, equality, level) => {
                equality.compare(&source.resource_level(person, *resource)?, level)
            }
            Self::GroupMember(group) => source.is_group_member(person, *group)?,
            Self::GroupsForPerson(equality, count) => {
                equality.compare(&source.group_count_for_person(person)?, count)
            }
            Self::GroupsForPersonAndType(group_type, equality, count) => equality.compare(
                &source.group_count_for_person_and_type(person, *group_type)?,
                count,
            ),
            Self::GroupTypesForPerson(equality, count) => {
                equality.compare(&source.group_type_count_for_person(person)?, count)
            }
        })
    }
}

impl Not for Filter {
    type Output = Self;

    #[inline]
    fn not(self) -> Self::Output {
        Self::Negate(Box::new(self))
    }
}

impl Display for Filter {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::All => write!(formatter, "all"),
            Self::None => write!(formatter, "none"),
            Self::And(left, right) => write!(formatter, "({left} and {right})"),
            Self::Or(left, right) => write!(formatter, "({left} or {right})"),
            Self::Negate(value) => write!(formatter, "not {value}"),
            Self::Compartment(compartment) => write!(formatter, "{compartment}"),
            Self::Region(regions) => {
                write!(formatter, "region in [{}]", regions.iter().join(", "))
            }
            Self::Property(property, equality, value) => {
                write!(formatter, "{property} {equality} {value}")
            }
            Self::Resource(resource, equality, level) => {
                write!(formatter, "{resource} {equality} {level}")
            }
            Self::GroupMember(group) => write!(formatter, "member of {group}"),
            Self::GroupsForPerson(equality, count) => write!(formatter, "groups {equality} {count}"),
            Self::GroupsForPersonAndType(group_type, equality, count) => {
                write!(formatter, "groups of {group_type} {equality} {count}")
            }
            Self::GroupTypesForPerson(equality, count) => {
                write!(formatter, "group types {equality} {count}")
            }
        }
    }
}

/// A filter in canonical form: `All` and `None` never appear beneath `And`, `Or` or `Negate`.
///
/// The only way to obtain one is [`Filter::canonicalize()`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalFilter(Filter);

impl CanonicalFilter {
    #[inline]
    pub const fn root(&self) -> &Filter {
        &self.0
    }

    /// The filter accepts every person without looking at them.
    #[inline]
    pub const fn is_all(&self) -> bool {
        matches!(self.0, Filter::All)
    }

    /// The filter rejects every person without looking at them.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self.0, Filter::None)
    }

    #[inline]
    pub fn into_inner(self) -> Filter {
        self.0
    }
}

impl Default for CanonicalFilter {
    fn default() -> Self {
        Self(Filter::All)
    }
}

impl Display for CanonicalFilter {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        self.0.fmt(formatter)
    }
}
