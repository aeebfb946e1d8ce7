use crate::error::AttributeError;
use rust_decimal::Decimal;
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Debug, Hash)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub const fn new(id: usize) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(id: usize) -> Self {
                Self(id)
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, concat!($label, "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// A dense handle on a person; handles are assigned by the simulation and only reused after
    /// the person has been removed.
    PersonId,
    "person"
);
define_id!(RegionId, "region");
define_id!(CompartmentId, "compartment");
define_id!(PropertyId, "property");
define_id!(ResourceId, "resource");
define_id!(GroupId, "group");
define_id!(GroupTypeId, "group_type");
define_id!(
    /// The simulation component owning a partition.
    ComponentId,
    "component"
);

/// The value of a person property.
///
/// Values are totally ordered (first by kind, then by value) so that ordered filter leaves can
/// delegate a three-way comparison to [`crate::Equality`], and hashable so that the registry can
/// route property changes by `(property, value)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(Arc<str>),
}

impl Value {
    /// Create a decimal value from a mantissa and a scale (`Value::decimal(15, 1)` is `1.5`).
    pub fn decimal(number: i64, scale: u32) -> Self {
        Self::Decimal(Decimal::new(number, scale))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl Display for Value {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Boolean(value) => write!(formatter, "{value}"),
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Decimal(value) => write!(formatter, "{value}"),
            Self::Text(value) => write!(formatter, "{value:?}"),
        }
    }
}

/// A question that an [`AttributeSource`] may be able to answer from a reverse index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexProbe {
    Region(RegionId),
    Compartment(CompartmentId),
    Property(PropertyId, Value),
}

/// Read access to the authoritative attribute state of the population.
///
/// The partition core never validates ids itself: unknown ids must be reported by the source as an
/// [`AttributeError`] which is then propagated to the caller untouched.
pub trait AttributeSource {
    /// Every person currently in the population, in ascending id order.
    fn people(&self) -> Vec<PersonId>;

    fn contains_person(&self, person: PersonId) -> bool;

    fn region_of(&self, person: PersonId) -> Result<RegionId, AttributeError>;

    fn compartment_of(&self, person: PersonId) -> Result<CompartmentId, AttributeError>;

    fn property_value(&self, person: PersonId, property: PropertyId)
        -> Result<Value, AttributeError>;

    fn resource_level(&self, person: PersonId, resource: ResourceId) -> Result<u64, AttributeError>;

    fn is_group_member(&self, person: PersonId, group: GroupId) -> Result<bool, AttributeError>;

    fn group_type_of(&self, group: GroupId) -> Result<GroupTypeId, AttributeError>;

    fn group_count_for_person_and_type(
        &self,
        person: PersonId,
        group_type: GroupTypeId,
    ) -> Result<usize, AttributeError>;

    fn group_count_for_person(&self, person: PersonId) -> Result<usize, AttributeError>;

    /// The number of distinct group types among the groups the person belongs to.
    fn group_type_count_for_person(&self, person: PersonId) -> Result<usize, AttributeError>;

    fn property_ids(&self) -> Vec<PropertyId>;

    fn resource_ids(&self) -> Vec<ResourceId>;

    fn group_type_ids(&self) -> Vec<GroupTypeId>;

    /// Answer a probe from a reverse index, if the source maintains one for it.
    ///
    /// Returning `None` means "not indexed", not "nobody matches".
    #[inline]
    fn indexed_people(&self, _probe: &IndexProbe) -> Option<Vec<PersonId>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_their_kind() {
        assert_eq!("person(3)", PersonId::new(3).to_string());
        assert_eq!("group_type(0)", GroupTypeId::new(0).to_string());
    }

    #[test]
    fn values_of_the_same_kind_are_ordered_by_value() {
        assert!(Value::from(5) < Value::from(18));
        assert!(Value::decimal(15, 1) > Value::decimal(149, 2));
        assert!(Value::from("a") < Value::from("b"));
    }

    #[test]
    fn values_of_different_kinds_are_never_equal() {
        assert_ne!(Value::from(1), Value::decimal(1, 0));
        assert_ne!(Value::from(true), Value::from(1));
    }

    #[test]
    fn decimal_values_compare_by_magnitude_not_scale() {
        assert_eq!(Value::decimal(10, 1), Value::decimal(100, 2));
    }
}
