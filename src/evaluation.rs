use crate::{
    ast::{CanonicalFilter, Filter},
    attributes::{AttributeSource, PersonId},
    error::AttributeError,
};
use std::fmt::{Debug, Formatter};

type Evaluation =
    Box<dyn Fn(&dyn AttributeSource, PersonId) -> Result<bool, AttributeError> + Send + Sync>;

/// A canonical filter compiled into a tree of closures.
///
/// The evaluator is built once per partition and reused for every person the partition tests.
/// It reads live attributes through the [`AttributeSource`] and does no validation of its own.
pub struct FilterEvaluator {
    evaluation: Evaluation,
    constant: Option<bool>,
}

impl FilterEvaluator {
    pub fn new(filter: &CanonicalFilter) -> Self {
        let constant = if filter.is_all() {
            Some(true)
        } else if filter.is_none() {
            Some(false)
        } else {
            None
        };
        Self {
            evaluation: compile(filter.root()),
            constant,
        }
    }

    #[inline]
    pub fn evaluate(
        &self,
        source: &dyn AttributeSource,
        person: PersonId,
    ) -> Result<bool, AttributeError> {
        match self.constant {
            Some(result) => Ok(result),
            None => (self.evaluation)(source, person),
        }
    }

    /// The result of the filter when it does not depend on the person at all.
    #[inline]
    pub const fn constant(&self) -> Option<bool> {
        self.constant
    }
}

impl Debug for FilterEvaluator {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FilterEvaluator")
            .field("constant", &self.constant)
            .finish_non_exhaustive()
    }
}

fn compile(filter: &Filter) -> Evaluation {
    match filter {
        Filter::All => boxed(|_, _| Ok(true)),
        Filter::None => boxed(|_, _| Ok(false)),
        Filter::And(left, right) => {
            let left = compile(left);
            let right = compile(right);
            boxed(move |source, person| {
                Ok(left(source, person)? && right(source, person)?)
            })
        }
        Filter::Or(left, right) => {
            let left = compile(left);
            let right = compile(right);
            boxed(move |source, person| {
                Ok(left(source, person)? || right(source, person)?)
            })
        }
        Filter::Negate(value) => {
            let value = compile(value);
            boxed(move |source, person| Ok(!value(source, person)?))
        }
        Filter::Compartment(compartment) => {
            let compartment = *compartment;
            boxed(move |source, person| Ok(source.compartment_of(person)? == compartment))
        }
        Filter::Region(regions) => {
            let regions = regions.clone();
            boxed(move |source, person| Ok(regions.contains(&source.region_of(person)?)))
        }
        Filter::Property(property, equality, value) => {
            let (property, equality, value) = (*property, *equality, value.clone());
            boxed(move |source, person| {
                let actual = source.property_value(person, property)?;
                Ok(equality.compare(&actual, &value))
            })
        }
        Filter::Resource(resource, equality, level) => {
            let (resource, equality, level) = (*resource, *equality, *level);
            boxed(move |source, person| {
                let actual = source.resource_level(person, resource)?;
                Ok(equality.compare(&actual, &level))
            })
        }
        Filter::GroupMember(group) => {
            let group = *group;
            boxed(move |source, person| source.is_group_member(person, group))
        }
        Filter::GroupsForPerson(equality, count) => {
            let (equality, count) = (*equality, *count);
            boxed(move |source, person| {
                Ok(equality.compare(&source.group_count_for_person(person)?, &count))
            })
        }
        Filter::GroupsForPersonAndType(group_type, equality, count) => {
            let (group_type, equality, count) = (*group_type, *equality, *count);
            boxed(move |source, person| {
                let actual = source.group_count_for_person_and_type(person, group_type)?;
                Ok(equality.compare(&actual, &count))
            })
        }
        Filter::GroupTypesForPerson(equality, count) => {
            let (equality, count) = (*equality, *count);
            boxed(move |source, person| {
                Ok(equality.compare(&source.group_type_count_for_person(person)?, &count))
            })
        }
    }
}

#[inline]
fn boxed<F>(evaluation: F) -> Evaluation
where
    F: Fn(&dyn AttributeSource, PersonId) -> Result<bool, AttributeError> + Send + Sync + 'static,
{
    Box::new(evaluation)
}
