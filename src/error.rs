use crate::attributes::{GroupId, GroupTypeId, PersonId, PropertyId, ResourceId};
use thiserror::Error;

/// A fault raised by an [`crate::AttributeSource`] when asked about something it does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("{0} does not exist")]
    UnknownPerson(PersonId),
    #[error("{0} is not defined")]
    UnknownProperty(PropertyId),
    #[error("{0} is not defined")]
    UnknownResource(ResourceId),
    #[error("{0} does not exist")]
    UnknownGroup(GroupId),
    #[error("{0} is not defined")]
    UnknownGroupType(GroupTypeId),
    #[error("{person} has no value for {property}")]
    MissingPropertyValue {
        person: PersonId,
        property: PropertyId,
    },
}

/// The failures of the partition registry and of the partitions it owns.
///
/// Every variant is a programming error on the caller's side or an attribute fault passed
/// through unmodified; the registry never recovers from them on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("a partition is already registered under {0}")]
    DuplicateKey(String),
    #[error("no partition is registered under {0}")]
    UnknownKey(String),
    #[error("{0} is declared more than once in the partition")]
    DuplicateDimension(String),
    #[error("the {dimension} dimension produced no label for {person}")]
    MissingLabel {
        dimension: &'static str,
        person: PersonId,
    },
    #[error("the label set {0} names a dimension the partition does not declare")]
    IncompatibleLabelSet(String),
    #[error("failed with {0}")]
    Attribute(#[from] AttributeError),
}
