use crate::attributes::{CompartmentId, GroupId, PersonId, PropertyId, RegionId, ResourceId, Value};
use std::fmt::{Display, Formatter};

/// A change of the population, described after it has been applied to the attribute source.
///
/// Changes that replace a value carry the old value along with the new one, since the attribute
/// source can only report the new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopulationEvent {
    PersonAdded {
        person: PersonId,
    },
    PersonRemoved {
        person: PersonId,
    },
    RegionChanged {
        person: PersonId,
        old: RegionId,
        new: RegionId,
    },
    CompartmentChanged {
        person: PersonId,
        old: CompartmentId,
        new: CompartmentId,
    },
    PropertyChanged {
        person: PersonId,
        property: PropertyId,
        old: Value,
        new: Value,
    },
    ResourceChanged {
        person: PersonId,
        resource: ResourceId,
    },
    GroupMemberAdded {
        person: PersonId,
        group: GroupId,
    },
    GroupMemberRemoved {
        person: PersonId,
        group: GroupId,
    },
}

impl PopulationEvent {
    /// The person the change is about.
    pub const fn person(&self) -> PersonId {
        match self {
            Self::PersonAdded { person }
            | Self::PersonRemoved { person }
            | Self::RegionChanged { person, .. }
            | Self::CompartmentChanged { person, .. }
            | Self::PropertyChanged { person, .. }
            | Self::ResourceChanged { person, .. }
            | Self::GroupMemberAdded { person, .. }
            | Self::GroupMemberRemoved { person, .. } => *person,
        }
    }
}

impl Display for PopulationEvent {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::PersonAdded { person } => write!(formatter, "{person} added"),
            Self::PersonRemoved { person } => write!(formatter, "{person} removed"),
            Self::RegionChanged { person, old, new } => {
                write!(formatter, "{person} moved from {old} to {new}")
            }
            Self::CompartmentChanged { person, old, new } => {
                write!(formatter, "{person} moved from {old} to {new}")
            }
            Self::PropertyChanged {
                person,
                property,
                old,
                new,
            } => write!(formatter, "{person} changed {property} from {old} to {new}"),
            Self::ResourceChanged { person, resource } => {
                write!(formatter, "{person} changed its {resource} level")
            }
            Self::GroupMemberAdded { person, group } => {
                write!(formatter, "{person} joined {group}")
            }
            Self::GroupMemberRemoved { person, group } => {
                write!(formatter, "{person} left {group}")
            }
        }
    }
}

/// Identifies one delivery of a [`PopulationEvent`]; a partition ignores a second delivery of the
/// same transaction for the same person.
#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Debug, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for TransactionId {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        write!(formatter, "transaction({})", self.0)
    }
}

/// How a change moved a person in or out of a partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipChange {
    Joined,
    Left,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The people that joined or left partitions while handling one [`PopulationEvent`], in partition
/// registration order.
pub struct Report<K> {
    joined: Vec<(K, PersonId)>,
    left: Vec<(K, PersonId)>,
}

impl<K> Report<K> {
    pub(crate) const fn new() -> Self {
        Self {
            joined: Vec::new(),
            left: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, key: K, person: PersonId, change: MembershipChange) {
        match change {
            MembershipChange::Joined => self.joined.push((key, person)),
            MembershipChange::Left => self.left.push((key, person)),
        }
    }

    #[inline]
    pub fn joined(&self) -> &[(K, PersonId)] {
        &self.joined
    }

    #[inline]
    pub fn left(&self) -> &[(K, PersonId)] {
        &self.left
    }

    /// Nobody joined or left any partition.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

impl<K> Default for Report<K> {
    fn default() -> Self {
        Self::new()
    }
}
