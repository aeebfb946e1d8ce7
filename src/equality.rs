use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    ops::Not,
};

/// A comparison operator used by the comparing filter leaves.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Equality {
    LessThan,
    LessThanEqual,
    Equal,
    NotEqual,
    GreaterThanEqual,
    GreaterThan,
}

impl Equality {
    /// Whether `actual.cmp(&expected)` yielding `ordering` satisfies this operator.
    #[inline]
    pub const fn is_compatible(self, ordering: Ordering) -> bool {
        match self {
            Self::LessThan => matches!(ordering, Ordering::Less),
            Self::LessThanEqual => !matches!(ordering, Ordering::Greater),
            Self::Equal => matches!(ordering, Ordering::Equal),
            Self::NotEqual => !matches!(ordering, Ordering::Equal),
            Self::GreaterThanEqual => !matches!(ordering, Ordering::Less),
            Self::GreaterThan => matches!(ordering, Ordering::Greater),
        }
    }

    /// `EQUAL` and `NOT_EQUAL` only depend on whether a value is one specific literal.
    #[inline]
    pub const fn is_equality_like(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    #[inline]
    pub fn compare<T: Ord + ?Sized>(self, actual: &T, expected: &T) -> bool {
        match self {
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
            ordered => ordered.is_compatible(actual.cmp(expected)),
        }
    }
}

impl Not for Equality {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::LessThan => Self::GreaterThanEqual,
            Self::LessThanEqual => Self::GreaterThan,
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::GreaterThanEqual => Self::LessThan,
            Self::GreaterThan => Self::LessThanEqual,
        }
    }
}

impl Display for Equality {
    fn fmt(&self, formatter: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::LessThan => write!(formatter, "<"),
            Self::LessThanEqual => write!(formatter, "<="),
            Self::Equal => write!(formatter, "=="),
            Self::NotEqual => write!(formatter, "!="),
            Self::GreaterThanEqual => write!(formatter, ">="),
            Self::GreaterThan => write!(formatter, ">"),
        }
    }
}
