//! Search criterion operators understood by the API.

use std::fmt;
use std::str::FromStr;

/// Operator of a search criterion; serialized as the criterion's element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Field value equals the operand (ids, vocabulary ids).
    EqualsField,
    /// Field value differs from the operand.
    NotEqualsField,
    /// Vocabulary term equals the operand.
    EqualsTerm,
    /// Vocabulary term differs from the operand.
    NotEqualsTerm,
    /// Field text contains the operand.
    Contains,
    /// Field text starts with the operand.
    StartsWithField,
    /// Field text ends with the operand.
    EndsWithField,
    /// Field value is greater than the operand.
    Greater,
    /// Field value is greater than or equal to the operand.
    GreaterEquals,
    /// Field value is less than the operand.
    Less,
    /// Field value is less than or equal to the operand.
    LessEquals,
    /// Field is null.
    IsNull,
    /// Field is not null.
    IsNotNull,
    /// Field is empty.
    IsBlank,
    /// Field is not empty.
    IsNotBlank,
}

impl Operator {
    /// All operators, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::EqualsField,
        Self::NotEqualsField,
        Self::EqualsTerm,
        Self::NotEqualsTerm,
        Self::Contains,
        Self::StartsWithField,
        Self::EndsWithField,
        Self::Greater,
        Self::GreaterEquals,
        Self::Less,
        Self::LessEquals,
        Self::IsNull,
        Self::IsNotNull,
        Self::IsBlank,
        Self::IsNotBlank,
    ];

    /// Element name used in search documents.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EqualsField => "equalsField",
            Self::NotEqualsField => "notEqualsField",
            Self::EqualsTerm => "equalsTerm",
            Self::NotEqualsTerm => "notEqualsTerm",
            Self::Contains => "contains",
            Self::StartsWithField => "startsWithField",
            Self::EndsWithField => "endsWithField",
            Self::Greater => "greater",
            Self::GreaterEquals => "greaterEquals",
            Self::Less => "less",
            Self::LessEquals => "lessEquals",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
            Self::IsBlank => "isBlank",
            Self::IsNotBlank => "isNotBlank",
        }
    }

    /// Unary operators take no operand.
    #[must_use]
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Self::IsNull | Self::IsNotNull | Self::IsBlank | Self::IsNotBlank
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string is not a known operator name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown search operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}
