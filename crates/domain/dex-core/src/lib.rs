use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod model;
pub mod property;
pub mod store;
pub mod validation;

pub use error::ModelError;
pub use model::{
    Library, LibraryId, Member, MemberId, MemberKind, ModelSnapshot, PropertyDef, SimpleFacets,
    Version,
};
pub use property::{ListenerId, Property, PropertyId, WeakProperty};
pub use store::{InMemoryModelStore, ModelStore, VersionedMember};
pub use validation::{Finding, Findings, Severity};

/// A value flowing between a UI control, an action and a model field.
///
/// Blank text is the "cleared" value: writing it to an optional field
/// removes the field's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(i64),
    Text(String),
}

impl Value {
    pub fn empty() -> Self {
        Value::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Text(s) if s.trim().is_empty())
    }

    /// Interpret the value as an optional number. Empty text means "no value".
    pub fn as_number(&self, field: Field) -> Result<Option<i64>, ModelError> {
        match self {
            Value::Number(n) => Ok(Some(*n)),
            _ if self.is_empty() => Ok(None),
            Value::Text(s) => {
                s.trim()
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| ModelError::InvalidValue {
                        field,
                        value: s.clone(),
                    })
            }
        }
    }

    /// Interpret the value as optional text. Blank text means "no value".
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Number(n) => Some(n.to_string()),
            _ if self.is_empty() => None,
            Value::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

/// The editable fields of a model member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    Name,
    Description,
    Example,
    Deprecation,
    Pattern,
    MinLength,
    MaxLength,
    FractionDigits,
    TotalDigits,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Description,
        Field::Example,
        Field::Deprecation,
        Field::Pattern,
        Field::MinLength,
        Field::MaxLength,
        Field::FractionDigits,
        Field::TotalDigits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Description => "description",
            Field::Example => "example",
            Field::Deprecation => "deprecation",
            Field::Pattern => "pattern",
            Field::MinLength => "min-length",
            Field::MaxLength => "max-length",
            Field::FractionDigits => "fraction-digits",
            Field::TotalDigits => "total-digits",
        }
    }

    /// Facet fields only exist on members carrying simple-type facets.
    pub fn is_facet(&self) -> bool {
        matches!(
            self,
            Field::Pattern
                | Field::MinLength
                | Field::MaxLength
                | Field::FractionDigits
                | Field::TotalDigits
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Field::MinLength | Field::MaxLength | Field::FractionDigits | Field::TotalDigits
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

/// Reference to the domain object an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRef {
    Member(MemberId),
    Library(LibraryId),
    Model,
}

impl ModelRef {
    pub fn member(&self) -> Option<MemberId> {
        match self {
            ModelRef::Member(id) => Some(*id),
            _ => None,
        }
    }
}
