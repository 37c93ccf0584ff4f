use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Field, ModelError, Value};

pub type LibraryId = Uuid;
pub type MemberId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub base_namespace: String,
    pub version: Version,
    #[serde(default)]
    pub editable: bool,
}

impl Library {
    pub fn new(name: &str, base_namespace: &str, version: Version, editable: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            base_namespace: base_namespace.to_string(),
            version,
            editable,
        }
    }

    /// Libraries sharing a base namespace and major version form one version chain.
    pub fn same_chain(&self, other: &Library) -> bool {
        self.base_namespace == other.base_namespace && self.version.major == other.version.major
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleFacets {
    pub base_type: Option<String>,
    pub pattern: Option<String>,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    pub fraction_digits: Option<i64>,
    pub total_digits: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    /// Name of the member this property is typed by; `None` when unassigned.
    pub type_ref: Option<String>,
}

impl PropertyDef {
    pub fn new(name: &str, type_ref: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            type_ref: type_ref.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemberKind {
    Simple(SimpleFacets),
    Business {
        properties: Vec<PropertyDef>,
    },
    Core {
        properties: Vec<PropertyDef>,
        simple: SimpleFacets,
    },
    Choice {
        properties: Vec<PropertyDef>,
    },
    Enumeration {
        open: bool,
        values: Vec<String>,
    },
    ValueWithAttributes {
        base_type: Option<String>,
        attributes: Vec<PropertyDef>,
    },
    Service,
}

impl MemberKind {
    pub fn label(&self) -> &'static str {
        match self {
            MemberKind::Simple(_) => "simple",
            MemberKind::Business { .. } => "business",
            MemberKind::Core { .. } => "core",
            MemberKind::Choice { .. } => "choice",
            MemberKind::Enumeration { open: true, .. } => "open enumeration",
            MemberKind::Enumeration { open: false, .. } => "closed enumeration",
            MemberKind::ValueWithAttributes { .. } => "value with attributes",
            MemberKind::Service => "service",
        }
    }

    pub fn facets(&self) -> Option<&SimpleFacets> {
        match self {
            MemberKind::Simple(f) => Some(f),
            MemberKind::Core { simple, .. } => Some(simple),
            _ => None,
        }
    }

    pub fn facets_mut(&mut self) -> Option<&mut SimpleFacets> {
        match self {
            MemberKind::Simple(f) => Some(f),
            MemberKind::Core { simple, .. } => Some(simple),
            _ => None,
        }
    }

    pub fn properties(&self) -> &[PropertyDef] {
        match self {
            MemberKind::Business { properties }
            | MemberKind::Core { properties, .. }
            | MemberKind::Choice { properties } => properties,
            MemberKind::ValueWithAttributes { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Type names referenced by this member, including simple base types.
    pub fn type_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .properties()
            .iter()
            .filter_map(|p| p.type_ref.as_deref())
            .collect();
        match self {
            MemberKind::Simple(f) | MemberKind::Core { simple: f, .. } => {
                refs.extend(f.base_type.as_deref());
            }
            MemberKind::ValueWithAttributes { base_type, .. } => {
                refs.extend(base_type.as_deref());
            }
            _ => {}
        }
        refs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub library: LibraryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub deprecation: Option<String>,
    pub kind: MemberKind,
}

impl Member {
    pub fn new(library: LibraryId, name: &str, kind: MemberKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            library,
            name: name.to_string(),
            description: None,
            example: None,
            deprecation: None,
            kind,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn has_facets(&self) -> bool {
        self.kind.facets().is_some()
    }

    pub fn field(&self, field: Field) -> Result<Option<Value>, ModelError> {
        let text = |v: &Option<String>| v.clone().map(Value::Text);
        let number = |v: Option<i64>| v.map(Value::Number);

        if field.is_facet() {
            let facets = self.kind.facets().ok_or(ModelError::FieldNotApplicable {
                field,
                kind: self.kind.label(),
            })?;
            return Ok(match field {
                Field::Pattern => text(&facets.pattern),
                Field::MinLength => number(facets.min_length),
                Field::MaxLength => number(facets.max_length),
                Field::FractionDigits => number(facets.fraction_digits),
                Field::TotalDigits => number(facets.total_digits),
                _ => None,
            });
        }

        Ok(match field {
            Field::Name => Some(Value::Text(self.name.clone())),
            Field::Description => text(&self.description),
            Field::Example => text(&self.example),
            Field::Deprecation => text(&self.deprecation),
            _ => None,
        })
    }

    pub fn set_field(&mut self, field: Field, value: &Value) -> Result<(), ModelError> {
        if field.is_facet() {
            let kind = self.kind.label();
            let facets = self
                .kind
                .facets_mut()
                .ok_or(ModelError::FieldNotApplicable { field, kind })?;
            match field {
                Field::Pattern => facets.pattern = value.as_text(),
                Field::MinLength => facets.min_length = non_negative(field, value)?,
                Field::MaxLength => facets.max_length = non_negative(field, value)?,
                Field::FractionDigits => facets.fraction_digits = non_negative(field, value)?,
                Field::TotalDigits => facets.total_digits = non_negative(field, value)?,
                _ => {}
            }
            return Ok(());
        }

        match field {
            Field::Name => self.name = value.as_text().unwrap_or_default(),
            Field::Description => self.description = value.as_text(),
            Field::Example => self.example = value.as_text(),
            Field::Deprecation => self.deprecation = value.as_text(),
            _ => {}
        }
        Ok(())
    }
}

fn non_negative(field: Field, value: &Value) -> Result<Option<i64>, ModelError> {
    match value.as_number(field)? {
        Some(n) if n < 0 => Err(ModelError::InvalidValue {
            field,
            value: value.to_string(),
        }),
        other => Ok(other),
    }
}

/// Serializable content of a model store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub libraries: Vec<Library>,
    pub members: Vec<Member>,
}
