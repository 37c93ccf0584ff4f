use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Field, Member, MemberId, MemberKind, ModelError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub subject: MemberId,
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl Finding {
    pub fn error(subject: MemberId, code: &str, message: impl Into<String>) -> Self {
        Self {
            subject,
            severity: Severity::Error,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(subject: MemberId, code: &str, message: impl Into<String>) -> Self {
        Self {
            subject,
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Findings(Vec<Finding>);

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.0.push(finding);
    }

    pub fn extend(&mut self, other: Findings) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.0.iter().filter(|f| f.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.0.len() - self.error_count()
    }

    pub fn for_member(&self, id: MemberId) -> impl Iterator<Item = &Finding> {
        self.0.iter().filter(move |f| f.subject == id)
    }

    pub fn count_for(&self, id: MemberId) -> usize {
        self.for_member(id).count()
    }
}

impl IntoIterator for Findings {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Finding> for Findings {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Run every member-local rule.
pub fn validate_member(member: &Member) -> Findings {
    let mut findings = Findings::new();

    findings.extend(name_rules(member));
    if member.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
        findings.push(Finding::warning(
            member.id,
            "DOC_MISSING",
            format!("{} has no description", member.name),
        ));
    }
    findings.extend(facet_rules(member));

    match &member.kind {
        MemberKind::Enumeration { values, .. } if values.is_empty() => {
            findings.push(Finding::warning(
                member.id,
                "ENUM_EMPTY",
                format!("enumeration {} has no values", member.name),
            ));
        }
        _ => {}
    }

    let mut seen = HashSet::new();
    for prop in member.kind.properties() {
        if !seen.insert(prop.name.as_str()) {
            findings.push(Finding::error(
                member.id,
                "PROPERTY_DUPLICATE",
                format!("{} declares property '{}' twice", member.name, prop.name),
            ));
        }
    }

    findings
}

/// Blocking finding for a prospective edit, if the edit would leave the member invalid.
pub fn check_change(member: &Member, field: Field, value: &Value) -> Option<Finding> {
    let mut candidate = member.clone();
    if let Err(e) = candidate.set_field(field, value) {
        let code = match e {
            ModelError::FieldNotApplicable { .. } => "FIELD_NOT_APPLICABLE",
            _ => "VALUE_INVALID",
        };
        return Some(Finding::error(member.id, code, e.to_string()));
    }

    let findings = match field {
        Field::Name => name_rules(&candidate),
        f if f.is_facet() => facet_rules(&candidate),
        _ => Findings::new(),
    };
    findings.into_iter().find(Finding::is_error)
}

fn name_rules(member: &Member) -> Findings {
    let mut findings = Findings::new();
    let name = member.name.trim();
    if name.is_empty() {
        findings.push(Finding::error(
            member.id,
            "NAME_REQUIRED",
            "member name must not be empty",
        ));
    } else if name.chars().any(char::is_whitespace) {
        findings.push(Finding::error(
            member.id,
            "NAME_INVALID",
            format!("member name '{name}' must not contain whitespace"),
        ));
    }
    findings
}

fn facet_rules(member: &Member) -> Findings {
    let mut findings = Findings::new();
    let Some(facets) = member.kind.facets() else {
        return findings;
    };

    if let (Some(min), Some(max)) = (facets.min_length, facets.max_length) {
        if min > max {
            findings.push(Finding::error(
                member.id,
                "LENGTH_RANGE",
                format!("min length {min} exceeds max length {max}"),
            ));
        }
    }
    if let (Some(fraction), Some(total)) = (facets.fraction_digits, facets.total_digits) {
        if fraction > total {
            findings.push(Finding::error(
                member.id,
                "DIGITS_RANGE",
                format!("fraction digits {fraction} exceed total digits {total}"),
            ));
        }
    }
    findings
}
