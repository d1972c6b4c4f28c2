//! Scalar case fields substituted into the template.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The fixed set of scalar placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Placeholder {
    Unit,
    Case,
    Time,
    Address,
    Name,
}

impl Placeholder {
    /// Every placeholder, in template order.
    pub const ALL: [Placeholder; 5] = [
        Placeholder::Unit,
        Placeholder::Case,
        Placeholder::Time,
        Placeholder::Address,
        Placeholder::Name,
    ];

    /// Field name as written inside the marker.
    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Unit => "UNIT",
            Placeholder::Case => "CASE",
            Placeholder::Time => "TIME",
            Placeholder::Address => "ADDRESS",
            Placeholder::Name => "NAME",
        }
    }

    /// Literal marker text, e.g. `%%UNIT%%`.
    pub fn marker(&self) -> String {
        format!("%%{}%%", self.name())
    }

    /// Whether a report is meaningless without this field.
    pub fn is_required(&self) -> bool {
        matches!(self, Placeholder::Unit | Placeholder::Case)
    }
}

impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Field values for one job. Absent fields substitute as empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    values: BTreeMap<Placeholder, String>,
}

impl FieldSet {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field (builder pattern).
    pub fn with(mut self, field: Placeholder, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field.
    pub fn set(&mut self, field: Placeholder, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    /// Value of a field, if set.
    pub fn get(&self, field: Placeholder) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Value substituted for a field.
    pub fn value_or_empty(&self, field: Placeholder) -> &str {
        self.get(field).unwrap_or("")
    }

    /// Required fields that are absent or blank.
    pub fn missing_required(&self) -> Vec<Placeholder> {
        Placeholder::ALL
            .into_iter()
            .filter(|field| field.is_required())
            .filter(|field| self.get(*field).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }
}
