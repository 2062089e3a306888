//! Queryable metric groups and the organisation scope they are queried in

use std::fmt;

/// What kind of group a source is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    IndicatorGroup,
    DataElementGroup,
}

impl SourceKind {
    /// Prefix of the `dx` dimension selector
    pub fn dx_prefix(&self) -> &'static str {
        match self {
            SourceKind::IndicatorGroup => "IN_GROUP",
            SourceKind::DataElementGroup => "DE_GROUP",
        }
    }

    /// Data-element responses carry the category option combo column
    pub fn has_disaggregation(&self) -> bool {
        matches!(self, SourceKind::DataElementGroup)
    }
}

/// A metric group that can be queried against the analytics endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub id: String,
    pub display_name: String,
    pub kind: SourceKind,
}

impl Source {
    pub fn indicator_group(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind: SourceKind::IndicatorGroup,
        }
    }

    pub fn data_element_group(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind: SourceKind::DataElementGroup,
        }
    }

    /// `IN_GROUP-<id>` or `DE_GROUP-<id>`
    pub fn dx_selector(&self) -> String {
        format!("{}-{}", self.kind.dx_prefix(), self.id)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            f.write_str(&self.id)
        } else {
            write!(f, "{} ({})", self.display_name, self.id)
        }
    }
}

/// Organisation unit scope shared by every query of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgScope {
    pub org_unit_group_id: String,
}

impl OrgScope {
    pub fn new(org_unit_group_id: impl Into<String>) -> Self {
        Self {
            org_unit_group_id: org_unit_group_id.into(),
        }
    }

    /// `OU_GROUP-<id>`
    pub fn ou_selector(&self) -> String {
        format!("OU_GROUP-{}", self.org_unit_group_id)
    }
}
