//! Analytics header schemas, raw response batches and typed metric rows

use crate::error::{EtlError, EtlResult};
use crate::models::period::Period;
use crate::models::source::Source;
use serde::Deserialize;

/// Dimension names used by the analytics headers
pub mod dimension {
    pub const DATA: &str = "dx";
    pub const PERIOD: &str = "pe";
    pub const ORG_UNIT: &str = "ou";
    pub const CATEGORY_OPTION_COMBO: &str = "co";
    pub const VALUE: &str = "value";
}

/// Output column names, in the order every artifact is written
pub const OUTPUT_COLUMNS: [&str; 5] = [
    "Data",
    "Period",
    "Organisation unit",
    "Category option combo",
    "Value",
];

/// One header descriptor from an analytics payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderColumn {
    /// Dimension name (`dx`, `pe`, `ou`, `co`, `value`)
    pub name: String,
    /// Human column label (`Data`, `Period`, ...)
    #[serde(default)]
    pub column: String,
}

/// Ordered column descriptors of one response; position is the tuple index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSchema {
    pub columns: Vec<HeaderColumn>,
}

impl HeaderSchema {
    pub fn new(columns: Vec<HeaderColumn>) -> Self {
        Self { columns }
    }

    /// Build from bare dimension names (labels left empty)
    pub fn from_names(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| HeaderColumn {
                    name: (*name).to_string(),
                    column: String::new(),
                })
                .collect(),
        )
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Two schemas are compatible when they list the same dimensions in the
    /// same order; labels may differ (they are localized server-side).
    pub fn is_compatible(&self, other: &HeaderSchema) -> bool {
        self.names() == other.names()
    }
}

/// Rows of one successful analytics call, still positional
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub source: Source,
    pub period: Period,
    pub schema: HeaderSchema,
    pub rows: Vec<Vec<String>>,
}

impl RawBatch {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Apply this batch's own schema to its tuples
    ///
    /// Fails with `SchemaMismatch` if a required header is missing or a
    /// tuple's width differs from the schema. Nothing is produced for a
    /// failing batch, so a bad batch never yields half-named rows.
    pub fn to_metric_rows(&self) -> EtlResult<Vec<MetricRow>> {
        let required = |name: &str| {
            self.schema.position(name).ok_or_else(|| self.mismatch(format!(
                "missing header `{}` (found {:?})",
                name,
                self.schema.names()
            )))
        };

        let dx = required(dimension::DATA)?;
        let pe = required(dimension::PERIOD)?;
        let ou = required(dimension::ORG_UNIT)?;
        let value = required(dimension::VALUE)?;
        let co = if self.source.kind.has_disaggregation() {
            Some(required(dimension::CATEGORY_OPTION_COMBO)?)
        } else {
            self.schema.position(dimension::CATEGORY_OPTION_COMBO)
        };

        let width = self.schema.width();
        self.rows
            .iter()
            .enumerate()
            .map(|(index, tuple)| {
                if tuple.len() != width {
                    return Err(self.mismatch(format!(
                        "row {} has {} fields, schema has {}",
                        index,
                        tuple.len(),
                        width
                    )));
                }
                Ok(MetricRow {
                    data: tuple[dx].clone(),
                    period: tuple[pe].clone(),
                    org_unit: tuple[ou].clone(),
                    category_option_combo: co.map(|i| tuple[i].clone()),
                    value: tuple[value].clone(),
                })
            })
            .collect()
    }

    pub(crate) fn mismatch(&self, detail: String) -> EtlError {
        EtlError::SchemaMismatch {
            source_id: self.source.id.clone(),
            period: self.period.to_string(),
            detail,
        }
    }
}

/// One observation
///
/// `category_option_combo` is `None` for indicator rows; `None` is the
/// explicit "no value" marker and is written as an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricRow {
    pub data: String,
    pub period: String,
    pub org_unit: String,
    pub category_option_combo: Option<String>,
    pub value: String,
}

impl MetricRow {
    /// Fields in `OUTPUT_COLUMNS` order
    pub fn to_record(&self) -> [&str; 5] {
        [
            self.data.as_str(),
            self.period.as_str(),
            self.org_unit.as_str(),
            self.category_option_combo.as_deref().unwrap_or(""),
            self.value.as_str(),
        ]
    }
}
