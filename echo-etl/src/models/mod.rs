//! Data models for echo-etl

pub mod metric;
pub mod period;
pub mod source;

pub use metric::{HeaderColumn, HeaderSchema, MetricRow, RawBatch, OUTPUT_COLUMNS};
pub use period::{Cadence, Period};
pub use source::{OrgScope, Source, SourceKind};
