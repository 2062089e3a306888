//! Retrieval, reconciliation and output services
//!
//! `period_lattice`, `fallback_retriever`, `target_expander` and
//! `metric_union` are the reconciliation core and do no I/O of their own.
//! `analytics_client` and `reference_client` talk to the API;
//! `output_writer` and `backup` touch the filesystem.

pub mod analytics_client;
pub mod backup;
pub mod fallback_retriever;
pub mod metric_union;
pub mod output_writer;
pub mod period_lattice;
pub mod reference_client;
pub mod target_expander;

pub use analytics_client::{AnalyticsClient, ClientSettings, FetchOutcome, MetricFetcher};
pub use fallback_retriever::{FallbackRetriever, PassReport, RetrievalReport};
pub use reference_client::{ProgramRefs, ReferenceClient};
pub use target_expander::{TargetOverride, TargetOverrides};
