//! End-to-end extraction workflow
//!
//! Bootstrap, retrieval passes, target expansion, union, then the CSV
//! artifacts. Everything before the final write is pure in-memory work over
//! a [`MetricFetcher`](crate::services::analytics_client::MetricFetcher), so
//! the core can be driven by a scripted fetcher in tests.

pub mod pipeline;

pub use pipeline::{MetricPipeline, Pipeline, PipelineReport};
