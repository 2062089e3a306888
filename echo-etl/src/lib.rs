//! echo-etl library interface
//!
//! Exposes the retrieval and reconciliation pipeline for the binary and for
//! integration testing.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{EtlError, EtlResult};
pub use crate::workflow::{MetricPipeline, Pipeline, PipelineReport};
