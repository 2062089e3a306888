//! # ECHO Common Library
//!
//! Shared code for the ECHO extraction tools:
//! - Error type
//! - TOML configuration model and priority resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
