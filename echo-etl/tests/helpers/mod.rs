//! Test Helper Utilities
//!
//! Shared utilities for testing echo-etl: a scripted [`MetricFetcher`] that
//! records every call, and builders for program references.

#![allow(dead_code)]

use async_trait::async_trait;
use echo_etl::error::{EtlError, EtlResult};
use echo_etl::models::{HeaderSchema, OrgScope, Period, RawBatch, Source, SourceKind};
use echo_etl::services::{FetchOutcome, MetricFetcher, ProgramRefs, TargetOverrides};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const INDICATOR_HEADERS: [&str; 4] = ["dx", "pe", "ou", "value"];
pub const DATA_ELEMENT_HEADERS: [&str; 5] = ["dx", "co", "pe", "ou", "value"];

/// Canned reply for one `(period, source)` pair
#[derive(Debug, Clone)]
pub enum Scripted {
    Rows(Vec<Vec<String>>),
    /// Rows under explicit headers, for schema tests
    Custom(Vec<String>, Vec<Vec<String>>),
    Empty,
    Fail,
}

/// Fetcher answering from a script; unscripted pairs answer `Empty`
#[derive(Default)]
pub struct ScriptedFetcher {
    script: HashMap<(String, String), Scripted>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each call sleeps this long, so overlapping calls are observable
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn on(mut self, period: &str, source_id: &str, reply: Scripted) -> Self {
        self.script.insert((period.to_string(), source_id.to_string()), reply);
        self
    }

    /// `count` rows of `data,period,ou1,value` for one pair
    pub fn rows(self, period: &str, source_id: &str, data: &str, count: usize) -> Self {
        let rows = (0..count)
            .map(|i| vec![format!("{}{}", data, i), period.to_string(), "ou1".to_string(), "1".to_string()])
            .collect();
        self.on(period, source_id, Scripted::Rows(rows))
    }

    /// Every call in arrival order, as `(period, source id)`
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, source_id: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(_, s)| s == source_id)
            .map(|(p, _)| p)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricFetcher for ScriptedFetcher {
    async fn fetch(&self, period: &Period, source: &Source, _scope: &OrgScope) -> EtlResult<FetchOutcome> {
        let key = (period.to_string(), source.id.clone());
        self.calls.lock().unwrap().push(key.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let batch = |names: Vec<String>, rows: Vec<Vec<String>>| {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            FetchOutcome::Data(RawBatch {
                source: source.clone(),
                period: period.clone(),
                schema: HeaderSchema::from_names(&names),
                rows,
            })
        };

        match self.script.get(&key).cloned().unwrap_or(Scripted::Empty) {
            Scripted::Empty => Ok(FetchOutcome::Empty),
            Scripted::Fail => Err(EtlError::TransientFetch {
                source_id: source.id.clone(),
                period: period.to_string(),
                reason: "scripted failure".to_string(),
            }),
            Scripted::Custom(names, rows) => Ok(batch(names, rows)),
            Scripted::Rows(rows) => {
                let names = match source.kind {
                    SourceKind::IndicatorGroup => INDICATOR_HEADERS.to_vec(),
                    SourceKind::DataElementGroup => DATA_ELEMENT_HEADERS.to_vec(),
                };
                let rows = match source.kind {
                    SourceKind::IndicatorGroup => rows,
                    // Insert a category option combo after dx
                    SourceKind::DataElementGroup => rows
                        .into_iter()
                        .map(|mut row| {
                            row.insert(1, "coc1".to_string());
                            row
                        })
                        .collect(),
                };
                Ok(batch(names.into_iter().map(String::from).collect(), rows))
            }
        }
    }
}

pub fn indicator(id: &str) -> Source {
    Source::indicator_group(id, format!("EXPORT {}", id))
}

pub fn data_element_group(id: &str) -> Source {
    Source::data_element_group(id, format!("EXPORT {}", id))
}

pub fn periods(tokens: &[&str]) -> Vec<Period> {
    tokens.iter().map(|t| Period::parse(t).unwrap()).collect()
}

pub fn refs(
    indicator_groups: Vec<Source>,
    data_element_groups: Vec<Source>,
    target_group: Source,
    target_overrides: TargetOverrides,
) -> ProgramRefs {
    ProgramRefs {
        org_scope: OrgScope::new("OUG1"),
        indicator_groups,
        data_element_groups,
        target_group,
        target_overrides,
    }
}

/// One row as `Vec<String>`
pub fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
