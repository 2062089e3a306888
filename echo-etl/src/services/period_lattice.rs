//! Period lattice generation and filtering
//!
//! The query window is bounded below by fixed program start periods and
//! above by the current calendar period (exclusive), so it grows by one
//! period per elapsed month or quarter.

use crate::error::{EtlError, EtlResult};
use crate::models::{Cadence, Period};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// `YYYY01..YYYY12` for every year in `start_year..=end_year`
pub fn generate_monthly(start_year: i32, end_year: i32) -> Vec<Period> {
    (start_year..=end_year)
        .flat_map(|year| (1..=12).map(move |month| Period::monthly(year, month)))
        .collect()
}

/// `YYYYQ1..YYYYQ4` for every year in `start_year..=end_year`
pub fn generate_quarterly(start_year: i32, end_year: i32) -> Vec<Period> {
    (start_year..=end_year)
        .flat_map(|year| (1..=4).map(move |quarter| Period::quarterly(year, quarter)))
        .collect()
}

/// `YYYY` for every year in `start_year..=end_year`
pub fn generate_annual(start_year: i32, end_year: i32) -> Vec<Period> {
    (start_year..=end_year).map(Period::annual).collect()
}

/// Keep periods with `lo <= p < hi`
///
/// Lexical comparison is only chronological within one cadence, so both
/// bounds and every period must share a cadence.
pub fn filter_range(periods: &[Period], lo: &Period, hi: &Period) -> EtlResult<Vec<Period>> {
    let cadence = lo.cadence();
    if hi.cadence() != cadence {
        return Err(EtlError::MixedCadence(format!(
            "bounds {} ({}) and {} ({})",
            lo,
            cadence,
            hi,
            hi.cadence()
        )));
    }
    if let Some(odd) = periods.iter().find(|p| p.cadence() != cadence) {
        return Err(EtlError::MixedCadence(format!(
            "{} ({}) filtered against {} bounds",
            odd,
            odd.cadence(),
            cadence
        )));
    }

    Ok(periods
        .iter()
        .filter(|p| *p >= lo && *p < hi)
        .cloned()
        .collect())
}

pub fn current_month(today: NaiveDate) -> Period {
    Period::monthly(today.year(), today.month())
}

pub fn current_quarter(today: NaiveDate) -> Period {
    Period::quarterly(today.year(), (today.month() - 1) / 3 + 1)
}

/// Monthly and quarterly periods to query on a given date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodWindow {
    pub monthly: Vec<Period>,
    pub quarterly: Vec<Period>,
}

impl PeriodWindow {
    /// Lattice from `first_year` through the current year, cut to
    /// `[first_month, current month)` and `[first_quarter, current quarter)`
    pub fn for_date(
        today: NaiveDate,
        first_year: i32,
        first_month: &Period,
        first_quarter: &Period,
    ) -> EtlResult<Self> {
        let end_year = today.year();
        let monthly = filter_range(
            &generate_monthly(first_year, end_year),
            first_month,
            &current_month(today),
        )?;
        let quarterly = filter_range(
            &generate_quarterly(first_year, end_year),
            first_quarter,
            &current_quarter(today),
        )?;

        Ok(Self { monthly, quarterly })
    }
}

/// `(year, cadence) → ordered sub-periods`, used to spread an annual target
/// over the months or quarters of its year
#[derive(Debug, Clone, Default)]
pub struct PeriodScaffold {
    entries: BTreeMap<(String, Cadence), Vec<Period>>,
}

impl PeriodScaffold {
    /// Monthly and quarterly lattice over `first_year..=end_year`, keeping
    /// only years at or after `target_start_year`
    pub fn build(first_year: i32, end_year: i32, target_start_year: i32) -> Self {
        let start = first_year.max(target_start_year);
        let periods = generate_monthly(start, end_year)
            .into_iter()
            .chain(generate_quarterly(start, end_year));
        Self::from_periods(periods)
    }

    /// Group arbitrary periods by year and cadence, preserving input order
    /// within each group. Annual periods are ignored.
    pub fn from_periods(periods: impl IntoIterator<Item = Period>) -> Self {
        let mut entries: BTreeMap<(String, Cadence), Vec<Period>> = BTreeMap::new();
        for period in periods {
            let cadence = period.cadence();
            if cadence == Cadence::Annual {
                continue;
            }
            entries
                .entry((period.year().to_string(), cadence))
                .or_default()
                .push(period);
        }
        Self { entries }
    }

    pub fn sub_periods(&self, year: &str, cadence: Cadence) -> Option<&[Period]> {
        self.entries
            .get(&(year.to_string(), cadence))
            .map(Vec::as_slice)
    }

    /// Number of `(year, cadence)` entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
