//! Annual target de-annualization
//!
//! Targets are published once per year. Each annual row is divided by a
//! per-metric divisor and repeated across every sub-period of its cadence
//! in that year, so targets line up with the monthly/quarterly actuals.
//!
//! Stock-like metrics (current-on-treatment style) keep their full annual
//! value every month: divisor 1, cadence monthly. That branch repeats rather
//! than divides.

use crate::models::{Cadence, MetricRow, Period};
use crate::services::period_lattice::PeriodScaffold;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Divisor and sub-period cadence applied to one target metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetOverride {
    pub divisor: u32,
    pub cadence: Cadence,
}

impl TargetOverride {
    /// Applied to every metric without an override
    pub const DEFAULT: TargetOverride = TargetOverride {
        divisor: 12,
        cadence: Cadence::Monthly,
    };

    /// Same absolute target every month
    pub const REPEAT_MONTHLY: TargetOverride = TargetOverride {
        divisor: 1,
        cadence: Cadence::Monthly,
    };

    /// Annual target split over four quarters
    pub const QUARTERLY: TargetOverride = TargetOverride {
        divisor: 4,
        cadence: Cadence::Quarterly,
    };
}

/// Display-name rules that select the two override sets; first match wins
const OVERRIDE_RULES: [(&str, TargetOverride); 2] = [
    (r"(?i)target.*_curr", TargetOverride::REPEAT_MONTHLY),
    (r"(?i)target.*tx_pvls", TargetOverride::QUARTERLY),
];

/// Per-metric overrides keyed by data element id
#[derive(Debug, Clone, Default)]
pub struct TargetOverrides {
    by_data: HashMap<String, TargetOverride>,
}

impl TargetOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, data_id: impl Into<String>, target_override: TargetOverride) {
        self.by_data.insert(data_id.into(), target_override);
    }

    /// Override for `data_id`, or the default `(12, Monthly)`
    pub fn resolve(&self, data_id: &str) -> TargetOverride {
        self.by_data
            .get(data_id)
            .copied()
            .unwrap_or(TargetOverride::DEFAULT)
    }

    pub fn len(&self) -> usize {
        self.by_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_data.is_empty()
    }

    /// Build the override sets from `(id, display name)` pairs of data
    /// elements
    pub fn from_data_elements<'a>(elements: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let rules: Vec<(Regex, TargetOverride)> = OVERRIDE_RULES
            .iter()
            .map(|(pattern, target_override)| {
                (
                    Regex::new(pattern).expect("override pattern is a valid regex"),
                    *target_override,
                )
            })
            .collect();

        let mut overrides = Self::new();
        for (id, display_name) in elements {
            if let Some((_, target_override)) = rules.iter().find(|(re, _)| re.is_match(display_name)) {
                debug!(id, display_name, divisor = target_override.divisor, "Target override");
                overrides.insert(id, *target_override);
            }
        }
        overrides
    }
}

/// Outcome of one expansion
#[derive(Debug, Default)]
pub struct ExpansionReport {
    pub rows: Vec<MetricRow>,
    /// Annual rows with no scaffold entry for their year and cadence
    pub dropped: usize,
    /// Annual rows whose value is not a finite number
    pub unparseable: usize,
}

/// Expand annual target rows into per-sub-period rows
///
/// One annual row becomes one row per scaffold entry for
/// `(year, override cadence)`, carrying `annual / divisor`. Rows without a
/// scaffold entry (e.g. years before the target program started) are
/// dropped on purpose.
pub fn expand(
    annual_targets: &[MetricRow],
    overrides: &TargetOverrides,
    scaffold: &PeriodScaffold,
) -> ExpansionReport {
    let mut report = ExpansionReport::default();

    for target in annual_targets {
        let target_override = overrides.resolve(&target.data);

        let annual: f64 = match target.value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                warn!(data = %target.data, value = %target.value, "Target value is not numeric");
                report.unparseable += 1;
                continue;
            }
        };
        let sub_period_value = format_value(annual / f64::from(target_override.divisor));

        let sub_periods = Period::parse(&target.period)
            .ok()
            .filter(|p| p.cadence() == Cadence::Annual)
            .and_then(|p| scaffold.sub_periods(p.year(), target_override.cadence));

        let Some(sub_periods) = sub_periods else {
            debug!(data = %target.data, period = %target.period, "No scaffold entry; target dropped");
            report.dropped += 1;
            continue;
        };

        report.rows.extend(sub_periods.iter().map(|period| MetricRow {
            data: target.data.clone(),
            period: period.to_string(),
            org_unit: target.org_unit.clone(),
            category_option_combo: target.category_option_combo.clone(),
            value: sub_period_value.clone(),
        }));
    }

    info!(
        annual = annual_targets.len(),
        expanded = report.rows.len(),
        dropped = report.dropped,
        unparseable = report.unparseable,
        "Targets expanded"
    );

    report
}

/// Shortest round-trip representation: `100.0` → `"100"`, `0.5` → `"0.5"`
fn format_value(value: f64) -> String {
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(data: &str, year: &str, value: &str) -> MetricRow {
        MetricRow {
            data: data.into(),
            period: year.into(),
            org_unit: "ou1".into(),
            category_option_combo: Some("coc1".into()),
            value: value.into(),
        }
    }

    #[test]
    fn test_default_divides_by_twelve_monthly() {
        let scaffold = PeriodScaffold::build(2019, 2023, 2020);
        let report = expand(&[target("T0", "2023", "1200")], &TargetOverrides::new(), &scaffold);

        assert_eq!(report.rows.len(), 12);
        assert!(report.rows.iter().all(|r| r.value == "100"));
        assert_eq!(report.rows[0].period, "202301");
        assert_eq!(report.rows[11].period, "202312");
        assert!(report.rows.iter().all(|r| r.category_option_combo.as_deref() == Some("coc1")));
    }

    #[test]
    fn test_quarterly_override_yields_four_rows() {
        let scaffold = PeriodScaffold::build(2019, 2023, 2020);
        let mut overrides = TargetOverrides::new();
        overrides.insert("T2", TargetOverride::QUARTERLY);

        let report = expand(&[target("T2", "2021", "100")], &overrides, &scaffold);
        let periods: Vec<_> = report.rows.iter().map(|r| r.period.as_str()).collect();
        assert_eq!(periods, ["2021Q1", "2021Q2", "2021Q3", "2021Q4"]);
        assert!(report.rows.iter().all(|r| r.value == "25"));
    }

    #[test]
    fn test_fractional_values_keep_precision() {
        let scaffold = PeriodScaffold::build(2020, 2020, 2020);
        let report = expand(&[target("T0", "2020", "10")], &TargetOverrides::new(), &scaffold);
        let expected = (10.0_f64 / 12.0).to_string();
        assert!(report.rows.iter().all(|r| r.value == expected));
    }

    #[test]
    fn test_scaffold_gap_is_a_counted_drop() {
        let scaffold = PeriodScaffold::build(2019, 2023, 2020);
        let rows = [target("T0", "2019", "12"), target("T0", "2020", "12")];
        let report = expand(&rows, &TargetOverrides::new(), &scaffold);

        assert_eq!(report.dropped, 1);
        assert_eq!(report.rows.len(), 12);
        assert!(report.rows.iter().all(|r| r.period.starts_with("2020")));
    }

    #[test]
    fn test_non_annual_period_is_dropped() {
        let scaffold = PeriodScaffold::build(2019, 2023, 2020);
        let report = expand(&[target("T0", "202101", "12")], &TargetOverrides::new(), &scaffold);
        assert_eq!(report.dropped, 1);
        assert!(report.rows.is_empty());
    }

    #[test]
    fn test_unparseable_value_is_counted() {
        let scaffold = PeriodScaffold::build(2019, 2023, 2020);
        let rows = [target("T0", "2021", "n/a"), target("T0", "2021", "")];
        let report = expand(&rows, &TargetOverrides::new(), &scaffold);
        assert_eq!(report.unparseable, 2);
        assert!(report.rows.is_empty());
    }

    #[test]
    fn test_overrides_from_display_names() {
        let elements = [
            ("de1", "Target TX_CURR"),
            ("de2", "TARGET: tx_pvls (D)"),
            ("de3", "Target TX_NEW"),
            ("de4", "TX_CURR"),
        ];
        let overrides = TargetOverrides::from_data_elements(elements);

        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides.resolve("de1"), TargetOverride::REPEAT_MONTHLY);
        assert_eq!(overrides.resolve("de2"), TargetOverride::QUARTERLY);
        assert_eq!(overrides.resolve("de3"), TargetOverride::DEFAULT);
        assert_eq!(overrides.resolve("de4"), TargetOverride::DEFAULT);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let overrides = TargetOverrides::from_data_elements([("de1", "target tx_pvls_curr")]);
        assert_eq!(overrides.resolve("de1"), TargetOverride::REPEAT_MONTHLY);
    }
}
