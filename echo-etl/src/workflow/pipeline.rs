//! Pipeline orchestrator
//!
//! # Stages
//! 1. Bootstrap (resolve group, org unit and override ids)
//! 2. Period window for today
//! 3. Indicator groups, monthly with quarterly fallback
//! 4. Data-element groups, monthly with quarterly fallback
//! 5. Annual targets, expanded over the target scaffold
//! 6. Union
//! 7. Backup of the previous outputs, then the new artifacts
//!
//! # Error Handling
//! - Fetch failures and schema mismatches degrade the affected batch only;
//!   they show up as counts in [`PipelineReport`]
//! - Bootstrap and output failures abort the run

use crate::config::EtlConfig;
use crate::error::{EtlError, EtlResult};
use crate::models::{MetricRow, Period};
use crate::services::analytics_client::{AnalyticsClient, MetricFetcher};
use crate::services::backup::backup_previous_outputs;
use crate::services::fallback_retriever::{FallbackRetriever, PassReport, RetrievalReport};
use crate::services::metric_union::union;
use crate::services::output_writer::{
    write_data_values, write_update_stamp, DATA_VALUES_FILE, UPDATE_STAMP_FILE,
};
use crate::services::period_lattice::{generate_annual, PeriodScaffold, PeriodWindow};
use crate::services::reference_client::{ProgramRefs, ReferenceClient};
use crate::services::target_expander::expand;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use echo_common::config::ProgramConfig;
use echo_common::time::{fixed_offset, UpdateStamp};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Per-stage counts for one run
///
/// A run that degraded (failed calls, rejected batches, dropped targets)
/// still completes; these numbers are how it is noticed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub monthly_periods: usize,
    pub quarterly_periods: usize,

    pub indicator_rows: usize,
    /// Indicator groups that needed the quarterly pass
    pub indicator_starved: Vec<String>,

    pub data_element_rows: usize,
    pub data_element_starved: Vec<String>,

    pub annual_target_rows: usize,
    pub expanded_target_rows: usize,
    /// Annual targets with no scaffold entry or a non-numeric value
    pub dropped_targets: usize,

    pub failed_calls: usize,
    pub schema_errors: usize,

    /// Rows in the merged table
    pub output_rows: usize,
}

impl PipelineReport {
    /// True if any call failed or any batch was left untyped
    pub fn is_degraded(&self) -> bool {
        self.failed_calls > 0 || self.schema_errors > 0
    }

    fn absorb_retrieval(&mut self, report: &RetrievalReport) {
        self.failed_calls += report.failure_count();
        self.schema_errors += report.schema_error_count();
    }

    fn absorb_pass(&mut self, report: &PassReport) {
        self.failed_calls += report.failures.len();
        self.schema_errors += report.schema_errors.len();
    }
}

/// Retrieval and reconciliation over already-resolved program references
pub struct MetricPipeline {
    retriever: FallbackRetriever,
    refs: ProgramRefs,
    program: ProgramConfig,
}

impl MetricPipeline {
    pub fn new(
        fetcher: Arc<dyn MetricFetcher>,
        refs: ProgramRefs,
        program: ProgramConfig,
        concurrency: usize,
    ) -> Self {
        let retriever = FallbackRetriever::new(fetcher, refs.org_scope.clone(), concurrency);
        Self {
            retriever,
            refs,
            program,
        }
    }

    /// Run every retrieval pass for `today` and return the merged table
    pub async fn collect(&self, today: NaiveDate) -> EtlResult<(Vec<MetricRow>, PipelineReport)> {
        let mut report = PipelineReport::default();
        let year = today.year();

        let window = PeriodWindow::for_date(
            today,
            self.program.first_year,
            &Period::parse(&self.program.first_month)?,
            &Period::parse(&self.program.first_quarter)?,
        )?;
        report.monthly_periods = window.monthly.len();
        report.quarterly_periods = window.quarterly.len();
        info!(
            monthly = window.monthly.len(),
            quarterly = window.quarterly.len(),
            %today,
            "Period window computed"
        );

        let indicators = self
            .retriever
            .retrieve_with_fallback(&window.monthly, &window.quarterly, &self.refs.indicator_groups)
            .await;
        report.absorb_retrieval(&indicators);
        report.indicator_rows = indicators.row_count();
        report.indicator_starved = indicators.starved.clone();

        let data_elements = self
            .retriever
            .retrieve_with_fallback(&window.monthly, &window.quarterly, &self.refs.data_element_groups)
            .await;
        report.absorb_retrieval(&data_elements);
        report.data_element_rows = data_elements.row_count();
        report.data_element_starved = data_elements.starved.clone();

        let annual_periods = generate_annual(self.program.first_year, year);
        let targets = self
            .retriever
            .collect_pass(&annual_periods, std::slice::from_ref(&self.refs.target_group), "annual")
            .await;
        report.absorb_pass(&targets);
        report.annual_target_rows = targets.rows.len();

        let scaffold = PeriodScaffold::build(self.program.first_year, year, self.program.target_start_year);
        let expansion = expand(&targets.rows, &self.refs.target_overrides, &scaffold);
        report.expanded_target_rows = expansion.rows.len();
        report.dropped_targets = expansion.dropped + expansion.unparseable;

        let merged = union(indicators.into_rows(), data_elements.into_rows(), expansion.rows);
        report.output_rows = merged.len();

        Ok((merged, report))
    }
}

/// Full run: bootstrap against the live API, collect, write artifacts
pub struct Pipeline {
    client: Arc<AnalyticsClient>,
    config: EtlConfig,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> EtlResult<Self> {
        let client = Arc::new(AnalyticsClient::new(&config.client)?);
        Ok(Self { client, config })
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Execute one extraction run as of `now`
    pub async fn run(&self, now: DateTime<Utc>) -> EtlResult<PipelineReport> {
        let started = Instant::now();
        // Checked before any network work
        let program_offset = fixed_offset(self.config.program.utc_offset_hours)?;

        info!(base_url = %self.config.client.base_url, "Resolving program references");
        let refs = ReferenceClient::new(Arc::clone(&self.client), self.config.program.clone())
            .resolve()
            .await?;

        let fetcher: Arc<dyn MetricFetcher> = self.client.clone();
        let core = MetricPipeline::new(fetcher, refs, self.config.program.clone(), self.config.concurrency);
        let today = now.with_timezone(&program_offset).date_naive();
        let (rows, report) = core.collect(today).await?;

        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir)
            .map_err(|e| EtlError::Output(format!("{}: {}", output_dir.display(), e)))?;

        let backup = backup_previous_outputs(output_dir);
        if !backup.failed.is_empty() {
            warn!(files = ?backup.failed, "Some previous outputs were not backed up");
        }

        write_data_values(&output_dir.join(DATA_VALUES_FILE), &rows)?;
        write_update_stamp(&output_dir.join(UPDATE_STAMP_FILE), &UpdateStamp::at(now, program_offset))?;

        info!(
            rows = report.output_rows,
            indicator_rows = report.indicator_rows,
            data_element_rows = report.data_element_rows,
            target_rows = report.expanded_target_rows,
            failed_calls = report.failed_calls,
            schema_errors = report.schema_errors,
            elapsed = ?started.elapsed(),
            "Extraction run completed"
        );
        if report.is_degraded() {
            warn!(
                failed_calls = report.failed_calls,
                schema_errors = report.schema_errors,
                "Run completed with degraded retrieval"
            );
        }

        Ok(report)
    }
}
