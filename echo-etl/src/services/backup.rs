//! Snapshot of the previous run's outputs
//!
//! Before a run overwrites anything, the files it is about to replace are
//! copied to `<output_dir>/Backup/<date>/`, where `<date>` comes from the
//! program-local column of the previous `dataUpdateDatetime.csv`. Backup
//! problems are logged and never stop the run.

use crate::error::EtlResult;
use crate::services::output_writer::{DATA_VALUES_FILE, UPDATE_STAMP_FILE};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const BACKUP_DIR: &str = "Backup";

/// Files copied into each snapshot
pub const BACKUP_FILES: [&str; 2] = [UPDATE_STAMP_FILE, DATA_VALUES_FILE];

/// Column of the update stamp file the snapshot date is taken from
const STAMP_DATE_COLUMN: usize = 2;

#[derive(Debug, Default)]
pub struct BackupReport {
    /// Snapshot directory, if a previous run date was found
    pub directory: Option<PathBuf>,
    pub copied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Date (`YYYY-MM-DD`) of the previous run, if a stamp file exists
pub fn read_previous_run_date(output_dir: &Path) -> EtlResult<Option<String>> {
    let path = output_dir.join(UPDATE_STAMP_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let mut reader = csv::Reader::from_path(&path)?;
    let Some(record) = reader.records().next().transpose()? else {
        return Ok(None);
    };

    let date: String = record
        .get(STAMP_DATE_COLUMN)
        .unwrap_or_default()
        .chars()
        .take(10)
        .collect();

    Ok(is_snapshot_date(&date).then_some(date))
}

/// `YYYY-MM-DD` shape; anything else is refused as a directory name
fn is_snapshot_date(date: &str) -> bool {
    date.len() == 10
        && date.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        })
}

/// Copy the previous outputs into `Backup/<date>/`
pub fn backup_previous_outputs(output_dir: &Path) -> BackupReport {
    let mut report = BackupReport::default();

    let date = match read_previous_run_date(output_dir) {
        Ok(Some(date)) => date,
        Ok(None) => {
            info!("No previous run found; nothing to back up");
            return report;
        }
        Err(e) => {
            warn!(error = %e, "Could not read previous run date; skipping backup");
            return report;
        }
    };

    let backup_dir = output_dir.join(BACKUP_DIR).join(&date);
    if let Err(e) = std::fs::create_dir_all(&backup_dir) {
        warn!(dir = %backup_dir.display(), error = %e, "Backup directory not created");
        return report;
    }

    for name in BACKUP_FILES {
        let src = output_dir.join(name);
        if !src.exists() {
            info!(file = name, "Source file does not exist, skipping");
            report.skipped.push(name.to_string());
            continue;
        }
        match std::fs::copy(&src, backup_dir.join(name)) {
            Ok(_) => {
                info!(file = name, dir = %backup_dir.display(), "Backed up");
                report.copied.push(name.to_string());
            }
            Err(e) => {
                warn!(file = name, error = %e, "Not backed up");
                report.failed.push(name.to_string());
            }
        }
    }

    report.directory = Some(backup_dir);
    report
}
