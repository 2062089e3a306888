//! CSV output artifacts
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! failed run never leaves a half-written `dataValues.csv` behind.

use crate::error::{EtlError, EtlResult};
use crate::models::{MetricRow, OUTPUT_COLUMNS};
use echo_common::time::UpdateStamp;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DATA_VALUES_FILE: &str = "dataValues.csv";
pub const UPDATE_STAMP_FILE: &str = "dataUpdateDatetime.csv";

pub const UPDATE_STAMP_COLUMNS: [&str; 3] = [
    "Data Update Datetime UTC",
    "Data Update Datetime Local",
    "Data Update Datetime Program",
];

/// Write the merged metric table; returns the number of data rows
pub fn write_data_values(path: &Path, rows: &[MetricRow]) -> EtlResult<usize> {
    write_atomically(path, |writer| {
        writer.write_record(OUTPUT_COLUMNS)?;
        for row in rows {
            writer.write_record(row.to_record())?;
        }
        Ok(())
    })?;

    info!(path = %path.display(), rows = rows.len(), "Wrote data values");
    Ok(rows.len())
}

/// Write the single-row update timestamp file
pub fn write_update_stamp(path: &Path, stamp: &UpdateStamp) -> EtlResult<()> {
    write_atomically(path, |writer| {
        writer.write_record(UPDATE_STAMP_COLUMNS)?;
        writer.write_record(stamp.formatted())?;
        Ok(())
    })?;

    info!(path = %path.display(), "Wrote update timestamp");
    Ok(())
}

fn write_atomically<F>(path: &Path, fill: F) -> EtlResult<()>
where
    F: FnOnce(&mut csv::Writer<std::fs::File>) -> Result<(), csv::Error>,
{
    let tmp = temp_path(path);
    let result = (|| -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(&tmp)?;
        fill(&mut writer)?;
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(output_error(path, e));
    }

    std::fs::rename(&tmp, path).map_err(|e| output_error(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn output_error(path: &Path, err: impl std::fmt::Display) -> EtlError {
    EtlError::Output(format!("{}: {}", path.display(), err))
}
