//! Timestamp utilities

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Build a fixed offset from whole hours east of UTC
pub fn fixed_offset(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| Error::InvalidInput(format!("UTC offset out of range: {} hours", hours)))
}

/// One run's update time rendered in the three zones the output records
#[derive(Debug, Clone)]
pub struct UpdateStamp {
    pub utc: DateTime<Utc>,
    pub local: DateTime<Local>,
    pub program: DateTime<FixedOffset>,
}

impl UpdateStamp {
    pub fn at(utc: DateTime<Utc>, program_offset: FixedOffset) -> Self {
        Self {
            utc,
            local: utc.with_timezone(&Local),
            program: utc.with_timezone(&program_offset),
        }
    }

    /// `YYYY-MM-DD HH:MM:SS` strings: UTC, system local, program local
    pub fn formatted(&self) -> [String; 3] {
        const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
        [
            self.utc.format(FORMAT).to_string(),
            self.local.format(FORMAT).to_string(),
            self.program.format(FORMAT).to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_fixed_offset_rejects_out_of_range() {
        assert!(fixed_offset(2).is_ok());
        assert!(fixed_offset(-5).is_ok());
        assert!(fixed_offset(30).is_err());
    }

    #[test]
    fn test_program_stamp_crosses_midnight() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 31, 23, 30, 0).unwrap();
        let stamp = UpdateStamp::at(utc, fixed_offset(2).unwrap());
        let [utc_text, _, program_text] = stamp.formatted();

        assert!(utc_text.starts_with("2024-03-31 23:30:00"));
        // Backup folders are named after the first ten characters
        assert_eq!(&program_text[..10], "2024-04-01");
    }
}
