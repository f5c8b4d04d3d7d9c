//! Per-bank raw and average data logs.
//!
//! Each accepted sample and each set-point average becomes one CSV row:
//! `timestamp_ms,reference_pressure,v_0,...,v_{n-1}` with values printed to
//! two decimals. The average log can be read back into a `CalibrationHistory`
//! to refit a session offline.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::averager::CalibrationHistory;
use crate::error::{CalError, Result};
use crate::util::unix_millis;

/// Sink for one row per accepted sample or set-point average.
pub trait DataLog: Send {
    fn record(&mut self, pressure: f64, values: &[f64]) -> Result<()>;
}

/// Discards every row.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDataLog;

impl DataLog for NullDataLog {
    fn record(&mut self, _pressure: f64, _values: &[f64]) -> Result<()> {
        Ok(())
    }
}

pub struct FileDataLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl FileDataLog {
    /// Create (or truncate) the log at `path`, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;
        tracing::debug!(path = %path.display(), "data log opened");
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataLog for FileDataLog {
    fn record(&mut self, pressure: f64, values: &[f64]) -> Result<()> {
        let mut row = Vec::with_capacity(values.len() + 2);
        row.push(unix_millis().to_string());
        row.push(pressure.to_string());
        row.extend(values.iter().map(|v| format!("{v:.2}")));
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl core::fmt::Debug for FileDataLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileDataLog")
            .field("path", &self.path)
            .finish()
    }
}

/// Rebuild a calibration history from an average log.
///
/// Every row must carry exactly `sensor_count` values after the timestamp and
/// pressure columns.
pub fn read_average_log(path: impl AsRef<Path>, sensor_count: usize) -> Result<CalibrationHistory> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut history = CalibrationHistory::new(sensor_count);
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec?;
        let line = idx + 1;
        if rec.len() != sensor_count + 2 {
            return Err(CalError::Io(format!(
                "{}: line {line}: expected {} fields, got {}",
                path.display(),
                sensor_count + 2,
                rec.len()
            )));
        }
        let parse = |s: &str| -> Result<f64> {
            s.parse::<f64>().map_err(|_| {
                CalError::Io(format!(
                    "{}: line {line}: {s:?} is not a number",
                    path.display()
                ))
            })
        };
        let pressure = parse(&rec[1])?;
        let means = rec
            .iter()
            .skip(2)
            .map(parse)
            .collect::<Result<Vec<f64>>>()?;
        history.push(pressure, &means)?;
    }
    tracing::debug!(path = %path.display(), setpoints = history.setpoints(), "average log loaded");
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_truncates_and_rows_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("avg_readings_LV.csv");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale\n").unwrap();

        let mut log = FileDataLog::create(&path).unwrap();
        log.record(0.0, &[0.5, 0.501]).unwrap();
        log.record(100.0, &[0.9, 0.95]).unwrap();
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
        let first = text.lines().next().unwrap();
        assert!(first.ends_with(",0,0.50,0.50"), "{first}");

        let history = read_average_log(&path, 2).unwrap();
        assert_eq!(history.setpoints(), 2);
        assert_eq!(history.points(1)[1].pressure, 100.0);
        assert_eq!(history.points(1)[1].reading, 0.95);
    }

    #[test]
    fn wrong_width_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avg.csv");
        std::fs::write(&path, "1,0,0.5,0.6\n2,10,0.7\n").unwrap();
        let err = read_average_log(&path, 2).unwrap_err();
        assert!(matches!(err, CalError::Io(ref m) if m.contains("line 2")), "{err}");
    }
}
