//! Append-only calibration log.
//!
//! Format version 1, one CSV row per line:
//!
//! ```text
//! {timestamp_ms},x,{slope_0},...,{slope_n-1}
//! {timestamp_ms},y,{intercept_0},...,{intercept_n-1}
//! ```
//!
//! Rows are written in pairs sharing one timestamp. Only the last complete
//! pair matters; it is recovered by scanning backward from the end of the
//! file, so the log can grow without bound. A trailing line without its
//! newline was never committed and is ignored.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{CalError, Result};
use crate::regression::Coefficients;
use crate::util::unix_millis;

pub const FORMAT_VERSION: u32 = 1;

/// Bytes examined from the end of the log when locating the latest pair.
pub const TAIL_SCAN_LIMIT: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLabel {
    Slope,
    Intercept,
}

impl RowLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            RowLabel::Slope => "x",
            RowLabel::Intercept => "y",
        }
    }
}

pub struct CalibrationStore {
    path: PathBuf,
    /// `None` for handles opened with [`CalibrationStore::reader`].
    writer: Option<Mutex<csv::Writer<File>>>,
}

impl core::fmt::Debug for CalibrationStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CalibrationStore")
            .field("path", &self.path)
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

impl CalibrationStore {
    /// Open (creating if needed) the log at `path` for appending.
    ///
    /// An unterminated trailing row was never committed; it is cut off so
    /// it can neither be read back nor merge with the next append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let len = file.metadata()?.len();
        let committed = committed_len(&mut file)?;
        if committed < len {
            warn!(
                path = %path.display(),
                dropped = len - committed,
                "discarding uncommitted trailing row"
            );
            file.set_len(committed)?;
            file.sync_data()?;
        }
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        Ok(Self {
            path,
            writer: Some(Mutex::new(writer)),
        })
    }

    /// Read-only handle. Nothing is created or modified; appends fail.
    pub fn reader(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one labelled row and sync it to disk. Returns the timestamp.
    pub fn append_row(&self, label: RowLabel, values: &[f64]) -> Result<u64> {
        let ts = unix_millis();
        let mut w = self.lock()?;
        write_row(&mut w, ts, label, values)?;
        sync(&mut w)?;
        Ok(ts)
    }

    /// Append the slope row then the intercept row under one timestamp.
    pub fn append_coefficients(&self, coeffs: &[Coefficients]) -> Result<u64> {
        let slopes: Vec<f64> = coeffs.iter().map(|c| c.slope).collect();
        let intercepts: Vec<f64> = coeffs.iter().map(|c| c.intercept).collect();
        let ts = unix_millis();
        let mut w = self.lock()?;
        write_row(&mut w, ts, RowLabel::Slope, &slopes)?;
        write_row(&mut w, ts, RowLabel::Intercept, &intercepts)?;
        sync(&mut w)?;
        debug!(path = %self.path.display(), ts, sensors = coeffs.len(), "coefficient pair appended");
        Ok(ts)
    }

    /// Latest complete `(slope, intercept)` pair, one entry per sensor.
    pub fn read_latest_pair(&self, expected: usize) -> Result<Vec<Coefficients>> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CalError::CorruptCalibration(format!(
                    "{}: no calibration recorded",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let lines = read_tail_lines(&mut file, 2, TAIL_SCAN_LIMIT)?;
        parse_pair(&lines, expected).inspect_err(|e| {
            warn!(path = %self.path.display(), error = %e, "latest calibration unusable");
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, csv::Writer<File>>> {
        let Some(writer) = &self.writer else {
            return Err(CalError::Io(format!(
                "{}: calibration log opened read-only",
                self.path.display()
            )));
        };
        writer
            .lock()
            .map_err(|_| CalError::Io(format!("{}: writer lock poisoned", self.path.display())))
    }
}

/// Length of `r` up to and including its last newline (0 if it has none).
fn committed_len<R: Read + Seek>(r: &mut R) -> io::Result<u64> {
    let mut pos = r.seek(SeekFrom::End(0))?;
    let mut buf = [0u8; 4096];
    while pos > 0 {
        let step = usize::try_from(pos).map_or(buf.len(), |p| p.min(buf.len()));
        pos -= step as u64;
        let chunk = &mut buf[..step];
        r.seek(SeekFrom::Start(pos))?;
        r.read_exact(chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(pos + i as u64 + 1);
        }
    }
    Ok(0)
}

fn write_row(w: &mut csv::Writer<File>, ts: u64, label: RowLabel, values: &[f64]) -> Result<()> {
    let mut row = Vec::with_capacity(values.len() + 2);
    row.push(ts.to_string());
    row.push(label.as_str().to_string());
    row.extend(values.iter().map(f64::to_string));
    w.write_record(&row)?;
    Ok(())
}

fn sync(w: &mut csv::Writer<File>) -> Result<()> {
    w.flush()?;
    w.get_ref().sync_data()?;
    Ok(())
}

/// Last `n` newline-terminated lines of `r`, oldest first.
///
/// Scans backward one byte at a time over at most `max_bytes`. When fewer
/// than `n` lines fit in the window the result is shorter; a line cut by the
/// window edge is dropped unless the window reaches the start of the input.
pub fn read_tail_lines<R: Read + Seek>(r: &mut R, n: usize, max_bytes: u64) -> io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let end = r.seek(SeekFrom::End(0))?;
    let floor = end.saturating_sub(max_bytes);

    // Newline offsets, newest first.
    let mut breaks: Vec<u64> = Vec::with_capacity(n + 1);
    let mut pos = end;
    let mut byte = [0u8; 1];
    while pos > floor && breaks.len() <= n {
        pos -= 1;
        r.seek(SeekFrom::Start(pos))?;
        r.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            breaks.push(pos);
        }
    }

    let Some(&last_end) = breaks.first() else {
        return Ok(Vec::new());
    };
    let (start, cut) = if breaks.len() > n {
        (breaks[n] + 1, false)
    } else {
        (floor, floor > 0)
    };

    let len = usize::try_from(last_end - start).map_err(io::Error::other)?;
    let mut buf = vec![0u8; len];
    r.seek(SeekFrom::Start(start))?;
    r.read_exact(&mut buf)?;

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect();
    if cut {
        lines.remove(0);
    }
    let skip = lines.len().saturating_sub(n);
    Ok(lines.split_off(skip))
}

struct Row {
    label: String,
    values: Vec<f64>,
}

fn parse_row(line: &str) -> Result<Row> {
    if line.trim().is_empty() {
        return Err(CalError::CorruptCalibration("empty calibration row".into()));
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    let rec = match rdr.records().next() {
        Some(rec) => rec.map_err(|e| CalError::CorruptCalibration(e.to_string()))?,
        None => return Err(CalError::CorruptCalibration("empty calibration row".into())),
    };
    if rec.len() < 2 {
        return Err(CalError::CorruptCalibration(format!(
            "calibration row has {} fields, need timestamp and label",
            rec.len()
        )));
    }
    let values = rec
        .iter()
        .skip(2)
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| CalError::CorruptCalibration(format!("{s:?} is not a number")))
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(Row {
        label: rec[1].to_string(),
        values,
    })
}

fn parse_pair(lines: &[String], expected: usize) -> Result<Vec<Coefficients>> {
    let [slope_line, intercept_line] = lines else {
        return Err(CalError::CorruptCalibration(format!(
            "expected a slope and an intercept row, found {} row(s)",
            lines.len()
        )));
    };
    let slopes = parse_row(slope_line)?;
    let intercepts = parse_row(intercept_line)?;

    if slopes.label != RowLabel::Slope.as_str() || intercepts.label != RowLabel::Intercept.as_str() {
        return Err(CalError::CorruptCalibration(format!(
            "torn write: expected labels x,y but found {},{}",
            slopes.label, intercepts.label
        )));
    }
    if slopes.values.len() != intercepts.values.len() {
        return Err(CalError::CorruptCalibration(format!(
            "{} slopes but {} intercepts",
            slopes.values.len(),
            intercepts.values.len()
        )));
    }
    if slopes.values.len() != expected {
        return Err(CalError::CorruptCalibration(format!(
            "expected {expected} coefficients, found {}",
            slopes.values.len()
        )));
    }
    Ok(slopes
        .values
        .into_iter()
        .zip(intercepts.values)
        .map(|(slope, intercept)| Coefficients { slope, intercept })
        .collect())
}
