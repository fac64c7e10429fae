//! Calibration blobs and the text angle correction used by P128 and QT128
//!
//! The text format is line oriented: an optional column header line, itself
//! optionally preceded by an `EEFF,<major>,<minor>` version line, then one
//! `laser_id,elevation,azimuth` line per channel with angles in degrees.
//! Laser ids are 1-based and must follow each other without gaps.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::CalibrationError;

/// Fixed-point units per degree of the text angle correction
pub const ANGLE_UNIT: f64 = 1000.;

/// Provider of raw calibration bytes.
///
/// Local files implement this through [`FileCalibration`]; a control-channel
/// client fetching the correction from a live sensor plugs in the same way.
pub trait CalibrationSource {
    /// Fetch the whole calibration blob
    fn fetch(&mut self) -> io::Result<Vec<u8>>;

    /// Short description used in log messages
    fn describe(&self) -> String {
        "calibration source".to_string()
    }
}

/// Calibration read from a local file
#[derive(Debug, Clone)]
pub struct FileCalibration {
    path: PathBuf,
}

impl FileCalibration {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl CalibrationSource for FileCalibration {
    fn fetch(&mut self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Calibration held in memory
impl CalibrationSource for Vec<u8> {
    fn fetch(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory blob of {} bytes", self.len())
    }
}

/// Per-channel elevation and azimuth corrections in milli-degrees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AngleCorrection {
    pub elevation: Vec<i32>,
    pub azimuth: Vec<i32>,
}

impl AngleCorrection {
    /// Parse the text format, accepting at most `max_channels` lines.
    pub fn parse(blob: &[u8], max_channels: usize)
        -> Result<Self, CalibrationError>
    {
        let text = as_text(blob)?;
        if text.trim().is_empty() {
            return Err(CalibrationError::MissingHeader("angle correction"));
        }
        let mut lines = text.lines().enumerate().peekable();

        // optional version line and column header
        for _ in 0..2 {
            lines.next_if(|(_, line)| !is_data_line(line));
        }

        let mut res = Self::default();
        for (i, line) in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let n = i + 1;
            let mut fields = line.split(',').map(str::trim);
            let mut next = || fields.next().unwrap_or("");

            let id_str = next();
            let id: i64 = id_str.parse().map_err(|_| invalid(n, id_str))?;
            let expected = res.elevation.len() as i64 + 1;
            if id != expected || id as usize > max_channels {
                return Err(CalibrationError::LaserId { line: n, id });
            }
            let elevation = parse_degrees(n, next())?;
            let azimuth = parse_degrees(n, next())?;
            res.elevation.push(elevation);
            res.azimuth.push(azimuth);
        }
        if res.elevation.is_empty() {
            return Err(CalibrationError::Empty);
        }
        debug!("parsed angle correction for {} channels", res.len());
        Ok(res)
    }

    pub fn len(&self) -> usize {
        self.elevation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevation.is_empty()
    }

    /// Lowest and highest elevation among the first `lasers` channels
    pub(crate) fn elevation_bounds(&self, lasers: usize) -> (i32, i32) {
        let n = lasers.min(self.len());
        self.elevation[..n].iter().fold((i32::MAX, i32::MIN), |(lo, hi), &e| {
            (lo.min(e), hi.max(e))
        })
    }
}

pub(crate) fn invalid(line: usize, field: &str) -> CalibrationError {
    CalibrationError::InvalidField { line, field: field.to_string() }
}

/// Comma separated fields of a text table line
pub(crate) fn fields(line: &str) -> Vec<&str> {
    line.trim().split(',').map(str::trim).collect()
}

/// Parse field `idx` of `fields`, `line` is 1-based for error reporting
pub(crate) fn field<T: std::str::FromStr>(fields: &[&str], idx: usize, line: usize)
    -> Result<T, CalibrationError>
{
    let s = fields.get(idx).copied().unwrap_or("");
    s.parse().map_err(|_| invalid(line, s))
}

/// Whether a line starts with the `EEFF` marker, in any case
pub(crate) fn is_version_line(line: &str) -> bool {
    line.trim_start().get(..4).map_or(false, |s| s.eq_ignore_ascii_case("eeff"))
}

/// A line whose first field is a channel number
fn is_data_line(line: &str) -> bool {
    line.split(',').next().map_or(false, |id| id.trim().parse::<i64>().is_ok())
}

/// Decode text tables, rejecting binary blobs
pub(crate) fn as_text(blob: &[u8]) -> Result<&str, CalibrationError> {
    std::str::from_utf8(blob).map_err(|_| invalid(1, "<binary data>"))
}

fn parse_degrees(line: usize, field: &str) -> Result<i32, CalibrationError> {
    let deg: f64 = field.parse().map_err(|_| invalid(line, field))?;
    if !deg.is_finite() {
        return Err(invalid(line, field));
    }
    Ok((deg * ANGLE_UNIT).round() as i32)
}
