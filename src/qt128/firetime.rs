//! Per-channel firing time offsets
//!
//! ```text
//! EEFF,<major>,<minor>
//! Loop num,..,..,<loops>
//! <column header>
//! 128 lines of `<laser id>,<µs>` pairs, one pair per loop
//! ```
use crate::calib::{as_text, field, fields, is_version_line};
use crate::error::CalibrationError;

use super::{LASER_NUM, MAX_LOOPS};

/// Degrees swept per microsecond and RPM
const DEGREES_PER_US_RPM: f64 = 6e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Firetimes {
    /// `[loop][laser]`, microseconds
    loops: Vec<[f32; LASER_NUM]>,
}

impl Firetimes {
    pub fn parse(blob: &[u8]) -> Result<Self, CalibrationError> {
        let mut lines = as_text(blob)?
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| !l.trim().is_empty());
        let mut next = |what| lines.next().ok_or(CalibrationError::MissingHeader(what));

        let (_, line) = next("fire times version")?;
        if !is_version_line(line) {
            return Err(CalibrationError::InvalidDelimiter);
        }
        let (n, line) = next("fire times loop count")?;
        let loop_count: usize = field(&fields(line), 3, n)?;
        if loop_count == 0 || loop_count > MAX_LOOPS {
            return Err(CalibrationError::InvalidField { line: n, field: line.into() });
        }
        next("fire times columns")?;

        let mut loops = vec![[0f32; LASER_NUM]; loop_count];
        for row in 0..LASER_NUM {
            let (n, line) = next("").map_err(|_| CalibrationError::LineCount {
                expected: LASER_NUM,
                actual: row,
            })?;
            let f = fields(line);
            if f.len() != 2 * loop_count {
                return Err(CalibrationError::InvalidField { line: n, field: line.into() });
            }
            for (l, times) in loops.iter_mut().enumerate() {
                let id: i64 = field(&f, 2 * l, n)?;
                if id < 1 || id as usize > LASER_NUM {
                    return Err(CalibrationError::LaserId { line: n, id });
                }
                times[id as usize - 1] = field(&f, 2 * l + 1, n)?;
            }
        }
        Ok(Self { loops })
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Firing offset in microseconds, zero for unknown loops or lasers
    pub fn get(&self, loop_index: usize, laser: usize) -> f32 {
        self.loops.get(loop_index)
            .and_then(|l| l.get(laser))
            .copied()
            .unwrap_or(0.)
    }

    /// Azimuth swept during the firing offset, milli-degrees
    #[inline]
    pub fn azimuth_offset(&self, loop_index: usize, laser: usize, rpm: u16) -> i64 {
        let deg = self.get(loop_index, laser) as f64 * rpm as f64 * DEGREES_PER_US_RPM;
        (deg * 1000.).round() as i64
    }
}
