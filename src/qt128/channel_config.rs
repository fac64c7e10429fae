//! Channel remap table of sensors running a custom firing sequence
//!
//! ```text
//! EEFF,<major>,<minor>
//! Laser num,<lasers>,Block num,<blocks>
//! <one column header per loop>
//! <lasers lines of loop-count 1-based laser ids>
//! <hash>
//! ```
use crate::calib::{as_text, field, fields, is_version_line};
use crate::error::CalibrationError;

use super::{LASER_NUM, MAX_LOOPS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub major: u8,
    pub minor: u8,
    pub laser_count: usize,
    pub block_count: usize,
    /// `[loop][position]`, 0-based laser ids
    table: Vec<Vec<u16>>,
    pub hash: Option<String>,
}

impl ChannelConfig {
    pub fn parse(blob: &[u8]) -> Result<Self, CalibrationError> {
        let mut lines = as_text(blob)?
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| !l.trim().is_empty());
        let mut next = |what| lines.next().ok_or(CalibrationError::MissingHeader(what));

        let (n, line) = next("channel config version")?;
        if !is_version_line(line) {
            return Err(CalibrationError::InvalidDelimiter);
        }
        let f = fields(line);
        let major = field(&f, 1, n)?;
        let minor = field(&f, 2, n)?;

        let (n, line) = next("channel config size")?;
        let f = fields(line);
        let laser_count: usize = field(&f, 1, n)?;
        let block_count: usize = field(&f, 3, n)?;
        if laser_count == 0 || laser_count > LASER_NUM {
            return Err(CalibrationError::InvalidField { line: n, field: f[1].into() });
        }
        if block_count == 0 {
            return Err(CalibrationError::InvalidField { line: n, field: f[3].into() });
        }

        let (n, line) = next("channel config columns")?;
        let loops = fields(line).len();
        if loops > MAX_LOOPS {
            return Err(CalibrationError::InvalidField { line: n, field: line.into() });
        }

        let mut table = vec![Vec::with_capacity(laser_count); loops];
        for row in 0..laser_count {
            let (n, line) = match next("") {
                Ok(v) => v,
                Err(_) => return Err(CalibrationError::LineCount {
                    expected: laser_count,
                    actual: row,
                }),
            };
            let f = fields(line);
            if f.len() != loops {
                return Err(CalibrationError::InvalidField { line: n, field: line.into() });
            }
            for (l, column) in table.iter_mut().enumerate() {
                let id: i64 = field(&f, l, n)?;
                if id < 1 || id as usize > LASER_NUM {
                    return Err(CalibrationError::LaserId { line: n, id });
                }
                column.push((id - 1) as u16);
            }
        }
        let hash = lines.next().map(|(_, l)| l.trim().to_string());

        Ok(Self { major, minor, laser_count, block_count, table, hash })
    }

    pub fn loop_count(&self) -> usize {
        self.table.len()
    }

    /// Calibration channel of wire position `laser` fired in loop `loop_index`.
    ///
    /// Returns `None` if the table does not cover the position.
    #[inline]
    pub fn remap(&self, loop_index: usize, laser: usize) -> Option<usize> {
        self.table.get(loop_index)?.get(laser).map(|&id| id as usize)
    }

    /// Largest 0-based channel referenced by the table
    pub fn max_channel(&self) -> usize {
        self.table.iter().flatten().copied().max().unwrap_or(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_text(lasers: usize, rows: &[[u16; 2]]) -> String {
        let mut s = format!("EEFF,1,1\nLaser num,{},Block num,2\nLoop1,Loop2\n", lasers);
        for r in rows {
            s += &format!("{},{}\n", r[0], r[1]);
        }
        s + "0123456789abcdef\n"
    }

    #[test]
    fn parse_two_loops() {
        let text = config_text(3, &[[1, 6], [2, 2], [3, 1]]);
        let c = ChannelConfig::parse(text.as_bytes()).unwrap();
        assert_eq!((c.major, c.minor, c.laser_count, c.block_count), (1, 1, 3, 2));
        assert_eq!(c.loop_count(), 2);
        assert_eq!(c.remap(0, 0), Some(0));
        assert_eq!(c.remap(1, 0), Some(5));
        assert_eq!(c.remap(1, 2), Some(0));
        assert_eq!(c.remap(1, 3), None);
        assert_eq!(c.remap(2, 0), None);
        assert_eq!(c.max_channel(), 5);
        assert_eq!(c.hash.as_deref(), Some("0123456789abcdef"));
    }

    #[test]
    fn hash_is_optional() {
        let text = "eeff,1,0\nLaser num,1,Block num,2\nA,B,C\n1,2,3\n";
        let c = ChannelConfig::parse(text.as_bytes()).unwrap();
        assert_eq!(c.loop_count(), 3);
        assert_eq!(c.hash, None);
    }

    #[test]
    fn rejects_inconsistent_tables() {
        let bad_marker = "FFEE,1,1\nLaser num,1,Block num,2\nA,B\n1,2\n";
        assert!(matches!(ChannelConfig::parse(bad_marker.as_bytes()),
            Err(CalibrationError::InvalidDelimiter)));

        let zero_lasers = "EEFF,1,1\nLaser num,0,Block num,2\nA,B\n";
        assert!(matches!(ChannelConfig::parse(zero_lasers.as_bytes()),
            Err(CalibrationError::InvalidField { line: 2, .. })));

        let short = config_text(3, &[[1, 2]]);
        let short = short.replace("0123456789abcdef\n", "");
        assert!(matches!(ChannelConfig::parse(short.as_bytes()),
            Err(CalibrationError::LineCount { expected: 3, actual: 1 })));

        let width = "EEFF,1,1\nLaser num,1,Block num,2\nA,B\n1\n";
        assert!(matches!(ChannelConfig::parse(width.as_bytes()),
            Err(CalibrationError::InvalidField { line: 4, .. })));

        let id = config_text(1, &[[0, 1]]);
        assert!(matches!(ChannelConfig::parse(id.as_bytes()),
            Err(CalibrationError::LaserId { line: 4, id: 0 })));
    }
}
