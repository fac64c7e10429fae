//! Error types
//!
//! Decoding, calibration loading and channel queries fail independently, so
//! each has its own error type. None of them is fatal for the decoder: a
//! rejected packet leaves frame state untouched and a failed calibration load
//! leaves the previously loaded calibration in place.
use std::io;

/// Reasons a single packet was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Packet does not start with `0xEE 0xFF`
    #[error("invalid packet delimiter {0:#04x} {1:#04x}")]
    InvalidDelimiter(u8, u8),
    /// Protocol version does not belong to the decoder's sensor model
    #[error("unsupported protocol version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    /// Packet is shorter than the layout declared by its header
    #[error("packet truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    /// Decode was attempted before a calibration was loaded
    #[error("calibration is not loaded")]
    CalibrationNotLoaded,
    /// Packet addresses more channels than the loaded calibration covers
    #[error("packet uses {declared} channels, calibration covers {loaded}")]
    ChannelMismatch { declared: usize, loaded: usize },
    /// Caller-supplied output slices cannot hold the packet's points
    #[error("output buffer holds {actual} points, packet needs {needed}")]
    OutputTooSmall { needed: usize, actual: usize },
}

/// Reasons a calibration blob (or one of the QT128 auxiliary tables) was
/// rejected. A failed load never replaces already loaded data.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("invalid calibration delimiter")]
    InvalidDelimiter,
    #[error("unsupported calibration version {0}")]
    UnsupportedVersion(u8),
    #[error("calibration truncated while reading {section}")]
    Truncated { section: &'static str },
    #[error("missing header line in {0}")]
    MissingHeader(&'static str),
    #[error("expected {expected} lines, found {actual}")]
    LineCount { expected: usize, actual: usize },
    #[error("invalid laser id {id} on line {line}")]
    LaserId { line: usize, id: i64 },
    #[error("invalid field `{field}` on line {line}")]
    InvalidField { line: usize, field: String },
    #[error("calibration contains no channels")]
    Empty,
    #[error("{0} is not supported by this sensor model")]
    NotSupported(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors of per-channel queries against the loaded calibration.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("calibration is not loaded")]
    NotLoaded,
    #[error("channel {channel} out of range, {loaded} channels loaded")]
    OutOfRange { channel: usize, loaded: usize },
}
