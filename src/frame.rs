//! Azimuth based frame splitting
//!
//! Spinning sensors report a steadily increasing azimuth except at the
//! 360° → 0° wrap. A jump larger than [`SPLIT_TOLERANCE`] between two
//! consecutive blocks marks the end of a frame.

/// Largest azimuth step (centi-degrees) treated as regular scan advance
pub const SPLIT_TOLERANCE: u32 = 1000;

/// Remembers the last block azimuth seen by a decoder
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameSplitter {
    /// Wire azimuth in centi-degrees, `0` means unset
    last_azimuth: u16,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether moving from the stored azimuth to `azimuth` crosses a frame
    /// boundary. Does not mutate state.
    #[inline]
    pub fn is_boundary(&self, azimuth: u16) -> bool {
        let p = self.last_azimuth;
        p != 0 && (azimuth as i32 - p as i32).unsigned_abs() > SPLIT_TOLERANCE
    }

    /// Same as [`is_boundary`](Self::is_boundary) for sensors with a field
    /// based scan pattern. The field index does not change the test.
    #[inline]
    pub fn is_field_boundary(&self, azimuth: u16, _field: usize) -> bool {
        self.is_boundary(azimuth)
    }

    /// Record `azimuth` and report whether it completed a frame
    #[inline]
    pub fn update(&mut self, azimuth: u16) -> bool {
        let flag = self.is_boundary(azimuth);
        self.last_azimuth = azimuth;
        flag
    }

    /// Record `azimuth` of a block inside `field`
    #[inline]
    pub fn update_field(&mut self, azimuth: u16, field: usize) -> bool {
        let flag = self.is_field_boundary(azimuth, field);
        self.last_azimuth = azimuth;
        flag
    }

    /// Run the block azimuths of one packet through the splitter.
    ///
    /// Returns `true` if any block completed a frame.
    pub fn feed<I: IntoIterator<Item = u16>>(&mut self, azimuths: I) -> bool {
        azimuths.into_iter().fold(false, |acc, a| self.update(a) | acc)
    }

    pub fn last_azimuth(&self) -> u16 {
        self.last_azimuth
    }

    /// Forget the last azimuth, the next block never completes a frame
    pub fn reset(&mut self) {
        self.last_azimuth = 0;
    }
}
