//! Precomputed sine/cosine lookup tables
//!
//! Angles on the decoding hot path are fixed-point integers. A table covers
//! one full circle at a given number of units per degree and is indexed by
//! the angle reduced modulo the circle, so no transcendental function is
//! evaluated per point.
use std::f64::consts::PI;
use std::fmt;

/// Milli-degree resolution used by P128 and QT128 corrections
pub const MILLI_DEGREE: u32 = 1000;
/// Centi-degree resolution of the wire azimuth of every model
pub const CENTI_DEGREE: u32 = 100;
/// 1/25600 degree resolution used by AT128 (centi-degree × 256 fine steps)
pub const FINE_DEGREE: u32 = 25_600;

/// Sine/cosine table for one angle resolution
#[derive(Clone)]
pub struct TrigTable {
    units_per_degree: u32,
    sin: Box<[f32]>,
    cos: Box<[f32]>,
}

impl TrigTable {
    /// Build a table with `units_per_degree` entries per degree.
    ///
    /// # Panics
    ///
    /// Panics if `units_per_degree` is zero.
    pub fn new(units_per_degree: u32) -> Self {
        assert!(units_per_degree > 0, "angle resolution must be positive");
        let len = 360 * units_per_degree as usize;
        let step = 2. * PI / len as f64;
        let (sin, cos) = (0..len)
            .map(|i| {
                let (s, c) = (i as f64 * step).sin_cos();
                (s as f32, c as f32)
            })
            .unzip::<_, _, Vec<f32>, Vec<f32>>();
        Self {
            units_per_degree,
            sin: sin.into_boxed_slice(),
            cos: cos.into_boxed_slice(),
        }
    }

    pub fn units_per_degree(&self) -> u32 {
        self.units_per_degree
    }

    /// Number of units in a full circle
    pub fn full_circle(&self) -> i64 {
        self.sin.len() as i64
    }

    /// Reduce `angle` into `[0, full_circle)`
    #[inline(always)]
    pub fn wrap(&self, angle: i64) -> i64 {
        angle.rem_euclid(self.full_circle())
    }

    /// Sine and cosine of `angle`
    #[inline(always)]
    pub fn sin_cos(&self, angle: i64) -> (f32, f32) {
        let i = self.wrap(angle) as usize;
        (self.sin[i], self.cos[i])
    }

    /// Angle in radians within `[0, 2π)`
    #[inline(always)]
    pub fn to_radians(&self, angle: i64) -> f32 {
        (self.wrap(angle) as f64 * 2. * PI / self.full_circle() as f64) as f32
    }

    /// Angle in radians within `(-π, π]`
    #[inline(always)]
    pub fn to_signed_radians(&self, angle: i64) -> f32 {
        let full = self.full_circle();
        let mut a = self.wrap(angle);
        if a > full / 2 {
            a -= full;
        }
        (a as f64 * 2. * PI / full as f64) as f32
    }

    /// Convert angle in degrees into table units, rounding to nearest
    pub fn from_degrees(&self, degrees: f64) -> i64 {
        (degrees * self.units_per_degree as f64).round() as i64
    }
}

impl fmt::Debug for TrigTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TrigTable")
            .field("units_per_degree", &self.units_per_degree)
            .field("len", &self.sin.len())
            .finish()
    }
}
