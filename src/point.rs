//! Decoded point representations and the polar to Cartesian transform
use crate::trig::TrigTable;

/// Cartesian point, metres
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct CartesianPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Reflectivity normalized to `[0, 1]`
    pub intensity: f32,
}

impl From<CartesianPoint> for [f32; 3] {
    fn from(p: CartesianPoint) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Spherical point
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct SphericalPoint {
    /// Range in metres
    pub radius: f32,
    /// Azimuth in radians, `[0, 2π)`
    pub theta: f32,
    /// Elevation in radians, `(-π, π]`
    pub phi: f32,
    /// Reflectivity normalized to `[0, 1]`
    pub intensity: f32,
}

/// Convert raw reflectivity byte to point intensity
#[inline(always)]
pub(crate) fn intensity(reflectivity: u8) -> f32 {
    reflectivity as f32 / 255.
}

/// Compute both representations of one return.
///
/// `elevation` and `azimuth` are fixed-point angles in the units of `table`.
/// Azimuth is measured clockwise from the y axis, so `x = r·cos(e)·sin(a)`
/// and `y = r·cos(e)·cos(a)`.
#[inline(always)]
pub fn transform(
    table: &TrigTable,
    range: f32,
    elevation: i64,
    azimuth: i64,
    intensity: f32,
) -> (CartesianPoint, SphericalPoint) {
    let (e_sin, e_cos) = table.sin_cos(elevation);
    let (a_sin, a_cos) = table.sin_cos(azimuth);
    let xy_distance = range * e_cos;
    let cartesian = CartesianPoint {
        x: xy_distance * a_sin,
        y: xy_distance * a_cos,
        z: range * e_sin,
        intensity,
    };
    let spherical = SphericalPoint {
        radius: range,
        theta: table.to_radians(azimuth),
        phi: table.to_signed_radians(elevation),
        intensity,
    };
    (cartesian, spherical)
}
