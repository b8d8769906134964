//! Geometry for line-of-sight and range checks.
//!
//! Contains helper functions for:
//! - ECEF vectors in kilometres
//! - Segment-sphere intersection against a spherical Earth (line of sight)
//! - Distance calculations (squared distance to avoid sqrt in hot paths)
//! - Geodetic (WGS-84) to ECEF conversion for ground stations

use serde::{Deserialize, Serialize};

/// Earth radius used for line-of-sight occlusion, in kilometres. Slightly
/// below the mean equatorial radius so grazing links over the horizon are
/// not blocked by terrain the model does not carry.
pub const R_LOS_DEFAULT_KM: f64 = 6350.0;

/// WGS-84 semi-major axis (km) and first eccentricity squared.
const WGS84_A_KM: f64 = 6378.137;
const WGS84_E2: f64 = 6.694_379_990_141e-3;

/// A position or displacement in the Earth-centred Earth-fixed frame, km.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

/// Squared Euclidean distance in km² (avoids a sqrt in hot paths).
///
/// Range checks compare d² against maxRange² for every node pair every
/// tick; the root is only taken when the actual distance is needed.
pub fn distance2_km(a: &Vec3, b: &Vec3) -> f64 {
    let d = b.sub(a);
    d.dot(&d)
}

/// Convert squared distance back to distance (only when needed).
pub fn distance_from_d2(d2: f64) -> f64 {
    d2.sqrt()
}

pub fn distance_km(a: &Vec3, b: &Vec3) -> f64 {
    distance_from_d2(distance2_km(a, b))
}

/// Line-of-sight test between two positions against a spherical Earth of
/// radius `r_los_km` centred at the origin.
///
/// The segment p1→p2 is parameterised as `p1 + s·(p2−p1)`, `s ∈ [0,1]`,
/// and intersected with the sphere by solving the quadratic
/// `a·s² + b·s + c = 0` with `a = d·d`, `b = 2·p1·d`, `c = p1·p1 − r²`.
/// A non-positive discriminant means the infinite line misses the sphere
/// entirely. Otherwise the sight line is blocked iff either root lies
/// within the segment.
///
/// Degenerate case: coincident positions have line of sight to themselves.
pub fn has_line_of_sight(p1: &Vec3, p2: &Vec3, r_los_km: f64) -> bool {
    let d = p2.sub(p1);
    let a = d.dot(&d);
    if a == 0.0 {
        return true;
    }
    let b = 2.0 * p1.dot(&d);
    let c = p1.dot(p1) - r_los_km * r_los_km;

    let disc = b * b - 4.0 * a * c;
    if disc <= 0.0 {
        return true;
    }

    let sqrt_disc = disc.sqrt();
    let s1 = (-b - sqrt_disc) / (2.0 * a);
    let s2 = (-b + sqrt_disc) / (2.0 * a);
    let blocked = (0.0..=1.0).contains(&s1) || (0.0..=1.0).contains(&s2);
    !blocked
}

/// Convert geodetic coordinates to an ECEF position in kilometres using
/// the WGS-84 ellipsoid.
///
/// # Parameters
///
/// * `lat_deg` - Geodetic latitude in degrees, positive north
/// * `lon_deg` - Longitude in degrees, positive east
/// * `alt_km` - Height above the ellipsoid in kilometres
pub fn geodetic_to_ecef_km(lat_deg: f64, lon_deg: f64, alt_km: f64) -> Vec3 {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let sin_lat = lat.sin();
    let cos_lat = lat.cos();

    // Prime-vertical radius of curvature
    let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    Vec3::new(
        (n + alt_km) * cos_lat * lon.cos(),
        (n + alt_km) * cos_lat * lon.sin(),
        (n * (1.0 - WGS84_E2) + alt_km) * sin_lat,
    )
}
