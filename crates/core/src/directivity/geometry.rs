//! Rectangular fault planes, GC2 coordinates and rupture distance
//!
//! Geometry lives in a local Cartesian frame in kilometres: x east, y north, depth
//! positive down. Strike is measured clockwise from north and planes dip to the
//! right of the strike direction.
//!
//! # Scientific References
//! - Spudich, P., Chiou, B. (2015). "Strike-parallel and strike-normal coordinate
//!   system around geometrically complicated rupture traces: use by NGA-West2 and
//!   further improvements". USGS Open-File Report 2015-1028

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Marker for "no hypocentre on this plane"
pub const NO_HYPOCENTRE: f64 = -999.9;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Rectangular fault plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Midpoint of the top edge (km, local frame)
    pub centre: Vector2<f64>,
    /// Strike (degrees clockwise from north)
    pub strike: f64,
    /// Dip (degrees)
    pub dip: f64,
    /// Along-strike length (km)
    pub length: f64,
    /// Down-dip width (km)
    pub width: f64,
    /// Depth of the top edge (km)
    pub dtop: f64,
    /// Hypocentre along strike from the plane centre (km), or [`NO_HYPOCENTRE`]
    pub shyp: f64,
    /// Hypocentre down dip from the top edge (km), or [`NO_HYPOCENTRE`]
    pub dhyp: f64,
}

impl Plane {
    /// Plane without a hypocentre
    pub fn new(centre: Vector2<f64>, strike: f64, dip: f64, length: f64, width: f64, dtop: f64) -> Self {
        Self {
            centre,
            strike,
            dip,
            length,
            width,
            dtop,
            shyp: NO_HYPOCENTRE,
            dhyp: NO_HYPOCENTRE,
        }
    }

    /// Whether this plane carries the hypocentre
    pub fn has_hypocentre(&self) -> bool {
        self.shyp != NO_HYPOCENTRE && self.dhyp != NO_HYPOCENTRE
    }

    /// Horizontal unit vector along strike
    pub fn strike_unit(&self) -> Vector2<f64> {
        let s = self.strike.to_radians();
        Vector2::new(s.sin(), s.cos())
    }

    /// Horizontal unit vector in the dip direction (right of strike)
    pub fn normal_unit(&self) -> Vector2<f64> {
        let s = self.strike.to_radians();
        Vector2::new(s.cos(), -s.sin())
    }

    /// Start of the top edge
    pub fn trace_start(&self) -> Vector2<f64> {
        self.centre - self.strike_unit() * (self.length / 2.0)
    }

    /// End of the top edge
    pub fn trace_end(&self) -> Vector2<f64> {
        self.centre + self.strike_unit() * (self.length / 2.0)
    }

    /// Depth of the bottom edge (km)
    pub fn bottom_depth(&self) -> f64 {
        self.dtop + self.width * self.dip.to_radians().sin()
    }

    /// Horizontal projection of the width (km)
    pub fn surface_width(&self) -> f64 {
        self.width * self.dip.to_radians().cos()
    }

    /// Closest distance from a surface point to the plane (km)
    pub fn rrup(&self, site: &Vector2<f64>) -> f64 {
        let dip = self.dip.to_radians();
        let s = self.strike_unit();
        let n = self.normal_unit();
        let origin = Vector3::new(self.trace_start().x, self.trace_start().y, self.dtop);
        let along = Vector3::new(s.x, s.y, 0.0);
        let down = Vector3::new(n.x * dip.cos(), n.y * dip.cos(), dip.sin());

        let p = Vector3::new(site.x, site.y, 0.0) - origin;
        let a = p.dot(&along).clamp(0.0, self.length);
        let b = p.dot(&down).clamp(0.0, self.width);
        (p - along * a - down * b).norm()
    }
}

/// Rupture distance to the closest plane
pub fn fault_rrup(planes: &[Plane], site: &Vector2<f64>) -> f64 {
    planes
        .iter()
        .map(|p| p.rrup(site))
        .fold(f64::INFINITY, f64::min)
}

/// Total along-strike trace length
pub fn trace_length(planes: &[Plane]) -> f64 {
    planes.iter().map(|p| p.length).sum()
}

/// GC2 (U, T) of a site relative to the start of the trace
///
/// Each plane's top edge is one trace segment; segments are taken in order and U
/// accumulates their lengths. T is positive on the dip side.
pub fn gc2(planes: &[Plane], site: &Vector2<f64>) -> (f64, f64) {
    const ON_TRACE: f64 = 1e-9;

    let mut offset = 0.0;
    let mut w_sum = 0.0;
    let mut wt_sum = 0.0;
    let mut wu_sum = 0.0;
    for plane in planes {
        let p = site - plane.trace_start();
        let u = p.dot(&plane.strike_unit());
        let t = p.dot(&plane.normal_unit());
        let l = plane.length;

        let w = if t.abs() < ON_TRACE {
            if (0.0..=l).contains(&u) {
                return (offset + u, 0.0);
            }
            1.0 / (u - l) - 1.0 / u
        } else {
            (((l - u) / t).atan() - (-u / t).atan()) / t
        };
        w_sum += w;
        wt_sum += w * t;
        wu_sum += w * (u + offset);
        offset += l;
    }
    (wu_sum / w_sum, wt_sum / w_sum)
}

/// Project a latitude / longitude onto the local kilometre frame (equirectangular)
pub fn to_local_km(lat: f64, lon: f64, ref_lat: f64, ref_lon: f64) -> Vector2<f64> {
    let x = (lon - ref_lon).to_radians() * ref_lat.to_radians().cos() * EARTH_RADIUS_KM;
    let y = (lat - ref_lat).to_radians() * EARTH_RADIUS_KM;
    Vector2::new(x, y)
}

/// Regular grid of sites around the fault's surface projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteGrid {
    /// Grid points (km, local frame)
    pub sites: Vec<Vector2<f64>>,
    /// Points along x
    pub nx: usize,
    /// Points along y
    pub ny: usize,
}

impl SiteGrid {
    /// `n` x `n` grid covering the fault plus `buffer_km` on every side
    pub fn around(planes: &[Plane], buffer_km: f64, n: usize) -> Self {
        let mut lo = Vector2::new(f64::INFINITY, f64::INFINITY);
        let mut hi = Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for plane in planes {
            let bottom_offset = plane.normal_unit() * plane.surface_width();
            for corner in [
                plane.trace_start(),
                plane.trace_end(),
                plane.trace_start() + bottom_offset,
                plane.trace_end() + bottom_offset,
            ] {
                lo = lo.inf(&corner);
                hi = hi.sup(&corner);
            }
        }
        lo -= Vector2::new(buffer_km, buffer_km);
        hi += Vector2::new(buffer_km, buffer_km);

        let step = |a: f64, b: f64, i: usize| {
            if n > 1 {
                a + (b - a) * i as f64 / (n - 1) as f64
            } else {
                0.5 * (a + b)
            }
        };
        let mut sites = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                sites.push(Vector2::new(step(lo.x, hi.x, i), step(lo.y, hi.y, j)));
            }
        }
        Self { sites, nx: n, ny: n }
    }
}
