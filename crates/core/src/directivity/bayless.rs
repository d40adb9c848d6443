//! Bayless, Somerville & Skarlatoudis (2020) near-fault directivity model
//!
//! For each site the model combines a geometric directivity predictor fG built from
//! the GC2 coordinates (U, T) relative to the hypocentre with a magnitude-dependent
//! period scaling b(M, T) and a distance taper:
//!
//! ```text
//! fD      = b(M, T) * (fG - fG_bar) * f_dist
//! phi_red = e(T) * f_dist
//! b(M, T) = b_max(M) * exp(-(log10 T - log10 Tpeak(M))^2 / (2 sigma_g(M)^2))
//! ```
//!
//! `b_max`, `log10 Tpeak` and `sigma_g` are linear in M. `e(T)` is a period table of
//! the maximum within-event standard deviation reduction, interpolated in log period.
//! `fG_bar` is the mean of fG over the sites within Rmax of the rupture trace, so the
//! adjustment averages to zero close to the fault.
//!
//! Geometric predictors:
//! - strike-slip: `fG = min(ln sqrt(S^2 + D^2), ln 465) * |cos(2 theta)|`, theta the
//!   site azimuth from strike, S the along-strike distance clipped to the rupture
//! - dip-slip: `fG = min(ln sqrt(D^2 + Ry^2), ln 188) * max(cos(2 phi), 0)`, phi the
//!   azimuth from the fault normal, Ry the rupture depth below the site (from the dip)
//!
//! Rake weights the two predictions: pure strike-slip within 30 degrees of horizontal,
//! pure dip-slip within 30 degrees of vertical, linear in the folded rake in between.
//!
//! Magnitude is clamped to [5.5, 8] and D is floored at 3 km. These are part of the
//! model's validity range and are applied silently.
//!
//! # Scientific References
//! - Bayless, J., Somerville, P., Skarlatoudis, A. (2020). "A rupture directivity
//!   adjustment model applicable to the NGA-West2 ground motion models and complex
//!   fault geometries". USGS Award G18AP00092 final report
//! - Spudich, P., Chiou, B. (2015). USGS Open-File Report 2015-1028

use nalgebra::DMatrix;

const MIN_MAGNITUDE: f64 = 5.5;
const MAX_MAGNITUDE: f64 = 8.0;
const MIN_D_KM: f64 = 3.0;
const MIN_RMAX_KM: f64 = 20.0;
const MAX_RMAX_KM: f64 = 80.0;
const CENTRING_POINTS: usize = 81;

/// `intercept + slope * M`
#[derive(Debug, Clone, Copy)]
struct Linear {
    intercept: f64,
    slope: f64,
}

impl Linear {
    fn at(self, m: f64) -> f64 {
        self.intercept + self.slope * m
    }
}

const B_MAX: Linear = Linear {
    intercept: 0.5469,
    slope: -0.0336,
};
const LOG10_TPEAK: Linear = Linear {
    intercept: -1.2090,
    slope: 0.2858,
};
const PERIOD_WIDTH: Linear = Linear {
    intercept: -0.6695,
    slope: 0.1714,
};

/// Periods (s) of the phi reduction table
const PHI_RED_PERIODS: [f64; 21] = [
    0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.25, 0.3, 0.4, 0.5, 0.75, 1.0, 1.5, 2.0,
    3.0, 4.0, 5.0, 7.5, 10.0,
];
/// Maximum within-event standard deviation reduction per period
const PHI_RED_MAX: [f64; 21] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.008, 0.020, 0.035, 0.051, 0.067,
    0.080, 0.084, 0.093, 0.110, 0.116,
];

/// Per-style geometric coefficients
#[derive(Debug, Clone, Copy)]
struct StyleCoefficients {
    fs2_cap_km: f64,
    rmax: Linear,
}

const STRIKE_SLIP: StyleCoefficients = StyleCoefficients {
    fs2_cap_km: 465.0,
    rmax: Linear {
        intercept: -60.0,
        slope: 20.0,
    },
};

const DIP_SLIP: StyleCoefficients = StyleCoefficients {
    fs2_cap_km: 188.0,
    rmax: Linear {
        intercept: -20.0,
        slope: 10.0,
    },
};

impl StyleCoefficients {
    fn rmax(&self, m: f64) -> f64 {
        self.rmax.at(m).clamp(MIN_RMAX_KM, MAX_RMAX_KM)
    }
}

/// Period scaling b(M, T)
fn period_scaling(m: f64, period: f64) -> f64 {
    let x = period.log10() - LOG10_TPEAK.at(m);
    let width = PERIOD_WIDTH.at(m);
    B_MAX.at(m) * (-(x * x) / (2.0 * width * width)).exp()
}

/// e(T), interpolated in log period and held constant beyond the table
fn phi_red_max(period: f64) -> f64 {
    let last = PHI_RED_PERIODS.len() - 1;
    if period <= PHI_RED_PERIODS[0] {
        return PHI_RED_MAX[0];
    }
    if period >= PHI_RED_PERIODS[last] {
        return PHI_RED_MAX[last];
    }
    let i = PHI_RED_PERIODS.partition_point(|&p| p < period);
    let (p0, p1) = (PHI_RED_PERIODS[i - 1], PHI_RED_PERIODS[i]);
    let f = (period / p0).ln() / (p1 / p0).ln();
    PHI_RED_MAX[i - 1] + f * (PHI_RED_MAX[i] - PHI_RED_MAX[i - 1])
}

/// (strike-slip, dip-slip) weights of a rake angle (degrees)
fn style_weights(rake: f64) -> (f64, f64) {
    let r = (rake + 180.0).rem_euclid(360.0) - 180.0;
    let folded = r.abs().min(180.0 - r.abs());
    let dip_slip = ((folded - 30.0) / 30.0).clamp(0.0, 1.0);
    (1.0 - dip_slip, dip_slip)
}

/// Rupture geometry seen from the hypocentre
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypocentreGeometry {
    /// GC2 U of the rupture ends relative to the hypocentre (start <= 0 <= end)
    pub smax: (f64, f64),
    /// Down-dip distance from the top of rupture to the hypocentre (km)
    pub d: f64,
    /// Horizontal width of the hypocentre's plane (km)
    pub tbot: f64,
    /// Depth of the top of the hypocentre's plane (km)
    pub dtop: f64,
    /// Depth of the bottom of the hypocentre's plane (km)
    pub dbot: f64,
    /// Dip of the hypocentre's plane (degrees)
    pub dip: f64,
}

/// Site coordinates and evaluation settings for one hypocentre
#[derive(Debug, Clone, Copy)]
pub struct BaylessInput<'a> {
    /// GC2 U per site, origin at the hypocentre
    pub u: &'a [f64],
    /// GC2 T per site
    pub t: &'a [f64],
    /// Rupture distance per site (km)
    pub rrup: &'a [f64],
    /// Hypocentre geometry
    pub geometry: HypocentreGeometry,
    /// Moment magnitude
    pub magnitude: f64,
    /// Rake (degrees)
    pub rake: f64,
    /// Spectral periods (s)
    pub periods: &'a [f64],
}

/// Model output, sites x periods
#[derive(Debug, Clone, PartialEq)]
pub struct BaylessOutput {
    /// ln directivity adjustment
    pub fd: DMatrix<f64>,
    /// Reduction of the within-event standard deviation
    pub phi_red: DMatrix<f64>,
}

fn fg_strike_slip(u: f64, t: f64, geo: &HypocentreGeometry) -> f64 {
    let s = u.clamp(geo.smax.0, geo.smax.1);
    let fs2 = (s * s + geo.d * geo.d)
        .sqrt()
        .ln()
        .min(STRIKE_SLIP.fs2_cap_km.ln());
    let mut theta = (t / u).atan().abs();
    if theta.is_nan() {
        theta = 0.0;
    }
    fs2 * (2.0 * theta).cos().abs()
}

fn fg_dip_slip(u: f64, t: f64, geo: &HypocentreGeometry) -> f64 {
    let height = geo.dbot - geo.dtop;
    let ry = if t < 0.0 {
        0.0
    } else if t <= geo.tbot {
        (t * geo.dip.to_radians().tan()).min(height)
    } else {
        height
    };
    let fs2 = (geo.d * geo.d + ry * ry)
        .sqrt()
        .ln()
        .min(DIP_SLIP.fs2_cap_km.ln());
    let mut phi = (u / t).atan().abs();
    if phi.is_nan() {
        phi = 0.0;
    }
    fs2 * (2.0 * phi).cos().max(0.0)
}

fn distance_taper(rrup: f64, rmax: f64) -> f64 {
    if rrup >= rmax {
        0.0
    } else if rrup <= 0.0 {
        1.0
    } else {
        1.0 - (4.0 - 4.0 * rmax / rrup).exp()
    }
}

/// Mean of fG over the sites within `rmax` of the trace, on a regular (U, T) grid
fn centring(fg: impl Fn(f64, f64) -> f64, smax: (f64, f64), rmax: f64) -> f64 {
    let (u0, u1) = (smax.0 - rmax, smax.1 + rmax);
    let du = (u1 - u0) / CENTRING_POINTS as f64;
    let dt = 2.0 * rmax / CENTRING_POINTS as f64;
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..CENTRING_POINTS {
        let u = u0 + (i as f64 + 0.5) * du;
        let beyond = (smax.0 - u).max(u - smax.1).max(0.0);
        for j in 0..CENTRING_POINTS {
            let t = -rmax + (j as f64 + 0.5) * dt;
            if beyond.hypot(t) <= rmax {
                sum += fg(u, t);
                count += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn predict(
    input: &BaylessInput<'_>,
    geo: &HypocentreGeometry,
    m: f64,
    style: &StyleCoefficients,
    fg: impl Fn(f64, f64, &HypocentreGeometry) -> f64,
) -> BaylessOutput {
    let n_sites = input.u.len();
    let n_periods = input.periods.len();
    let rmax = style.rmax(m);
    let fg_bar = centring(|u, t| fg(u, t, geo), geo.smax, rmax);
    let b: Vec<f64> = input.periods.iter().map(|&p| period_scaling(m, p)).collect();
    let e: Vec<f64> = input.periods.iter().map(|&p| phi_red_max(p)).collect();

    let mut fd = DMatrix::zeros(n_sites, n_periods);
    let mut phi_red = DMatrix::zeros(n_sites, n_periods);
    for i in 0..n_sites {
        let centred = fg(input.u[i], input.t[i], geo) - fg_bar;
        let taper = distance_taper(input.rrup[i], rmax);
        for j in 0..n_periods {
            fd[(i, j)] = b[j] * centred * taper;
            phi_red[(i, j)] = e[j] * taper;
        }
    }
    BaylessOutput { fd, phi_red }
}

/// Directivity adjustment for one hypocentre
pub fn bayless_2020(input: &BaylessInput<'_>) -> BaylessOutput {
    let m = input.magnitude.clamp(MIN_MAGNITUDE, MAX_MAGNITUDE);
    let geo = HypocentreGeometry {
        d: input.geometry.d.max(MIN_D_KM),
        ..input.geometry
    };
    let (w_ss, w_ds) = style_weights(input.rake);

    let mut out = BaylessOutput {
        fd: DMatrix::zeros(input.u.len(), input.periods.len()),
        phi_red: DMatrix::zeros(input.u.len(), input.periods.len()),
    };
    if w_ss > 0.0 {
        let ss = predict(input, &geo, m, &STRIKE_SLIP, fg_strike_slip);
        out.fd += ss.fd * w_ss;
        out.phi_red += ss.phi_red * w_ss;
    }
    if w_ds > 0.0 {
        let ds = predict(input, &geo, m, &DIP_SLIP, fg_dip_slip);
        out.fd += ds.fd * w_ds;
        out.phi_red += ds.phi_red * w_ds;
    }
    out
}
