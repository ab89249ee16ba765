//! Coordinate reference systems the layers may arrive in, and the
//! transformations between them.
//!
//! Lengths and intersections are only meaningful in a projected CRS. Serbia
//! lies in UTM zone 34N, whose scale error stays within 0.04% across the
//! country; Web Mercator is kept for parity with figures produced by tools
//! that measured in EPSG:3857.

use geo::{Coord, MapCoords};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;

use crate::{DataError, Result};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM34_CENTRAL_MERIDIAN: f64 = 21.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Crs {
    /// EPSG:4326, longitude/latitude degrees
    #[default]
    Wgs84,
    /// EPSG:3857
    WebMercator,
    /// EPSG:32634, UTM zone 34 north
    Utm34N,
}

impl Crs {
    #[must_use]
    pub fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::WebMercator => 3857,
            Self::Utm34N => 32634,
        }
    }

    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 => Ok(Self::Wgs84),
            3857 | 900_913 => Ok(Self::WebMercator),
            32634 => Ok(Self::Utm34N),
            other => Err(DataError::UnsupportedCrs(format!("EPSG:{other}"))),
        }
    }

    /// Parse the names found in GeoJSON `crs` members, e.g.
    /// `urn:ogc:def:crs:EPSG::3857`, `EPSG:32634` or `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn parse(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.ends_with("CRS84") {
            return Ok(Self::Wgs84);
        }
        let code = trimmed
            .rsplit(':')
            .next()
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| DataError::UnsupportedCrs(trimmed.to_string()))?;
        Self::from_epsg(code)
    }

    #[must_use]
    pub fn is_projected(self) -> bool {
        !matches!(self, Self::Wgs84)
    }

    /// Convert a coordinate in this CRS to longitude/latitude degrees.
    #[must_use]
    pub fn to_lon_lat(self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Wgs84 => c,
            Self::WebMercator => Coord {
                x: (c.x / WGS84_A).to_degrees(),
                y: (2.0 * (c.y / WGS84_A).exp().atan() - FRAC_PI_2).to_degrees(),
            },
            Self::Utm34N => utm_inverse(c, UTM34_CENTRAL_MERIDIAN),
        }
    }

    /// Convert longitude/latitude degrees to this CRS.
    #[must_use]
    pub fn project_lon_lat(self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Wgs84 => c,
            Self::WebMercator => Coord {
                x: WGS84_A * c.x.to_radians(),
                y: WGS84_A * (FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln(),
            },
            Self::Utm34N => utm_forward(c, UTM34_CENTRAL_MERIDIAN),
        }
    }

    #[must_use]
    pub fn transform_coord(self, target: Self, c: Coord<f64>) -> Coord<f64> {
        if self == target {
            return c;
        }
        target.project_lon_lat(self.to_lon_lat(c))
    }

    /// Reproject any geometry from `self` into `target`.
    #[must_use]
    pub fn transform<G>(self, target: Self, geometry: &G) -> G
    where
        G: MapCoords<f64, f64, Output = G>,
    {
        geometry.map_coords(move |c| self.transform_coord(target, c))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

fn eccentricity_squared() -> f64 {
    WGS84_F * (2.0 - WGS84_F)
}

fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

// Transverse Mercator series (Snyder, USGS PP 1395, eqs. 8-9 to 8-10).
fn utm_forward(c: Coord<f64>, central_meridian: f64) -> Coord<f64> {
    let e2 = eccentricity_squared();
    let ep2 = e2 / (1.0 - e2);
    let phi = c.y.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let cc = ep2 * cos_phi * cos_phi;
    let a = (c.x - central_meridian).to_radians() * cos_phi;
    let m = meridian_arc(phi, e2);

    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let x = UTM_K0
        * n
        * (a + (1.0 - t + cc) * a3 / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * cc - 58.0 * ep2) * a5 / 120.0)
        + UTM_FALSE_EASTING;
    let y = UTM_K0
        * (m + n
            * tan_phi
            * (a2 / 2.0
                + (5.0 - t + 9.0 * cc + 4.0 * cc * cc) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * cc - 330.0 * ep2) * a6 / 720.0));
    Coord { x, y }
}

fn utm_inverse(c: Coord<f64>, central_meridian: f64) -> Coord<f64> {
    let e2 = eccentricity_squared();
    let ep2 = e2 / (1.0 - e2);
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let m = c.y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let sqrt_1_e2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let tan_phi1 = phi1.tan();
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
    let n1 = WGS84_A / denom.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / denom.powf(1.5);
    let d = (c.x - UTM_FALSE_EASTING) / (n1 * UTM_K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let phi = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0 - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);
    let lambda = (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
            / 120.0)
        / cos_phi1;

    Coord {
        x: central_meridian + lambda.to_degrees(),
        y: phi.to_degrees(),
    }
}
