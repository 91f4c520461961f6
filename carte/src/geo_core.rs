use anyhow::{Context, Result};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

use crate::commons::error::CarteError;

/// WGS84 geographic coordinates, longitude first
pub const EPSG_WGS84: i32 = 4326;
/// Web Mercator, meters
pub const EPSG_WEB_MERCATOR: i32 = 3857;

/// Semi-major axis of WGS84, the sphere radius used by Web Mercator
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the Web Mercator world square, in meters
pub const ORIGIN_SHIFT: f64 = std::f64::consts::PI * EARTH_RADIUS;

/// Projection between geographic and planar coordinates.
///
/// Holds the target EPSG code; every call is independent and stateless, so a
/// single `GeoCore` is reused for the national extent and the city point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCore {
    /// Target CRS of `project`
    pub epsg: i32,
}

impl Default for GeoCore {
    /// Web Mercator, the CRS of every XYZ tile provider
    fn default() -> Self {
        GeoCore::new(EPSG_WEB_MERCATOR)
    }
}

impl GeoCore {
    pub fn new(epsg: i32) -> Self {
        GeoCore { epsg }
    }

    pub fn get_epsg(&self) -> i32 {
        self.epsg
    }

    /// Project a (longitude, latitude) pair in degrees to the target CRS
    pub fn project(&self, lon: f64, lat: f64) -> Result<Point<f64>> {
        let (x, y) = Self::transform_coords(EPSG_WGS84, self.epsg, lon, lat)?;
        Ok(Point::new(x, y))
    }

    /// Inverse of `project`: returns (longitude, latitude) in degrees
    pub fn unproject(&self, point: Point<f64>) -> Result<(f64, f64)> {
        Self::transform_coords(self.epsg, EPSG_WGS84, point.x(), point.y())
    }

    /// Project both corners of a geographic bounding box
    pub fn project_bbox(&self, bbox: &BoundingBox) -> Result<BoundingBox> {
        bbox.transform(EPSG_WGS84, self.epsg)
    }

    /// Transform coordinates from one CRS to another.
    ///
    /// Only WGS84 <-> Web Mercator is supported; identical codes pass through.
    pub fn transform_coords(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
        match (from_epsg, to_epsg) {
            (from, to) if from == to => Ok((x, y)),
            (EPSG_WGS84, EPSG_WEB_MERCATOR) => {
                check_geographic(x, y)?;
                mercator_forward(x, y)
            }
            (EPSG_WEB_MERCATOR, EPSG_WGS84) => {
                check_projected(x, y)?;
                Ok(mercator_inverse(x, y))
            }
            (from, to) => Err(CarteError::UnsupportedCrs { from, to }.into()),
        }
    }

    /// Transform a Point from one CRS to another
    pub fn transform_point(from_epsg: i32, to_epsg: i32, point: Point<f64>) -> Result<Point<f64>> {
        let (x, y) = Self::transform_coords(from_epsg, to_epsg, point.x(), point.y())?;
        Ok(Point::new(x, y))
    }
}

fn check_geographic(lon: f64, lat: f64) -> Result<()> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(CarteError::InvalidCoordinates(format!("({lon}, {lat}) is not finite")).into());
    }
    if lon.abs() > 180.0 {
        return Err(CarteError::InvalidCoordinates(format!("longitude {lon} out of range")).into());
    }
    // Web Mercator sends the poles to infinity
    if lat.abs() >= 90.0 {
        return Err(CarteError::InvalidCoordinates(format!("latitude {lat} out of range")).into());
    }
    Ok(())
}

fn check_projected(x: f64, y: f64) -> Result<()> {
    if !x.is_finite() || !y.is_finite() {
        return Err(CarteError::InvalidCoordinates(format!("({x}, {y}) is not finite")).into());
    }
    Ok(())
}

#[cfg(not(feature = "proj"))]
fn mercator_forward(lon: f64, lat: f64) -> Result<(f64, f64)> {
    Ok(spherical_mercator(lon, lat))
}

#[cfg(feature = "proj")]
fn mercator_forward(lon: f64, lat: f64) -> Result<(f64, f64)> {
    use proj::Proj;

    let proj = Proj::new_known_crs("EPSG:4326", "EPSG:3857", None)
        .context("Failed to create Proj transformation")?;
    proj.convert((lon, lat))
        .context("Failed to transform coordinates")
}

/// Closed-form Web Mercator: x = R.lon, y = R.ln(tan(pi/4 + lat/2))
pub fn spherical_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
    (lon, lat)
}

/// Bounding box structure.
///
/// In EPSG:4326 the fields read west, south, east, north (degrees); once
/// projected they are meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64, // west
    pub min_y: f64, // south
    pub max_x: f64, // east
    pub max_y: f64, // north
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build from the cardinal limits of a geographic extent
    pub fn from_limits(west: f64, east: f64, south: f64, north: f64) -> Self {
        BoundingBox::new(west, south, east, north)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, point: Point<f64>) -> bool {
        point.x() >= self.min_x
            && point.x() <= self.max_x
            && point.y() >= self.min_y
            && point.y() <= self.max_y
    }

    /// Transform bounding box to another CRS
    pub fn transform(&self, from_epsg: i32, to_epsg: i32) -> Result<Self> {
        let (min_x, min_y) = GeoCore::transform_coords(from_epsg, to_epsg, self.min_x, self.min_y)
            .context("Failed to transform lower-left corner")?;
        let (max_x, max_y) = GeoCore::transform_coords(from_epsg, to_epsg, self.max_x, self.max_y)
            .context("Failed to transform upper-right corner")?;

        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }
}
