use anyhow::{Context, Result};
use image::RgbaImage;
use reqwest::blocking::Client;

use crate::commons::error::CarteError;
use crate::geo_core::{BoundingBox, ORIGIN_SHIFT};

/// Edge length of a standard XYZ tile, pixels
pub const TILE_SIZE: u32 = 256;

/// XYZ tile address (y grows southwards)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        TileCoord { x, y, z }
    }

    pub fn is_valid(&self) -> bool {
        let n = tiles_per_side(self.z);
        self.z <= MAX_ZOOM && self.x < n && self.y < n
    }

    /// Web Mercator extent of the tile, meters
    pub fn bounds(&self) -> BoundingBox {
        let size = tile_span_m(self.z);
        let min_x = -ORIGIN_SHIFT + f64::from(self.x) * size;
        let max_y = ORIGIN_SHIFT - f64::from(self.y) * size;
        BoundingBox::new(min_x, max_y - size, min_x + size, max_y)
    }
}

/// Deepest zoom any provider serves; keeps 2^z inside u32
pub const MAX_ZOOM: u8 = 24;

pub fn tiles_per_side(z: u8) -> u32 {
    1u32 << u32::from(z.min(MAX_ZOOM))
}

/// Ground width of one tile at zoom `z`, meters
pub fn tile_span_m(z: u8) -> f64 {
    2.0 * ORIGIN_SHIFT / f64::from(tiles_per_side(z))
}

/// Fraction of a tile treated as rounding noise at extent edges
const EDGE_EPSILON: f64 = 1e-9;

/// Inclusive block of tiles covering a projected box at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub z: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRange {
    /// Tiles intersecting `bbox` (Web Mercator meters) at zoom `z`
    pub fn covering(bbox: &BoundingBox, z: u8) -> Result<Self> {
        if z > MAX_ZOOM {
            anyhow::bail!("Zoom level {} exceeds the maximum of {}", z, MAX_ZOOM);
        }
        if !(bbox.width() > 0.0 && bbox.height() > 0.0) {
            anyhow::bail!("Cannot cover an empty extent: {:?}", bbox);
        }
        let n = tiles_per_side(z);
        let span = tile_span_m(z);
        let last = f64::from(n - 1);
        // Tile-space positions; an edge lying on a tile boundary (up to rounding)
        // does not pull in the neighbouring tile
        let first = |t: f64| (t + EDGE_EPSILON).floor().clamp(0.0, last) as u32;
        let last_covered = |t: f64| ((t - EDGE_EPSILON).ceil() - 1.0).clamp(0.0, last) as u32;

        Ok(TileRange {
            z,
            x_min: first((bbox.min_x + ORIGIN_SHIFT) / span),
            x_max: last_covered((bbox.max_x + ORIGIN_SHIFT) / span),
            y_min: first((ORIGIN_SHIFT - bbox.max_y) / span),
            y_max: last_covered((ORIGIN_SHIFT - bbox.min_y) / span),
        })
    }

    pub fn columns(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn rows(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    pub fn len(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major, north-west first
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.y_min..=self.y_max)
            .flat_map(move |y| (self.x_min..=self.x_max).map(move |x| TileCoord::new(x, y, self.z)))
    }

    /// Web Mercator extent of the whole block, meters
    pub fn bounds(&self) -> BoundingBox {
        let nw = TileCoord::new(self.x_min, self.y_min, self.z).bounds();
        let se = TileCoord::new(self.x_max, self.y_max, self.z).bounds();
        BoundingBox::new(nw.min_x, se.min_y, se.max_x, nw.max_y)
    }
}

/// Anything that can hand out basemap tiles
pub trait TileSource {
    /// Short provider name for logs
    fn name(&self) -> &str;

    fn fetch_tile(&self, coord: TileCoord) -> Result<RgbaImage>;
}

/// Tile server addressed by a `{z}/{x}/{y}` URL template
pub struct XyzTileSource {
    name: String,
    url_template: String,
    client: Client,
}

impl XyzTileSource {
    pub fn new(name: &str, url_template: &str, client: Client) -> Self {
        XyzTileSource {
            name: name.to_string(),
            url_template: url_template.to_string(),
            client,
        }
    }

    pub fn url(&self, coord: TileCoord) -> String {
        self.url_template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

impl TileSource for XyzTileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_tile(&self, coord: TileCoord) -> Result<RgbaImage> {
        if !coord.is_valid() {
            return Err(CarteError::TileOutOfRange {
                x: coord.x,
                y: coord.y,
                z: coord.z,
            }
            .into());
        }
        let url = self.url(coord);
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to request tile {:?} from {}", coord, self.name))?;

        if !response.status().is_success() {
            return Err(anyhow::Error::new(CarteError::HttpStatus {
                service: "tile server",
                status: response.status().as_u16(),
            })
            .context(format!("Tile {:?} unavailable at {}", coord, url)));
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to read tile {:?}", coord))?;
        let tile = image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode tile {:?}", coord))?
            .to_rgba8();
        Ok(tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commons::test_server::{test_client, TestServer};
    use crate::geo_core::GeoCore;
    use image::{ImageOutputFormat, Rgba};
    use std::io::Cursor;

    fn france_3857() -> BoundingBox {
        GeoCore::default()
            .project_bbox(&BoundingBox::from_limits(-9.0, 14.0, 37.0, 55.5))
            .unwrap()
    }

    #[test]
    fn test_tile_bounds() {
        let world = TileCoord::new(0, 0, 0).bounds();
        assert!((world.min_x + ORIGIN_SHIFT).abs() < 1e-6);
        assert!((world.max_y - ORIGIN_SHIFT).abs() < 1e-6);

        let ne = TileCoord::new(1, 0, 1).bounds();
        assert!(ne.min_x.abs() < 1e-6);
        assert!(ne.min_y.abs() < 1e-6);
    }

    #[test]
    fn test_tile_validity() {
        assert!(TileCoord::new(63, 63, 6).is_valid());
        assert!(!TileCoord::new(64, 0, 6).is_valid());
    }

    #[test]
    fn test_france_needs_25_tiles_at_zoom_6() {
        let range = TileRange::covering(&france_3857(), 6).unwrap();
        assert_eq!((range.x_min, range.x_max), (30, 34));
        assert_eq!((range.y_min, range.y_max), (20, 24));
        assert_eq!(range.len(), 25);
        assert_eq!(range.coords().next(), Some(TileCoord::new(30, 20, 6)));
        assert_eq!(range.coords().last(), Some(TileCoord::new(34, 24, 6)));

        let bounds = range.bounds();
        let france = france_3857();
        assert!(bounds.min_x <= france.min_x && bounds.max_x >= france.max_x);
        assert!(bounds.min_y <= france.min_y && bounds.max_y >= france.max_y);
    }

    #[test]
    fn test_edge_on_tile_boundary() {
        // exactly the north-east quarter of the world at zoom 1
        let bbox = TileCoord::new(1, 0, 1).bounds();
        let range = TileRange::covering(&bbox, 1).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.coords().next(), Some(TileCoord::new(1, 0, 1)));
    }

    #[test]
    fn test_empty_extent_rejected() {
        let bbox = BoundingBox::new(10.0, 10.0, 10.0, 20.0);
        assert!(TileRange::covering(&bbox, 3).is_err());
    }

    #[test]
    fn test_url_template() {
        let source = XyzTileSource::new(
            "esri",
            "https://example.test/tile/{z}/{y}/{x}",
            Client::new(),
        );
        assert_eq!(
            source.url(TileCoord::new(31, 22, 6)),
            "https://example.test/tile/6/22/31"
        );
    }

    #[test]
    fn test_fetch_decodes_png_tile() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, Rgba([10, 120, 40, 255]))
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();
        let server = TestServer::respond(200, "image/png", png);

        let template = format!("{}/{{z}}/{{y}}/{{x}}", server.base_url());
        let source = XyzTileSource::new("local", &template, test_client());
        let tile = source.fetch_tile(TileCoord::new(1, 1, 2)).unwrap();
        assert_eq!(tile.dimensions(), (TILE_SIZE, TILE_SIZE));
        assert_eq!(tile.get_pixel(5, 5), &Rgba([10, 120, 40, 255]));
        assert_eq!(server.requested_path(), "/2/1/1");
    }

    #[test]
    fn test_fetch_http_error_is_fatal() {
        let server = TestServer::respond(503, "text/plain", b"busy".to_vec());
        let template = format!("{}/{{z}}/{{y}}/{{x}}", server.base_url());
        let source = XyzTileSource::new("local", &template, test_client());
        let err = source.fetch_tile(TileCoord::new(0, 0, 1)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CarteError>(),
            Some(&CarteError::HttpStatus {
                service: "tile server",
                status: 503
            })
        );
    }

    #[test]
    fn test_out_of_range_tile_not_requested() {
        let source = XyzTileSource::new("none", "http://127.0.0.1:9/{z}/{x}/{y}", test_client());
        let err = source.fetch_tile(TileCoord::new(4, 0, 2)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CarteError>(),
            Some(CarteError::TileOutOfRange { .. })
        ));
    }
}
