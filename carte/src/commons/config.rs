use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collect::global_variables::{
    EPISODE_FEED_URL, ESRI_WORLD_IMAGERY_URL, NOMINATIM_SEARCH_URL, USER_AGENT,
};
use crate::geo_core::BoundingBox;
use crate::geometric::frame::CropWindow;

/// Fixed geographic extent of the national map, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl GeoBoundingBox {
    /// Metropolitan France with some sea around it
    pub const FRANCE: GeoBoundingBox = GeoBoundingBox {
        west: -9.0,
        east: 14.0,
        south: 37.0,
        north: 55.5,
    };

    pub fn to_bbox(&self) -> BoundingBox {
        BoundingBox::from_limits(self.west, self.east, self.south, self.north)
    }
}

impl Default for GeoBoundingBox {
    fn default() -> Self {
        GeoBoundingBox::FRANCE
    }
}

/// Size and anchoring of the location pin on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// PNG asset of the pin; `None` uses the pin bundled with the binary
    pub path: Option<PathBuf>,
    /// Width of the pin on the ground, meters
    pub width_m: f64,
    /// Horizontal offset is -width_m / ratio (pin tip is not at the left edge)
    pub anchor_offset_ratio_x: f64,
    /// Vertical offset is -height_m / ratio (pin tip sits just above the bottom)
    pub anchor_offset_ratio_y: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig {
            path: None,
            width_m: 420_000.0,
            anchor_offset_ratio_x: 5.6,
            anchor_offset_ratio_y: 30.0,
        }
    }
}

/// Output figure geometry.
///
/// The map is drawn like a plotting figure: `size_in * dpi` pixels, of which
/// the axes box takes `axes_fraction`; the map then fills that box at a 1:1
/// meter aspect and everything outside it is trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureConfig {
    /// (width, height), inches
    pub size_in: (f64, f64),
    /// Pixels per inch
    pub dpi: f64,
    /// (width, height) share of the figure given to the axes box
    pub axes_fraction: (f64, f64),
}

impl Default for FigureConfig {
    fn default() -> Self {
        FigureConfig {
            size_in: (8.0, 6.0),
            dpi: 300.0,
            axes_fraction: (0.775, 0.77),
        }
    }
}

impl FigureConfig {
    /// Size of the axes box in pixels
    pub fn axes_box_px(&self) -> (f64, f64) {
        (
            self.size_in.0 * self.dpi * self.axes_fraction.0,
            self.size_in.1 * self.dpi * self.axes_fraction.1,
        )
    }
}

/// Every fixed constant of the pipeline, separate from per-request input
/// (the query string and the selected candidate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// National extent, degrees
    pub extent: GeoBoundingBox,
    /// XYZ zoom level of the basemap
    pub zoom: u8,
    /// Tile URL with `{z}`, `{x}` and `{y}` placeholders
    pub tile_url: String,
    pub figure: FigureConfig,
    pub marker: MarkerConfig,
    /// Final frame, pixels of the composed image
    pub crop: CropWindow,
    pub geocoder_url: String,
    /// Sent as `User-Agent` to every service
    pub user_agent: String,
    /// ISO 3166-1 alpha-2 codes, comma separated
    pub country_codes: String,
    /// Maximum number of geocoding candidates
    pub result_limit: u32,
    pub feed_url: String,
    /// HTTP timeout in seconds; `None` waits forever
    pub http_timeout_secs: Option<u64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            extent: GeoBoundingBox::FRANCE,
            zoom: 6,
            tile_url: ESRI_WORLD_IMAGERY_URL.to_string(),
            figure: FigureConfig::default(),
            marker: MarkerConfig::default(),
            crop: CropWindow::default(),
            geocoder_url: NOMINATIM_SEARCH_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            country_codes: "fr".to_string(),
            result_limit: 10,
            feed_url: EPISODE_FEED_URL.to_string(),
            http_timeout_secs: None,
        }
    }
}

impl MapConfig {
    /// Load a JSON file; absent keys keep their default value
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: MapConfig = serde_json::from_str(text).context("Failed to parse config JSON")?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    /// Blocking HTTP client shared by every collector of one pipeline
    pub fn http_client(&self) -> Result<reqwest::blocking::Client> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(self.user_agent.clone());
        // reqwest's blocking client defaults to 30s; keep "no timeout" unless asked
        builder = builder.timeout(self.http_timeout());
        builder.build().context("Failed to create HTTP client")
    }
}
