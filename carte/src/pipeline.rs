use anyhow::{Context, Result};
use geo::Point;
use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::collect::nominatim::city_resolver::PlaceCandidate;
use crate::collect::tiles::tile_source::{TileSource, XyzTileSource};
use crate::commons::basic_functions::{download_file_name, encode_png, save_bytes};
use crate::commons::config::MapConfig;
use crate::geo_core::{BoundingBox, GeoCore};
use crate::geometric::canvas::MapComposer;
use crate::geometric::frame::FrameCropper;
use crate::geometric::marker::Marker;

/// Final, cropped map for one selected place
#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub image: RgbaImage,
    /// `carte_<name>.png`
    pub file_name: String,
    /// Label of the candidate the map was drawn for
    pub label: String,
    /// Projected position of the pin tip, meters
    pub city: Point<f64>,
}

impl RenderedMap {
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// Write the PNG under its download name inside `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let bytes = self.to_png_bytes()?;
        save_bytes(dir, &self.file_name, &bytes)
    }
}

/// Projection, composition and cropping for a selected place.
///
/// Holds only immutable state (configuration, pin asset, tile source), so one
/// pipeline serves any number of sequential requests.
pub struct MapPipeline {
    config: MapConfig,
    geo_core: GeoCore,
    composer: MapComposer,
    cropper: FrameCropper,
    marker: Marker,
    tile_source: Box<dyn TileSource>,
}

impl MapPipeline {
    /// Load the pin asset and connect to the configured tile server
    pub fn new(config: MapConfig) -> Result<Self> {
        let marker = Marker::load(&config.marker)?;
        let client = config.http_client()?;
        let tile_source = XyzTileSource::new("basemap", &config.tile_url, client);
        Ok(Self::with_parts(config, marker, Box::new(tile_source)))
    }

    pub fn with_parts(config: MapConfig, marker: Marker, tile_source: Box<dyn TileSource>) -> Self {
        MapPipeline {
            geo_core: GeoCore::default(),
            composer: MapComposer::new(config.figure, config.zoom),
            cropper: FrameCropper::new(config.crop),
            marker,
            tile_source,
            config,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// National extent in Web Mercator meters
    pub fn projected_extent(&self) -> Result<BoundingBox> {
        self.geo_core
            .project_bbox(&self.config.extent.to_bbox())
            .context("Failed to project the national extent")
    }

    pub fn render(&self, candidate: &PlaceCandidate) -> Result<RenderedMap> {
        log::info!(
            "Rendering map for {} ({}, {})",
            candidate.label,
            candidate.latitude,
            candidate.longitude
        );
        let extent = self.projected_extent()?;
        let city = self
            .geo_core
            .project(candidate.longitude, candidate.latitude)
            .with_context(|| format!("Failed to project {}", candidate.label))?;
        if !extent.contains(city) {
            log::warn!("{} lies outside the map extent", candidate.label);
        }

        let composed = self
            .composer
            .compose(self.tile_source.as_ref(), extent, &self.marker, city)
            .context("Failed to compose the map")?;
        let image = self
            .cropper
            .crop(&composed.image)
            .context("Failed to crop the map")?;

        Ok(RenderedMap {
            image,
            file_name: download_file_name(&candidate.raw_name),
            label: candidate.label.clone(),
            city,
        })
    }
}
