use anyhow::Result;
use geo::Point;
use image::{imageops, imageops::FilterType, RgbaImage};

use crate::collect::tiles::tile_source::TileSource;
use crate::commons::config::FigureConfig;
use crate::geo_core::BoundingBox;
use crate::geometric::basemap::render_basemap;
use crate::geometric::marker::Marker;

/// Pixel geometry of a composed map: a projected extent drawn at 1:1 aspect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasLayout {
    /// Web Mercator extent shown, meters
    pub extent: BoundingBox,
    pub width_px: u32,
    pub height_px: u32,
    pub pixels_per_meter: f64,
}

impl CanvasLayout {
    /// Fit `extent` in the figure's axes box without distorting it.
    ///
    /// The limiting dimension fills the box and the other one shrinks, then
    /// the empty margin is trimmed away (tight bounding box, no padding).
    pub fn fit(extent: BoundingBox, figure: &FigureConfig) -> Result<Self> {
        let (box_w, box_h) = figure.axes_box_px();
        if !(box_w >= 1.0 && box_h >= 1.0) {
            anyhow::bail!("Figure axes box is {}x{} pixels", box_w, box_h);
        }
        if !(extent.width() > 0.0 && extent.height() > 0.0) {
            anyhow::bail!("Cannot draw an empty extent: {:?}", extent);
        }
        let pixels_per_meter = (box_w / extent.width()).min(box_h / extent.height());
        let width_px = (extent.width() * pixels_per_meter).round().max(1.0) as u32;
        let height_px = (extent.height() * pixels_per_meter).round().max(1.0) as u32;
        Ok(CanvasLayout {
            extent,
            width_px,
            height_px,
            pixels_per_meter,
        })
    }

    /// Canvas position of a projected point (origin top-left, y down)
    pub fn to_pixel(&self, point: Point<f64>) -> (f64, f64) {
        (
            (point.x() - self.extent.min_x) * self.pixels_per_meter,
            (self.extent.max_y - point.y()) * self.pixels_per_meter,
        )
    }
}

/// Raster produced by `MapComposer`, not yet cropped
#[derive(Debug, Clone)]
pub struct ComposedImage {
    pub image: RgbaImage,
    pub layout: CanvasLayout,
}

/// Pixel rectangle of the pin on the canvas; may reach past the edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPlacement {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

/// Draws the basemap for an extent and the pin above it
pub struct MapComposer {
    figure: FigureConfig,
    zoom: u8,
}

impl MapComposer {
    pub fn new(figure: FigureConfig, zoom: u8) -> Self {
        MapComposer { figure, zoom }
    }

    pub fn layout(&self, extent: BoundingBox) -> Result<CanvasLayout> {
        CanvasLayout::fit(extent, &self.figure)
    }

    /// Where the pin marking `city` lands on the canvas
    pub fn place_marker(
        layout: &CanvasLayout,
        marker: &Marker,
        city: Point<f64>,
    ) -> Option<MarkerPlacement> {
        let ground = marker.spec().extent(city);
        let (left, top) = layout.to_pixel(Point::new(ground.min_x, ground.max_y));
        let width = (ground.width() * layout.pixels_per_meter).round();
        let height = (ground.height() * layout.pixels_per_meter).round();
        // too small to show a single pixel
        if width < 1.0 || height < 1.0 {
            return None;
        }
        Some(MarkerPlacement {
            left: left.round() as i64,
            top: top.round() as i64,
            width: width as u32,
            height: height as u32,
        })
    }

    /// Basemap clipped to `extent` with the pin blended on top
    pub fn compose(
        &self,
        source: &dyn TileSource,
        extent: BoundingBox,
        marker: &Marker,
        city: Point<f64>,
    ) -> Result<ComposedImage> {
        let layout = self.layout(extent)?;
        log::info!(
            "Composing {}x{} map at zoom {} ({:.1} m/px)",
            layout.width_px,
            layout.height_px,
            self.zoom,
            1.0 / layout.pixels_per_meter
        );
        let mut image = render_basemap(
            source,
            &layout.extent,
            self.zoom,
            layout.width_px,
            layout.height_px,
        )?;
        Self::overlay_marker(&mut image, &layout, marker, city);
        Ok(ComposedImage { image, layout })
    }

    /// Alpha-blend the pin over `image`; parts outside the canvas are dropped
    pub fn overlay_marker(
        image: &mut RgbaImage,
        layout: &CanvasLayout,
        marker: &Marker,
        city: Point<f64>,
    ) {
        let Some(placement) = Self::place_marker(layout, marker, city) else {
            log::warn!("Marker too small to draw at this scale");
            return;
        };
        log::debug!("Marker placed at {:?}", placement);
        let pin = imageops::resize(
            marker.image(),
            placement.width,
            placement.height,
            FilterType::Triangle,
        );
        imageops::overlay(image, &pin, placement.left, placement.top);
    }
}
