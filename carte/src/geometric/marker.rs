use anyhow::{Context, Result};
use geo::Point;
use image::RgbaImage;
use std::path::Path;

use crate::commons::config::MarkerConfig;
use crate::commons::error::CarteError;
use crate::geo_core::BoundingBox;

/// Pin shipped with the crate, used when no asset path is configured
pub const DEFAULT_MARKER_PNG: &[u8] = include_bytes!("../../assets/logo_loc.png");

/// Ground size and anchoring of the pin.
///
/// The pixel size comes from the asset; the height on the ground follows the
/// asset's aspect ratio so the pin is never stretched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSpec {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub real_world_width_m: f64,
    pub anchor_offset_ratio_x: f64,
    pub anchor_offset_ratio_y: f64,
}

impl MarkerSpec {
    pub fn new(
        pixel_width: u32,
        pixel_height: u32,
        real_world_width_m: f64,
        anchor_offset_ratio_x: f64,
        anchor_offset_ratio_y: f64,
    ) -> Result<Self> {
        if pixel_width == 0 || pixel_height == 0 {
            return Err(CarteError::InvalidMarker(format!(
                "asset is {pixel_width}x{pixel_height} pixels"
            ))
            .into());
        }
        if !(real_world_width_m.is_finite() && real_world_width_m > 0.0) {
            return Err(CarteError::InvalidMarker(format!(
                "width on the ground must be positive, got {real_world_width_m} m"
            ))
            .into());
        }
        for ratio in [anchor_offset_ratio_x, anchor_offset_ratio_y] {
            if !ratio.is_finite() || ratio == 0.0 {
                return Err(CarteError::InvalidMarker(format!(
                    "anchor offset ratio must be finite and non-zero, got {ratio}"
                ))
                .into());
            }
        }
        Ok(MarkerSpec {
            pixel_width,
            pixel_height,
            real_world_width_m,
            anchor_offset_ratio_x,
            anchor_offset_ratio_y,
        })
    }

    pub fn real_world_height_m(&self) -> f64 {
        self.real_world_width_m * (f64::from(self.pixel_height) / f64::from(self.pixel_width))
    }

    pub fn offset_x(&self) -> f64 {
        -self.real_world_width_m / self.anchor_offset_ratio_x
    }

    pub fn offset_y(&self) -> f64 {
        -self.real_world_height_m() / self.anchor_offset_ratio_y
    }

    /// Ground rectangle covered by the pin marking `city` (projected meters)
    pub fn extent(&self, city: Point<f64>) -> BoundingBox {
        let left = city.x() + self.offset_x();
        let bottom = city.y() + self.offset_y();
        BoundingBox::new(
            left,
            bottom,
            left + self.real_world_width_m,
            bottom + self.real_world_height_m(),
        )
    }
}

/// Pin raster plus its placement rules
#[derive(Debug, Clone)]
pub struct Marker {
    image: RgbaImage,
    spec: MarkerSpec,
}

impl Marker {
    /// Load the asset named in the configuration, or the bundled pin
    pub fn load(config: &MarkerConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::load_from(
                path,
                config.width_m,
                config.anchor_offset_ratio_x,
                config.anchor_offset_ratio_y,
            ),
            None => Self::from_png_bytes(
                DEFAULT_MARKER_PNG,
                config.width_m,
                config.anchor_offset_ratio_x,
                config.anchor_offset_ratio_y,
            ),
        }
    }

    pub fn from_png_bytes(
        bytes: &[u8],
        width_m: f64,
        anchor_offset_ratio_x: f64,
        anchor_offset_ratio_y: f64,
    ) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .context("Failed to decode marker image")?
            .to_rgba8();
        Self::from_image(image, width_m, anchor_offset_ratio_x, anchor_offset_ratio_y)
    }

    pub fn load_from(
        path: &Path,
        width_m: f64,
        anchor_offset_ratio_x: f64,
        anchor_offset_ratio_y: f64,
    ) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to open marker asset: {:?}", path))?
            .to_rgba8();
        log::debug!(
            "Loaded marker {:?} ({}x{} px)",
            path,
            image.width(),
            image.height()
        );
        Self::from_image(image, width_m, anchor_offset_ratio_x, anchor_offset_ratio_y)
    }

    pub fn from_image(
        image: RgbaImage,
        width_m: f64,
        anchor_offset_ratio_x: f64,
        anchor_offset_ratio_y: f64,
    ) -> Result<Self> {
        let spec = MarkerSpec::new(
            image.width(),
            image.height(),
            width_m,
            anchor_offset_ratio_x,
            anchor_offset_ratio_y,
        )?;
        Ok(Marker { image, spec })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn spec(&self) -> &MarkerSpec {
        &self.spec
    }
}
