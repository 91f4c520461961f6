use anyhow::{Context, Result};
use image::{imageops, imageops::FilterType, RgbaImage};

use crate::collect::tiles::tile_source::{TileRange, TileSource, TILE_SIZE};
use crate::geo_core::BoundingBox;

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Stitched block of tiles with its ground extent
pub struct Mosaic {
    pub image: RgbaImage,
    /// Web Mercator extent of `image`, meters
    pub bounds: BoundingBox,
}

impl Mosaic {
    /// Download every tile of `range` and paste it in place.
    ///
    /// The first failing tile aborts the whole mosaic.
    pub fn fetch(source: &dyn TileSource, range: &TileRange) -> Result<Self> {
        let mut image = RgbaImage::new(range.columns() * TILE_SIZE, range.rows() * TILE_SIZE);
        log::info!(
            "Fetching {} tiles at zoom {} from {}",
            range.len(),
            range.z,
            source.name()
        );

        #[cfg(feature = "indicatif")]
        let pb = {
            let pb = ProgressBar::new(range.len() as u64);
            pb.set_style(progress_style());
            pb.set_message("Tiles");
            pb
        };

        for coord in range.coords() {
            let mut tile = source
                .fetch_tile(coord)
                .with_context(|| format!("Failed to fetch basemap tile {:?}", coord))?;
            if tile.dimensions() != (TILE_SIZE, TILE_SIZE) {
                tile = imageops::resize(&tile, TILE_SIZE, TILE_SIZE, FilterType::Triangle);
            }
            let left = (coord.x - range.x_min) * TILE_SIZE;
            let top = (coord.y - range.y_min) * TILE_SIZE;
            imageops::replace(&mut image, &tile, i64::from(left), i64::from(top));

            #[cfg(feature = "indicatif")]
            pb.inc(1);
        }

        #[cfg(feature = "indicatif")]
        pb.finish_and_clear();

        Ok(Mosaic {
            image,
            bounds: range.bounds(),
        })
    }

    /// Mosaic pixels per meter (identical on both axes in Web Mercator)
    pub fn pixels_per_meter(&self) -> f64 {
        f64::from(self.image.width()) / self.bounds.width()
    }

    /// Cut `bbox` out of the mosaic and resample it to `width` x `height`
    pub fn clip(&self, bbox: &BoundingBox, width: u32, height: u32) -> Result<RgbaImage> {
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot render a {}x{} basemap", width, height);
        }
        let ppm = self.pixels_per_meter();
        let left = ((bbox.min_x - self.bounds.min_x) * ppm).round().max(0.0);
        let top = ((self.bounds.max_y - bbox.max_y) * ppm).round().max(0.0);
        let right = ((bbox.max_x - self.bounds.min_x) * ppm)
            .round()
            .min(f64::from(self.image.width()));
        let bottom = ((self.bounds.max_y - bbox.min_y) * ppm)
            .round()
            .min(f64::from(self.image.height()));
        if right <= left || bottom <= top {
            anyhow::bail!("Extent {:?} lies outside the fetched tiles", bbox);
        }

        let view = imageops::crop_imm(
            &self.image,
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
        .to_image();
        log::debug!(
            "Resampling {}x{} mosaic window to {}x{}",
            view.width(),
            view.height(),
            width,
            height
        );
        Ok(imageops::resize(&view, width, height, FilterType::Triangle))
    }
}

/// Basemap raster exactly covering `bbox` (Web Mercator) at `zoom`
pub fn render_basemap(
    source: &dyn TileSource,
    bbox: &BoundingBox,
    zoom: u8,
    width: u32,
    height: u32,
) -> Result<RgbaImage> {
    let range = TileRange::covering(bbox, zoom)?;
    let mosaic = Mosaic::fetch(source, &range)?;
    mosaic.clip(bbox, width, height)
}
