use anyhow::Result;
use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::commons::error::CarteError;

/// Pixel window applied to every composed map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropWindow {
    fn default() -> Self {
        CropWindow {
            x: 100,
            y: 150,
            width: 1000,
            height: 1000,
        }
    }
}

impl CropWindow {
    /// Whether the window lies entirely inside a `width` x `height` image
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

/// Cuts the final frame out of a composed map.
///
/// A window that does not fit is rejected with `CarteError::CropOutOfBounds`;
/// the image is never clamped or padded.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCropper {
    window: CropWindow,
}

impl FrameCropper {
    pub fn new(window: CropWindow) -> Self {
        FrameCropper { window }
    }

    pub fn window(&self) -> CropWindow {
        self.window
    }

    pub fn crop(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let w = self.window;
        let (image_width, image_height) = image.dimensions();
        if !w.fits(image_width, image_height) {
            return Err(CarteError::CropOutOfBounds {
                x: w.x,
                y: w.y,
                width: w.width,
                height: w.height,
                image_width,
                image_height,
            }
            .into());
        }
        log::debug!(
            "Cropping {}x{} image to {}x{} at ({}, {})",
            image_width,
            image_height,
            w.width,
            w.height,
            w.x,
            w.y
        );
        Ok(imageops::crop_imm(image, w.x, w.y, w.width, w.height).to_image())
    }
}
