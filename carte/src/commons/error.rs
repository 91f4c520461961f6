use thiserror::Error;

/// Conditions callers may want to tell apart.
///
/// Everything else travels as a plain `anyhow::Error` with context; these are
/// wrapped into `anyhow::Error` too and recovered with `downcast_ref`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CarteError {
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("unsupported transformation EPSG:{from} -> EPSG:{to}")]
    UnsupportedCrs { from: i32, to: i32 },

    #[error(
        "crop exceeds image bounds: window {width}x{height} at ({x}, {y}) \
         does not fit in a {image_width}x{image_height} image"
    )]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("invalid marker: {0}")]
    InvalidMarker(String),

    #[error("tile {x}/{y} is outside zoom level {z}")]
    TileOutOfRange { x: u32, y: u32, z: u8 },

    #[error("{service} returned HTTP {status}")]
    HttpStatus { service: &'static str, status: u16 },
}
