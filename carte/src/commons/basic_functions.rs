use anyhow::{Context, Result};
use image::{ImageOutputFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// `carte_<name>.png`; path separators in the name are replaced
pub fn download_file_name(place_name: &str) -> String {
    let name: String = place_name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("carte_{}.png", name)
}

/// PNG bytes of `image`, ready to be served as a download
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(bytes)
}

/// Write `bytes` as `file_name` inside `dir`, creating `dir` if needed
pub fn save_bytes(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write file: {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_download_file_name() {
        assert_eq!(download_file_name("Lyon"), "carte_Lyon.png");
        assert_eq!(download_file_name("Saint-Étienne"), "carte_Saint-Étienne.png");
        assert_eq!(download_file_name(" a/b\\c "), "carte_a_b_c.png");
    }

    #[test]
    fn test_encode_png_round_trip_dimensions() {
        let image = RgbaImage::from_pixel(12, 7, Rgba([1, 2, 3, 255]));
        let bytes = encode_png(&image).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 7));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let image = RgbaImage::from_fn(30, 30, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        assert_eq!(encode_png(&image).unwrap(), encode_png(&image).unwrap());
    }

    #[test]
    fn test_save_bytes_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("output");
        let path = save_bytes(&nested, "carte_Lyon.png", b"png").unwrap();
        assert_eq!(path, nested.join("carte_Lyon.png"));
        assert_eq!(std::fs::read(path).unwrap(), b"png");
    }
}
