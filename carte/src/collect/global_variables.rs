use std::path::PathBuf;

/// Default directory where rendered maps are written
pub const OUTPUT_PATH: &str = "./output";

/// Nominatim free-text search endpoint
pub const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Nominatim's usage policy requires every client to identify itself
pub const USER_AGENT: &str = "carte_doudou_app_v1";

/// Doudou R&I podcast RSS feed
pub const EPISODE_FEED_URL: &str = "https://www.vodio.fr/rssmedias.php?valeur=1671";

/// Esri World Imagery XYZ tiles (note the {y}/{x} order)
pub const ESRI_WORLD_IMAGERY_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

/// Geographic centre of metropolitan France (lat, lon)
pub const FRANCE_CENTER: (f64, f64) = (46.603354, 1.888334);

pub fn get_output_path() -> PathBuf {
    PathBuf::from(OUTPUT_PATH)
}
