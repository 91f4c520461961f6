use anyhow::{Context, Result};
use carte::collect::global_variables::{get_output_path, FRANCE_CENTER};
use carte::{CityResolver, MapConfig, MapPipeline, PlaceCandidate};

/// Example: satellite map of France with the pin on a city
/// Usage: cargo run --example lyon_map -- [city]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("=== Example: map for a French city ===\n");

    let config = MapConfig::default();

    let candidate = match std::env::args().nth(1) {
        Some(query) => {
            let resolver = CityResolver::from_config(&config, config.http_client()?)?;
            let outcome = resolver.search(&query);
            for candidate in outcome.candidates() {
                println!(
                    "  - {} ({}, {})",
                    candidate.label, candidate.latitude, candidate.longitude
                );
            }
            outcome
                .candidates()
                .first()
                .cloned()
                .with_context(|| format!("No city found for {:?}", query))?
        }
        // No query: pin the centre of France
        None => PlaceCandidate {
            label: "Centre de la France".to_string(),
            latitude: FRANCE_CENTER.0,
            longitude: FRANCE_CENTER.1,
            raw_name: "France".to_string(),
            display_name: "France".to_string(),
        },
    };

    println!("\nSelected: {}", candidate.label);
    println!("Downloading basemap tiles and composing the map...");
    let pipeline = MapPipeline::new(config)?;
    let map = pipeline.render(&candidate)?;
    let path = map.save(&get_output_path())?;

    println!("\nMap generated successfully!");
    println!("  - File: {:?}", path);
    println!("  - Size: {}x{} px", map.image.width(), map.image.height());
    Ok(())
}
