use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use carte::collect::global_variables::get_output_path;
use carte::collect::nominatim::city_resolver::select_by_label;
use carte::{
    CityResolver, EpisodeFeedReader, FeedOutcome, MapConfig, MapPipeline, PlaceCandidate,
    SearchOutcome,
};

const NO_CITY: &str = "Aucune ville trouvée.";
const NO_EPISODE: &str = "Aucun épisode trouvé.";

/// Génération automatique de carte - Doudou podcast R&I
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Name of the city to look for
    query: String,
    /// Label of the candidate to map, as listed
    #[arg(short, long, conflicts_with = "index")]
    select: Option<String>,
    /// Position of the candidate to map in the list (default: first)
    #[arg(short, long)]
    index: Option<usize>,
    /// Only list the candidates
    #[arg(long)]
    list: bool,
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory receiving carte_<name>.png
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Pin image (PNG)
    #[arg(long)]
    marker: Option<PathBuf>,
    /// Basemap zoom level
    #[arg(long)]
    zoom: Option<u8>,
    #[arg(long)]
    crop_x: Option<u32>,
    #[arg(long)]
    crop_y: Option<u32>,
    #[arg(long)]
    crop_width: Option<u32>,
    #[arg(long)]
    crop_height: Option<u32>,
    /// Skip the podcast episode list
    #[arg(long)]
    no_episodes: bool,
}

impl Cli {
    fn load_config(&self) -> Result<MapConfig> {
        let mut config = match &self.config {
            Some(path) => MapConfig::from_json_file(path)?,
            None => MapConfig::default(),
        };
        if let Some(marker) = &self.marker {
            config.marker.path = Some(marker.clone());
        }
        if let Some(zoom) = self.zoom {
            config.zoom = zoom;
        }
        let crop = &mut config.crop;
        crop.x = self.crop_x.unwrap_or(crop.x);
        crop.y = self.crop_y.unwrap_or(crop.y);
        crop.width = self.crop_width.unwrap_or(crop.width);
        crop.height = self.crop_height.unwrap_or(crop.height);
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Erreur : {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let client = config.http_client()?;

    let resolver = CityResolver::from_config(&config, client.clone())?;
    let outcome = resolver.search(&cli.query);
    if let Some(status) = no_city_status(&outcome) {
        match &outcome {
            SearchOutcome::Failed(reason) => {
                println!("{} (recherche impossible : {})", NO_CITY, reason)
            }
            _ => println!("{}", NO_CITY),
        }
        return Ok(ExitCode::from(status));
    }
    let candidates = outcome.candidates();

    println!("Sélectionnez la ville :");
    for (i, candidate) in candidates.iter().enumerate() {
        println!("  [{}] {}", i, candidate.label);
    }
    if cli.list {
        return Ok(ExitCode::SUCCESS);
    }

    let chosen = choose_candidate(candidates, cli.select.as_deref(), cli.index)?;
    println!(
        "Ville sélectionnée : {} ({}, {})",
        chosen.label, chosen.latitude, chosen.longitude
    );

    let pipeline = MapPipeline::new(config.clone())?;
    let map = pipeline
        .render(chosen)
        .context("La génération de la carte a échoué")?;
    let output = cli.output.clone().unwrap_or_else(get_output_path);
    let path = map.save(&output)?;
    println!("Carte enregistrée : {}", path.display());

    if !cli.no_episodes {
        let reader = EpisodeFeedReader::from_config(&config, client);
        println!();
        println!("Épisodes du podcast Doudou R&I");
        for line in episode_lines(&reader.fetch()) {
            println!("{}", line);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Exit status when the search gave nothing to map: 0 for no match, 1 when
/// the geocoder could not be used. `None` when there are candidates.
fn no_city_status(outcome: &SearchOutcome) -> Option<u8> {
    match outcome {
        SearchOutcome::Found(candidates) if !candidates.is_empty() => None,
        SearchOutcome::Found(_) | SearchOutcome::NotFound => Some(0),
        SearchOutcome::Failed(_) => Some(1),
    }
}

/// Candidate picked by label (first exact match) or by position (default 0)
fn choose_candidate<'a>(
    candidates: &'a [PlaceCandidate],
    label: Option<&str>,
    index: Option<usize>,
) -> Result<&'a PlaceCandidate> {
    match label {
        Some(label) => select_by_label(candidates, label)
            .with_context(|| format!("No candidate labelled {:?}", label)),
        None => {
            let index = index.unwrap_or(0);
            candidates.get(index).with_context(|| {
                format!(
                    "No candidate at position {} ({} listed)",
                    index,
                    candidates.len()
                )
            })
        }
    }
}

/// Lines printed under the episode heading
fn episode_lines(outcome: &FeedOutcome) -> Vec<String> {
    match outcome {
        FeedOutcome::Episodes(episodes) if !episodes.is_empty() => episodes
            .iter()
            .map(|episode| format!("- {}", episode.title))
            .collect(),
        _ => vec![NO_EPISODE.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carte::Episode;

    fn candidate(label: &str, raw_name: &str) -> PlaceCandidate {
        PlaceCandidate {
            label: label.to_string(),
            latitude: 45.75,
            longitude: 4.85,
            raw_name: raw_name.to_string(),
            display_name: raw_name.to_string(),
        }
    }

    fn candidates() -> Vec<PlaceCandidate> {
        vec![
            candidate("Lyon (Métropole de Lyon)", "Lyon"),
            candidate("Lyon (Métropole de Lyon)", "Lyon 1er Arrondissement"),
            candidate("Lyons-la-Forêt (Eure)", "Lyons-la-Forêt"),
        ]
    }

    #[test]
    fn test_no_city_status() {
        assert_eq!(no_city_status(&SearchOutcome::NotFound), Some(0));
        assert_eq!(
            no_city_status(&SearchOutcome::Failed("HTTP 403".to_string())),
            Some(1)
        );
        assert_eq!(no_city_status(&SearchOutcome::Found(Vec::new())), Some(0));
        assert_eq!(no_city_status(&SearchOutcome::Found(candidates())), None);
    }

    #[test]
    fn test_default_choice_is_first() {
        let list = candidates();
        let chosen = choose_candidate(&list, None, None).unwrap();
        assert_eq!(chosen.raw_name, "Lyon");
    }

    #[test]
    fn test_choose_by_label_first_duplicate_wins() {
        let list = candidates();
        let chosen = choose_candidate(&list, Some("Lyon (Métropole de Lyon)"), None).unwrap();
        assert_eq!(chosen.raw_name, "Lyon");
        let chosen = choose_candidate(&list, Some("Lyons-la-Forêt (Eure)"), None).unwrap();
        assert_eq!(chosen.raw_name, "Lyons-la-Forêt");
    }

    #[test]
    fn test_choose_unknown_label_fails() {
        let list = candidates();
        let err = choose_candidate(&list, Some("Lyon (Rhône)"), None).unwrap_err();
        assert!(err.to_string().contains("Lyon (Rhône)"));
    }

    #[test]
    fn test_choose_index() {
        let list = candidates();
        let chosen = choose_candidate(&list, None, Some(1)).unwrap();
        assert_eq!(chosen.raw_name, "Lyon 1er Arrondissement");
        let err = choose_candidate(&list, None, Some(3)).unwrap_err();
        assert!(err.to_string().contains("position 3"));
    }

    #[test]
    fn test_episode_lines() {
        let outcome = FeedOutcome::Episodes(vec![Episode {
            title: "Épisode 1".to_string(),
            description: "Lyon".to_string(),
        }]);
        assert_eq!(episode_lines(&outcome), vec!["- Épisode 1".to_string()]);
    }

    #[test]
    fn test_empty_and_unavailable_feed_print_the_same() {
        let empty = episode_lines(&FeedOutcome::Episodes(Vec::new()));
        let unavailable = episode_lines(&FeedOutcome::Unavailable("HTTP 500".to_string()));
        assert_eq!(empty, vec![NO_EPISODE.to_string()]);
        assert_eq!(unavailable, empty);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["carte", "Lyon", "--index", "2", "--crop-x", "0"]).unwrap();
        assert_eq!(cli.index, Some(2));
        let config = cli.load_config().unwrap();
        assert_eq!(config.crop.x, 0);
        assert_eq!(config.crop.y, 150);
        assert_eq!(config.marker.path, None);

        assert!(Cli::try_parse_from(["carte", "Lyon", "--select", "x", "--index", "1"]).is_err());
    }
}
