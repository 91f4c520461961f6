use carte::{EpisodeFeedReader, FeedOutcome, MapConfig};

/// Example: list the Doudou R&I podcast episodes with their descriptions
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = MapConfig::default();
    let reader = EpisodeFeedReader::from_config(&config, config.http_client()?);

    match reader.fetch() {
        FeedOutcome::Episodes(episodes) => {
            println!("{} episode(s)\n", episodes.len());
            for episode in episodes {
                println!("Titre : {}", episode.title);
                println!("Description : {}", episode.description);
                println!("{}", "-".repeat(60));
            }
        }
        FeedOutcome::Unavailable(reason) => println!("Aucun épisode trouvé ({})", reason),
    }
    Ok(())
}
