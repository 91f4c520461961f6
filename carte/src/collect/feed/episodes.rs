use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::Client;

use crate::commons::config::MapConfig;
use crate::commons::error::CarteError;

pub const TITLE_NOT_FOUND: &str = "Titre non trouvé";
pub const DESCRIPTION_NOT_FOUND: &str = "Description non trouvée";

/// One `<item>` of the podcast feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub title: String,
    pub description: String,
}

/// Result of reading the feed.
///
/// A reachable feed without items gives `Episodes(vec![])`; anything that
/// prevents reading it gives `Unavailable`. Neither is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Episodes(Vec<Episode>),
    Unavailable(String),
}

impl FeedOutcome {
    /// Titles in feed order, `None` when the feed could not be read
    pub fn titles(&self) -> Option<Vec<&str>> {
        match self {
            FeedOutcome::Episodes(episodes) => {
                Some(episodes.iter().map(|e| e.title.as_str()).collect())
            }
            FeedOutcome::Unavailable(_) => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Description,
}

/// Text collected for the item being read
#[derive(Default)]
struct ItemText {
    title: Option<String>,
    description: Option<String>,
}

impl ItemText {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn finish(self) -> Episode {
        let pick = |text: Option<String>, missing: &str| match text {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => missing.to_string(),
        };
        Episode {
            title: pick(self.title, TITLE_NOT_FOUND),
            description: pick(self.description, DESCRIPTION_NOT_FOUND),
        }
    }
}

/// Extract every `<item>` of an RSS document, in document order
pub fn parse_episodes(xml: &str) -> Result<Vec<Episode>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut episodes = Vec::new();
    // Some(_) while inside an <item>
    let mut item: Option<ItemText> = None;
    // element depth below the current <item>
    let mut depth = 0usize;
    let mut field: Option<Field> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("Malformed feed at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => match item {
                None if e.name().as_ref() == b"item" => {
                    item = Some(ItemText::default());
                    depth = 0;
                }
                Some(_) => {
                    depth += 1;
                    if depth == 1 {
                        field = match e.name().as_ref() {
                            b"title" => Some(Field::Title),
                            b"description" => Some(Field::Description),
                            _ => None,
                        };
                    }
                }
                None => {}
            },
            // <item/> still counts as an episode, with both sentinels
            Event::Empty(e) if item.is_none() && e.name().as_ref() == b"item" => {
                episodes.push(ItemText::default().finish());
            }
            Event::End(e) => {
                if let Some(current) = item.take() {
                    if depth == 0 && e.name().as_ref() == b"item" {
                        episodes.push(current.finish());
                    } else {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            field = None;
                        }
                        item = Some(current);
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(current), Some(f)) = (item.as_mut(), field) {
                    let text = match t.unescape() {
                        Ok(text) => text.into_owned(),
                        // HTML entities such as &eacute; are not XML; keep them verbatim
                        Err(_) => String::from_utf8_lossy(&t).into_owned(),
                    };
                    current.push(f, &text);
                }
            }
            Event::CData(c) => {
                if let (Some(current), Some(f)) = (item.as_mut(), field) {
                    current.push(f, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if item.is_some() {
        anyhow::bail!("Feed ended inside an <item>");
    }
    Ok(episodes)
}

/// Decode a feed body using the charset of its XML declaration (UTF-8 otherwise)
pub fn decode_feed(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return decoded.into_owned();
    }
    let encoding = declared_encoding(bytes)
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (decoded, _, _) = encoding.decode(bytes);
    decoded.into_owned()
}

/// `encoding="..."` of the `<?xml ...?>` declaration, if any
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let decl = head.strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];
    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(value[..value.find(quote)?].to_string())
}

/// Reads the podcast feed; every failure becomes `FeedOutcome::Unavailable`
pub struct EpisodeFeedReader {
    client: Client,
    url: String,
}

impl EpisodeFeedReader {
    pub fn new(client: Client, url: &str) -> Self {
        EpisodeFeedReader {
            client,
            url: url.to_string(),
        }
    }

    pub fn from_config(config: &MapConfig, client: Client) -> Self {
        Self::new(client, &config.feed_url)
    }

    pub fn fetch(&self) -> FeedOutcome {
        match self.try_fetch() {
            Ok(episodes) => {
                log::info!("{} episode(s) in feed", episodes.len());
                FeedOutcome::Episodes(episodes)
            }
            Err(e) => {
                log::warn!("Failed to read episode feed {}: {:#}", self.url, e);
                FeedOutcome::Unavailable(format!("{:#}", e))
            }
        }
    }

    fn try_fetch(&self) -> Result<Vec<Episode>> {
        log::debug!("GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .context("Failed to send request to episode feed")?;

        if !response.status().is_success() {
            return Err(CarteError::HttpStatus {
                service: "episode feed",
                status: response.status().as_u16(),
            }
            .into());
        }

        let bytes = response
            .bytes()
            .context("Failed to read episode feed body")?;
        let episodes = parse_episodes(&decode_feed(&bytes))?;
        for episode in &episodes {
            log::debug!("Episode {:?}: {}", episode.title, episode.description);
        }
        Ok(episodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commons::test_server::{test_client, TestServer};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Doudou R&amp;I</title>
    <description>Le podcast</description>
    <item>
      <title>Épisode 2 : la Bretagne</title>
      <itunes:title>ignored</itunes:title>
      <description><![CDATA[<p>Crêpes &amp; cidre</p>]]></description>
    </item>
    <item>
      <description>Sans titre</description>
    </item>
    <item>
      <title>   </title>
    </item>
    <item>
      <title>Épisode 1 : Lyon &amp; ses bouchons</title>
      <description>Quenelles</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_items_in_order() {
        let episodes = parse_episodes(FEED).unwrap();
        let titles: Vec<&str> = episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Épisode 2 : la Bretagne",
                TITLE_NOT_FOUND,
                TITLE_NOT_FOUND,
                "Épisode 1 : Lyon & ses bouchons",
            ]
        );
        assert_eq!(episodes[0].description, "<p>Crêpes &amp; cidre</p>");
        assert_eq!(episodes[1].description, "Sans titre");
        assert_eq!(episodes[2].description, DESCRIPTION_NOT_FOUND);
    }

    #[test]
    fn test_self_closing_item_keeps_its_place() {
        let xml = "<rss><channel><item><title>A</title></item><item/>\
                   <item><title>B</title></item></channel></rss>";
        let episodes = parse_episodes(xml).unwrap();
        let titles: Vec<&str> = episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", TITLE_NOT_FOUND, "B"]);
        assert_eq!(episodes[1].description, DESCRIPTION_NOT_FOUND);
    }

    #[test]
    fn test_channel_title_not_an_episode() {
        let episodes = parse_episodes(FEED).unwrap();
        assert!(episodes.iter().all(|e| e.title != "Doudou R&I"));
    }

    #[test]
    fn test_empty_feed_is_empty_list() {
        let xml = r#"<?xml version="1.0"?><rss><channel><title>x</title></channel></rss>"#;
        assert!(parse_episodes(xml).unwrap().is_empty());
    }

    #[test]
    fn test_html_entity_kept_verbatim() {
        let xml = "<rss><channel><item><title>Caf&eacute;</title></item></channel></rss>";
        let episodes = parse_episodes(xml).unwrap();
        assert_eq!(episodes[0].title, "Caf&eacute;");
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        assert!(parse_episodes("<rss><channel><item><title>x</channel></rss>").is_err());
        assert!(parse_episodes("<rss><channel><item><title>x</title>").is_err());
    }

    #[test]
    fn test_decode_latin1_declaration() {
        let mut bytes = br#"<?xml version="1.0" encoding="ISO-8859-1"?><rss><channel><item><title>"#
            .to_vec();
        bytes.extend_from_slice(&[0xC9, b't', b'\xE9']); // "Été" in Latin-1
        bytes.extend_from_slice(b"</title></item></channel></rss>");

        let text = decode_feed(&bytes);
        let episodes = parse_episodes(&text).unwrap();
        assert_eq!(episodes[0].title, "Été");
    }

    #[test]
    fn test_declared_encoding() {
        assert_eq!(
            declared_encoding(br#"<?xml version='1.0' encoding='windows-1252'?><rss/>"#),
            Some("windows-1252".to_string())
        );
        assert_eq!(declared_encoding(br#"<?xml version="1.0"?><rss/>"#), None);
        assert_eq!(declared_encoding(b"<rss/>"), None);
    }

    #[test]
    fn test_fetch_distinguishes_empty_from_unavailable() {
        let empty = TestServer::respond(
            200,
            "application/rss+xml",
            b"<rss><channel></channel></rss>".to_vec(),
        );
        let reader = EpisodeFeedReader::new(test_client(), &empty.base_url());
        assert_eq!(reader.fetch(), FeedOutcome::Episodes(Vec::new()));
        assert_eq!(reader.fetch().titles(), Some(Vec::new()));

        let unreachable = EpisodeFeedReader::new(test_client(), "http://127.0.0.1:9/rss");
        let outcome = unreachable.fetch();
        assert!(matches!(outcome, FeedOutcome::Unavailable(_)));
        assert_eq!(outcome.titles(), None);
    }

    #[test]
    fn test_fetch_http_error_is_unavailable() {
        let server = TestServer::respond(500, "text/plain", b"oops".to_vec());
        let reader = EpisodeFeedReader::new(test_client(), &server.base_url());
        match reader.fetch() {
            FeedOutcome::Unavailable(reason) => assert!(reason.contains("500")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_parses_served_feed() {
        let server = TestServer::respond(200, "application/rss+xml", FEED.as_bytes().to_vec());
        let reader = EpisodeFeedReader::new(test_client(), &server.base_url());
        let outcome = reader.fetch();
        let titles = outcome.titles().unwrap();
        assert_eq!(titles.len(), 4);
        assert_eq!(titles[0], "Épisode 2 : la Bretagne");
    }

    #[test]
    #[ignore = "requires network access to vodio.fr"]
    fn test_live_feed() {
        let config = MapConfig::default();
        let reader = EpisodeFeedReader::from_config(&config, config.http_client().unwrap());
        assert!(matches!(reader.fetch(), FeedOutcome::Episodes(_)));
    }
}
