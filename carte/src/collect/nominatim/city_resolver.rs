use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use crate::commons::config::MapConfig;
use crate::commons::error::CarteError;

/// One geocoding result the user can pick
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    /// `"<city> (<county>)"`, shown in the selection list
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Place name used in the download file name
    pub raw_name: String,
    pub display_name: String,
}

/// Result of a city search.
///
/// `NotFound` means the service answered with no match; `Failed` means it
/// could not be asked or answered badly. Both end the interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<PlaceCandidate>),
    NotFound,
    Failed(String),
}

impl SearchOutcome {
    pub fn candidates(&self) -> &[PlaceCandidate] {
        match self {
            SearchOutcome::Found(candidates) => candidates,
            _ => &[],
        }
    }
}

/// Nominatim search result (`format=json`)
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(default)]
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

/// `addressdetails=1` block, every field optional
#[derive(Debug, Default, Deserialize)]
pub struct NominatimAddress {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub county: Option<String>,
}

impl NominatimAddress {
    /// City, else town, else village, else empty
    pub fn locality(&self) -> &str {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
            .unwrap_or("")
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.locality(), self.county.as_deref().unwrap_or(""))
    }
}

impl PlaceCandidate {
    fn from_place(place: NominatimPlace) -> Result<Self> {
        let latitude: f64 = place
            .lat
            .trim()
            .parse()
            .with_context(|| format!("Invalid latitude {:?}", place.lat))?;
        let longitude: f64 = place
            .lon
            .trim()
            .parse()
            .with_context(|| format!("Invalid longitude {:?}", place.lon))?;

        let raw_name = match place.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if !place.address.locality().is_empty() => place.address.locality().to_string(),
            _ => place
                .display_name
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        };

        Ok(PlaceCandidate {
            label: place.address.label(),
            latitude,
            longitude,
            raw_name,
            display_name: place.display_name,
        })
    }
}

/// Parse a Nominatim JSON answer; places without usable coordinates are skipped
pub fn parse_search_response(body: &str) -> Result<Vec<PlaceCandidate>> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).context("Failed to parse JSON response from Nominatim")?;
    let mut candidates = Vec::with_capacity(places.len());
    for place in places {
        let display_name = place.display_name.clone();
        match PlaceCandidate::from_place(place) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => log::warn!("Skipping {:?}: {:#}", display_name, e),
        }
    }
    Ok(candidates)
}

/// First candidate whose label is exactly `label`
pub fn select_by_label<'a>(
    candidates: &'a [PlaceCandidate],
    label: &str,
) -> Option<&'a PlaceCandidate> {
    candidates.iter().find(|c| c.label == label)
}

/// Free-text city search restricted to one country
pub struct CityResolver {
    client: Client,
    endpoint: Url,
    country_codes: String,
    limit: u32,
}

impl CityResolver {
    pub fn new(client: Client, endpoint: &str, country_codes: &str, limit: u32) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid geocoder URL: {}", endpoint))?;
        Ok(CityResolver {
            client,
            endpoint,
            country_codes: country_codes.to_string(),
            limit,
        })
    }

    pub fn from_config(config: &MapConfig, client: Client) -> Result<Self> {
        Self::new(
            client,
            &config.geocoder_url,
            &config.country_codes,
            config.result_limit,
        )
    }

    /// Full request URL for `query`
    pub fn search_url(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("addressdetails", "1")
            .append_pair("limit", &self.limit.to_string())
            .append_pair("countrycodes", &self.country_codes);
        url
    }

    pub fn search(&self, query: &str) -> SearchOutcome {
        match self.try_search(query) {
            Ok(candidates) if candidates.is_empty() => {
                log::info!("No place matches {:?}", query);
                SearchOutcome::NotFound
            }
            Ok(candidates) => {
                log::info!("{} candidate(s) for {:?}", candidates.len(), query);
                SearchOutcome::Found(candidates)
            }
            Err(e) => {
                log::warn!("City search for {:?} failed: {:#}", query, e);
                SearchOutcome::Failed(format!("{:#}", e))
            }
        }
    }

    fn try_search(&self, query: &str) -> Result<Vec<PlaceCandidate>> {
        let url = self.search_url(query);
        log::debug!("GET {}", url);

        // The client carries the User-Agent required by the usage policy
        let response = self
            .client
            .get(url)
            .send()
            .context("Failed to send request to Nominatim")?;

        if !response.status().is_success() {
            return Err(CarteError::HttpStatus {
                service: "Nominatim",
                status: response.status().as_u16(),
            }
            .into());
        }

        let body = response
            .text()
            .context("Failed to read response body from Nominatim")?;
        parse_search_response(&body)
    }
}
