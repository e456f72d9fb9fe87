use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared::domain::CountryRecord;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://restcountries.com/v3.1";

const RECORD_FIELDS: &str = "name,population,continents";

#[derive(Debug, Error)]
pub enum CountrySourceError {
    #[error("no country matches '{name}'")]
    NotFound { name: String },
    #[error("country directory unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("invalid country directory url: {0}")]
    InvalidUrl(String),
}

/// Read-only directory of countries. Implementations must not cache.
#[async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<CountryRecord>, CountrySourceError>;

    /// Case-insensitive name lookup. Never returns an empty list; an empty
    /// match is reported as `NotFound`.
    async fn fetch_by_name(&self, name: &str) -> Result<Vec<CountryRecord>, CountrySourceError>;
}

#[derive(Debug, Deserialize)]
struct RestCountry {
    name: RestCountryName,
    #[serde(default)]
    population: u64,
    #[serde(default)]
    continents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RestCountryName {
    common: String,
}

impl From<RestCountry> for CountryRecord {
    fn from(value: RestCountry) -> Self {
        Self {
            name: value.name.common,
            population: value.population,
            continents: value.continents,
        }
    }
}

/// Client for the restcountries.com v3.1 API (or anything serving the same
/// `/all` and `/name/{name}` shapes).
#[derive(Debug, Clone)]
pub struct RestCountriesClient {
    http: Client,
    base_url: Url,
}

impl RestCountriesClient {
    pub fn new(base_url: &str) -> Result<Self, CountrySourceError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, CountrySourceError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| CountrySourceError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CountrySourceError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CountrySourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CountrySourceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("fields", RECORD_FIELDS);
        Ok(url)
    }

    async fn get_records(&self, url: Url) -> Result<Option<Vec<CountryRecord>>, CountrySourceError> {
        debug!(%url, "country directory request");
        let response = self.http.get(url.clone()).send().await.map_err(|error| {
            warn!(%url, %error, "country directory request failed");
            error
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status().map_err(|error| {
            warn!(%url, %error, "country directory returned an error status");
            error
        })?;
        let countries: Vec<RestCountry> = response.json().await.map_err(|error| {
            warn!(%url, %error, "country directory returned an unexpected body");
            error
        })?;
        Ok(Some(countries.into_iter().map(CountryRecord::from).collect()))
    }
}

#[async_trait]
impl CountrySource for RestCountriesClient {
    async fn fetch_all(&self) -> Result<Vec<CountryRecord>, CountrySourceError> {
        let url = self.endpoint(&["all"])?;
        Ok(self.get_records(url).await?.unwrap_or_default())
    }

    async fn fetch_by_name(&self, name: &str) -> Result<Vec<CountryRecord>, CountrySourceError> {
        let url = self.endpoint(&["name", name])?;
        match self.get_records(url).await? {
            Some(countries) if !countries.is_empty() => Ok(countries),
            _ => Err(CountrySourceError::NotFound {
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
