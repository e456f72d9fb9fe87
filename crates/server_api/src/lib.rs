use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use country_source::{CountrySource, CountrySourceError};
use shared::{
    domain::{CountryRecord, Rating, VoteTally},
    error::{ApiError, ErrorCode},
    protocol::{CountryView, VoteReceipt, VoteRequest, VOTE_STATUS_SUCCESS},
};
use storage::VoteStore;
use tracing::{error, info, warn};

pub const TOP_COUNTRIES_LIMIT: usize = 10;

#[derive(Clone)]
pub struct ApiContext {
    pub votes: Arc<dyn VoteStore>,
    pub countries: Arc<dyn CountrySource>,
}

impl ApiContext {
    pub fn new(votes: Arc<dyn VoteStore>, countries: Arc<dyn CountrySource>) -> Self {
        Self { votes, countries }
    }
}

/// Pairs each record with its tally, keeping the record order.
pub fn aggregate(
    countries: &[CountryRecord],
    tallies: &HashMap<String, VoteTally>,
) -> Vec<CountryView> {
    countries
        .iter()
        .map(|country| {
            let tally = tallies.get(&country.name).copied();
            debug_assert!(tally.is_some(), "no tally for '{}'", country.name);
            CountryView::new(country, tally.unwrap_or_default())
        })
        .collect()
}

/// The `limit` most populous countries. Repeated names keep their first
/// occurrence; equal populations keep the upstream order.
pub fn most_populous(countries: Vec<CountryRecord>, limit: usize) -> Vec<CountryRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<CountryRecord> = countries
        .into_iter()
        .filter(|country| seen.insert(country.name.clone()))
        .collect();
    unique.sort_by(|a, b| b.population.cmp(&a.population));
    unique.truncate(limit);
    unique
}

pub async fn top_countries(ctx: &ApiContext) -> Result<Vec<CountryView>, ApiError> {
    let countries = ctx.countries.fetch_all().await.map_err(upstream)?;
    let top = most_populous(countries, TOP_COUNTRIES_LIMIT);
    let names: Vec<String> = top.iter().map(|country| country.name.clone()).collect();
    let tallies = ctx.votes.tally(&names).await.map_err(internal)?;
    Ok(aggregate(&top, &tallies))
}

pub async fn search_country(ctx: &ApiContext, name: &str) -> Result<CountryView, ApiError> {
    let name = require_name(name)?;
    let country = first_match(ctx, name).await?;
    let tallies = ctx
        .votes
        .tally(std::slice::from_ref(&country.name))
        .await
        .map_err(internal)?;
    aggregate(std::slice::from_ref(&country), &tallies)
        .pop()
        .ok_or_else(|| ApiError::new(ErrorCode::Internal, "aggregation produced no view"))
}

pub async fn submit_vote(ctx: &ApiContext, request: &VoteRequest) -> Result<VoteReceipt, ApiError> {
    let rating = Rating::from_token(&request.avaliacao).ok_or_else(|| {
        ApiError::new(
            ErrorCode::Validation,
            format!(
                "Avaliação deve ser '{}' ou '{}'",
                Rating::LIKE_TOKEN,
                Rating::DISLIKE_TOKEN
            ),
        )
    })?;
    let country = first_match(ctx, &request.nome).await?;

    let vote_id = ctx
        .votes
        .record_vote(&country.name, rating)
        .await
        .map_err(internal)?;
    info!(
        vote_id = vote_id.0,
        country = %country.name,
        rating = rating.as_token(),
        "vote recorded"
    );

    let tally = ctx
        .votes
        .tally(std::slice::from_ref(&country.name))
        .await
        .map_err(internal)?
        .get(&country.name)
        .copied()
        .unwrap_or_default();

    Ok(VoteReceipt {
        country: country.name,
        status: VOTE_STATUS_SUCCESS.to_string(),
        vote_count: tally.total(),
    })
}

pub async fn health_check(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.votes.health_check().await.map_err(internal)
}

async fn first_match(ctx: &ApiContext, name: &str) -> Result<CountryRecord, ApiError> {
    ctx.countries
        .fetch_by_name(name)
        .await
        .map_err(upstream)?
        .into_iter()
        .next()
        .ok_or_else(ApiError::not_found)
}

fn require_name(name: &str) -> Result<&str, ApiError> {
    if name.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "nome deve ter pelo menos 1 caractere",
        ));
    }
    Ok(name)
}

fn upstream(err: CountrySourceError) -> ApiError {
    match err {
        CountrySourceError::NotFound { .. } => ApiError::not_found(),
        other => {
            warn!(error = %other, "country directory failure");
            ApiError::new(
                ErrorCode::UpstreamUnavailable,
                format!("Erro ao consultar API: {other}"),
            )
        }
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %err, "vote store failure");
    ApiError::new(ErrorCode::Internal, format!("Erro interno: {err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
