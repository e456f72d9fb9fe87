use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use country_source::RestCountriesClient;
use server_api::{health_check, search_country, submit_vote, top_countries, ApiContext};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{CountryView, SearchQuery, VoteReceipt, VoteRequest},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

const MAX_BODY_BYTES: usize = 16 * 1024;

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::with_max_connections(&database_url, settings.db_max_connections)
        .await
        .map_err(|error| {
            error!(
                %database_url,
                %error,
                "failed to open SQLite database; verify parent directory exists and permissions are correct"
            );
            error
        })?;
    let countries = RestCountriesClient::new(&settings.country_api_url)?;
    info!(
        %database_url,
        country_api_url = %countries.base_url(),
        "vote store ready"
    );

    let state = AppState {
        api: ApiContext::new(Arc::new(storage), Arc::new(countries)),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/paises/top10", get(http_top_countries))
        .route("/paises/buscar", get(http_search_country))
        .route("/paises/avaliar", post(http_submit_vote))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::UpstreamUnavailable | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn http_error(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    health_check(&state.api).await.map_err(http_error)?;
    Ok("ok")
}

async fn http_top_countries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CountryView>>, HttpError> {
    let countries = top_countries(&state.api).await.map_err(http_error)?;
    Ok(Json(countries))
}

async fn http_search_country(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<CountryView>, HttpError> {
    let Query(q) = query.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
        )
    })?;
    let country = search_country(&state.api, &q.nome)
        .await
        .map_err(http_error)?;
    Ok(Json(country))
}

async fn http_submit_vote(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteReceipt>, HttpError> {
    let Json(req) = payload.map_err(|rejection| {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
        )
    })?;
    let receipt = submit_vote(&state.api, &req).await.map_err(http_error)?;
    Ok(Json(receipt))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
