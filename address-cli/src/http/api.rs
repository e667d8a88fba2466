//! Query routes mounted under `/api`.

use address_core::{
    Address, AdvancedQuery, CitySummary, FulltextQuery, ReverseQuery, SearchHit, advanced_search,
    fulltext_search, reverse_geocode,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, run_blocking};

const DEFAULT_PAGE_SIZE: i64 = 100;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(search))
        .route("/search/advanced", get(advanced))
        .route("/reverse", get(reverse))
        .route("/stats", get(stats))
        .route("/address/:id", get(address_by_id))
        .route("/addresses", get(addresses_by_fields))
        .route("/city/:city/addresses", get(addresses_in_city))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
struct AdvancedParams {
    #[serde(default)]
    q: String,
    limit: Option<i64>,
    #[serde(default)]
    highlight: bool,
}

#[derive(Debug, Deserialize)]
struct ReverseParams {
    lat: Option<f64>,
    lon: Option<f64>,
    radius: Option<f64>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FieldParams {
    street: Option<String>,
    house_number: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<i64>,
    page_size: Option<i64>,
}

#[derive(Serialize)]
struct AddressesBody {
    addresses: Vec<Address>,
}

#[derive(Serialize)]
struct ResultsBody {
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct AddressBody {
    address: Address,
}

#[derive(Serialize)]
struct StatsBody {
    address_count: i64,
    cities: CitySummary,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<AddressesBody>, ApiError> {
    let query = FulltextQuery::new(params.q)?;
    let addresses = run_blocking(&state, move |manager| fulltext_search(manager, &query)).await?;
    Ok(Json(AddressesBody { addresses }))
}

async fn advanced(
    State(state): State<AppState>,
    Query(params): Query<AdvancedParams>,
) -> Result<Json<ResultsBody>, ApiError> {
    let query = AdvancedQuery::new(params.q, params.limit, params.highlight)?;
    let results = run_blocking(&state, move |manager| advanced_search(manager, &query)).await?;
    Ok(Json(ResultsBody { results }))
}

async fn reverse(
    State(state): State<AppState>,
    Query(params): Query<ReverseParams>,
) -> Result<Json<AddressesBody>, ApiError> {
    let latitude = params.lat.ok_or(ApiError::MissingParameter("lat"))?;
    let longitude = params.lon.ok_or(ApiError::MissingParameter("lon"))?;
    let query = ReverseQuery::from_request(latitude, longitude, params.radius, params.limit)?;
    let addresses = run_blocking(&state, move |manager| reverse_geocode(manager, &query)).await?;
    Ok(Json(AddressesBody { addresses }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsBody>, ApiError> {
    let (address_count, cities) = run_blocking(&state, |manager| {
        manager.with_store(|store| Ok((store.address_count()?, store.city_summary()?)))
    })
    .await?;
    Ok(Json(StatsBody {
        address_count,
        cities,
    }))
}

async fn address_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AddressBody>, ApiError> {
    let found = run_blocking(&state, move |manager| {
        manager.with_store(|store| store.address_by_id(id))
    })
    .await?;
    let address = found.ok_or(ApiError::NotFound(id))?;
    Ok(Json(AddressBody { address }))
}

async fn addresses_by_fields(
    State(state): State<AppState>,
    Query(params): Query<FieldParams>,
) -> Result<Json<AddressesBody>, ApiError> {
    let addresses = run_blocking(&state, move |manager| {
        manager.with_store(|store| {
            store.search_by_fields(
                params.street.as_deref(),
                params.house_number.as_deref(),
                params.city.as_deref(),
            )
        })
    })
    .await?;
    Ok(Json(AddressesBody { addresses }))
}

async fn addresses_in_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<AddressesBody>, ApiError> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let addresses = run_blocking(&state, move |manager| {
        manager.with_store(|store| store.addresses_by_city(&city, page, page_size))
    })
    .await?;
    Ok(Json(AddressesBody { addresses }))
}
