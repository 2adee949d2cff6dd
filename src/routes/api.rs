// Handlers for the visitor-facing API: listings, favorites, compare, theme and the sell wizard

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{
    backend::BackendClient,
    compare::CompareSet,
    error::{AppError, AppResult},
    favorites::Favorites,
    models::{CustomerForm, InquiryRequest, SellSubmission, Vehicle, VehicleId},
    query::{ListingParams, QueryPage, SortKey, run_query},
    theme::{ThemeMode, ThemeState},
    validation::{FieldErrors, SellStep, validate_inquiry, validate_sell_step},
    AppState,
};

// --- Response Wrappers ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleView {
    #[serde(flatten)]
    vehicle: Vehicle,
    image_urls: Vec<String>,
    is_favorite: bool,
    is_in_compare: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePage {
    items: Vec<VehicleView>,
    total: usize,
    page: usize,
    page_size: usize,
    total_pages: usize,
    no_results: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    params: ListingParams,
    pending_search: Option<String>,
    has_active_filters: bool,
    results: VehiclePage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesState {
    ids: Vec<VehicleId>,
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareState {
    ids: Vec<VehicleId>,
    count: usize,
    max: usize,
    can_add_more: bool,
}

// Result of a single-vehicle membership change
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange<T> {
    id: VehicleId,
    active: bool,
    #[serde(flatten)]
    state: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithVehicles<T> {
    #[serde(flatten)]
    state: T,
    vehicles: Vec<VehicleView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeResponse {
    mode: ThemeMode,
    is_dark_mode: bool,
    has_explicit_choice: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    step: u8,
    valid: bool,
    next_step: Option<u8>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

// --- Request Structs ---

#[derive(Deserialize)]
pub struct SearchInput {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
pub struct SortInput {
    sort: String,
}

#[derive(Deserialize)]
pub struct PageInput {
    page: usize,
}

#[derive(Deserialize)]
pub struct ThemeInput {
    mode: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInput {
    prefers_dark: bool,
}

// --- Helpers ---

fn invalid_param((field, message): (&'static str, String)) -> AppError {
    AppError::Validation(FieldErrors::single(field, message))
}

fn image_urls(backend: &BackendClient, vehicle: &Vehicle) -> Vec<String> {
    if vehicle.images.is_empty() {
        return vec![backend.image_url(None)];
    }
    vehicle
        .images
        .iter()
        .map(|image| backend.image_url(Some(image)))
        .collect()
}

fn build_view(backend: &BackendClient, favorites: &Favorites, compare: &CompareSet, vehicle: Vehicle) -> VehicleView {
    VehicleView {
        image_urls: image_urls(backend, &vehicle),
        is_favorite: favorites.is_favorite(vehicle.id),
        is_in_compare: compare.is_in_compare(vehicle.id),
        vehicle,
    }
}

// Locks favorites before compare; nothing else holds both
async fn views(state: &AppState, vehicles: Vec<Vehicle>) -> Vec<VehicleView> {
    let favorites = state.context.favorites.lock().await;
    let compare = state.context.compare.lock().await;
    vehicles
        .into_iter()
        .map(|vehicle| build_view(&state.backend, &favorites, &compare, vehicle))
        .collect()
}

async fn page_view(state: &AppState, page: QueryPage) -> VehiclePage {
    let no_results = page.no_results();
    VehiclePage {
        items: views(state, page.items).await,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
        no_results,
    }
}

fn favorites_state(favorites: &Favorites) -> FavoritesState {
    FavoritesState {
        ids: favorites.ids().to_vec(),
        count: favorites.count(),
    }
}

fn compare_state(compare: &CompareSet) -> CompareState {
    CompareState {
        ids: compare.ids().to_vec(),
        count: compare.count(),
        max: compare.max(),
        can_add_more: compare.can_add_more(),
    }
}

fn theme_response(theme: &ThemeState) -> ThemeResponse {
    ThemeResponse {
        mode: theme.mode(),
        is_dark_mode: theme.is_dark_mode(),
        has_explicit_choice: theme.has_explicit_choice(),
    }
}

// --- Vehicles ---

pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> AppResult<Json<VehiclePage>> {
    let (spec, page) = params.into_spec().map_err(invalid_param)?;
    let vehicles = state.catalog.vehicles().await?;
    let result = run_query(&vehicles, &spec, page, state.settings.page_size);
    tracing::info!(total = result.total, page, "Vehicle listing requested");
    Ok(Json(page_view(&state, result).await))
}

pub async fn get_vehicle(State(state): State<AppState>, Path(id): Path<VehicleId>) -> AppResult<Json<VehicleView>> {
    let vehicle = state.catalog.vehicle(id).await?;
    let favorites = state.context.favorites.lock().await;
    let compare = state.context.compare.lock().await;
    Ok(Json(build_view(&state.backend, &favorites, &compare, vehicle)))
}

pub async fn submit_inquiry(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    Json(inquiry): Json<InquiryRequest>,
) -> AppResult<impl IntoResponse> {
    validate_inquiry(&inquiry).map_err(AppError::Validation)?;
    state.backend.submit_inquiry(id, &inquiry).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Ihre Anfrage wurde gesendet",
        }),
    ))
}

// --- Listing view state ---

async fn listing_response(state: &AppState) -> AppResult<Json<ListingResponse>> {
    let vehicles = state.catalog.vehicles().await?;
    let (params, pending_search, has_active_filters, result) = {
        let mut listing = state.context.listing.lock().await;
        listing.poll(Instant::now());
        (
            listing.params(),
            listing.pending_search().map(str::to_string),
            listing.has_active_filters(),
            listing.view(&vehicles, state.settings.page_size),
        )
    };
    Ok(Json(ListingResponse {
        params,
        pending_search,
        has_active_filters,
        results: page_view(state, result).await,
    }))
}

pub async fn get_listing(State(state): State<AppState>) -> AppResult<Json<ListingResponse>> {
    listing_response(&state).await
}

pub async fn apply_listing_filters(
    State(state): State<AppState>,
    Json(params): Json<ListingParams>,
) -> AppResult<Json<ListingResponse>> {
    let (spec, _) = params.into_spec().map_err(invalid_param)?;
    state.context.listing.lock().await.apply_filters(spec);
    listing_response(&state).await
}

pub async fn search_listing(
    State(state): State<AppState>,
    Json(input): Json<SearchInput>,
) -> AppResult<Json<ListingResponse>> {
    state
        .context
        .listing
        .lock()
        .await
        .search_input(input.text, Instant::now());
    listing_response(&state).await
}

pub async fn sort_listing(
    State(state): State<AppState>,
    Json(input): Json<SortInput>,
) -> AppResult<Json<ListingResponse>> {
    let sort: SortKey = input
        .sort
        .parse()
        .map_err(|e| invalid_param(("sort", e)))?;
    state.context.listing.lock().await.set_sort(sort);
    listing_response(&state).await
}

pub async fn page_listing(
    State(state): State<AppState>,
    Json(input): Json<PageInput>,
) -> AppResult<Json<ListingResponse>> {
    state.context.listing.lock().await.set_page(input.page);
    listing_response(&state).await
}

pub async fn reset_listing(State(state): State<AppState>) -> AppResult<Json<ListingResponse>> {
    state.context.listing.lock().await.reset();
    listing_response(&state).await
}

// --- Favorites ---

pub async fn get_favorites(State(state): State<AppState>) -> Json<WithVehicles<FavoritesState>> {
    let favorites = favorites_state(&*state.context.favorites.lock().await);
    let vehicles = state.catalog.resolve(&favorites.ids).await;
    Json(WithVehicles {
        state: favorites,
        vehicles: views(&state, vehicles).await,
    })
}

pub async fn add_favorite(State(state): State<AppState>, Path(id): Path<VehicleId>) -> Json<FavoritesState> {
    let mut favorites = state.context.favorites.lock().await;
    favorites.add(id);
    Json(favorites_state(&favorites))
}

pub async fn remove_favorite(State(state): State<AppState>, Path(id): Path<VehicleId>) -> Json<FavoritesState> {
    let mut favorites = state.context.favorites.lock().await;
    favorites.remove(id);
    Json(favorites_state(&favorites))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> Json<MembershipChange<FavoritesState>> {
    let mut favorites = state.context.favorites.lock().await;
    let active = favorites.toggle(id);
    Json(MembershipChange {
        id,
        active,
        state: favorites_state(&favorites),
    })
}

pub async fn clear_favorites(State(state): State<AppState>) -> Json<FavoritesState> {
    let mut favorites = state.context.favorites.lock().await;
    favorites.clear();
    Json(favorites_state(&favorites))
}

// --- Compare ---

pub async fn get_compare(State(state): State<AppState>) -> Json<WithVehicles<CompareState>> {
    let compare = compare_state(&*state.context.compare.lock().await);
    let vehicles = state.catalog.resolve(&compare.ids).await;
    Json(WithVehicles {
        state: compare,
        vehicles: views(&state, vehicles).await,
    })
}

pub async fn add_compare(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> Json<MembershipChange<CompareState>> {
    let mut compare = state.context.compare.lock().await;
    let active = compare.add(id);
    Json(MembershipChange {
        id,
        active,
        state: compare_state(&compare),
    })
}

pub async fn remove_compare(State(state): State<AppState>, Path(id): Path<VehicleId>) -> Json<CompareState> {
    let mut compare = state.context.compare.lock().await;
    compare.remove(id);
    Json(compare_state(&compare))
}

pub async fn toggle_compare(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> Json<MembershipChange<CompareState>> {
    let mut compare = state.context.compare.lock().await;
    let active = compare.toggle(id);
    Json(MembershipChange {
        id,
        active,
        state: compare_state(&compare),
    })
}

pub async fn clear_compare(State(state): State<AppState>) -> Json<CompareState> {
    let mut compare = state.context.compare.lock().await;
    compare.clear();
    Json(compare_state(&compare))
}

// --- Theme ---

pub async fn get_theme(State(state): State<AppState>) -> Json<ThemeResponse> {
    Json(theme_response(&*state.context.theme.lock().await))
}

pub async fn toggle_theme(State(state): State<AppState>) -> Json<ThemeResponse> {
    let mut theme = state.context.theme.lock().await;
    let mode = theme.toggle();
    tracing::info!(mode = mode.as_str(), "Theme toggled");
    Json(theme_response(&theme))
}

pub async fn set_theme(State(state): State<AppState>, Json(input): Json<ThemeInput>) -> AppResult<Json<ThemeResponse>> {
    let mut theme = state.context.theme.lock().await;
    if !theme.set_mode(&input.mode) {
        return Err(invalid_param(("mode", format!("Unbekannter Modus: {}", input.mode))));
    }
    Ok(Json(theme_response(&theme)))
}

pub async fn theme_environment(
    State(state): State<AppState>,
    Json(input): Json<EnvironmentInput>,
) -> Json<ThemeResponse> {
    let mut theme = state.context.theme.lock().await;
    theme.environment_changed(input.prefers_dark);
    Json(theme_response(&theme))
}

// --- Sell wizard ---

pub async fn submit_sell(
    State(state): State<AppState>,
    Json(submission): Json<SellSubmission>,
) -> AppResult<(StatusCode, Json<CustomerForm>)> {
    let form = state.context.forms.submit(submission, Utc::now())?;
    Ok((StatusCode::CREATED, Json(form)))
}

pub async fn validate_sell(Path(step): Path<u8>, Json(submission): Json<SellSubmission>) -> AppResult<Json<StepResponse>> {
    let sell_step = SellStep::from_number(step).ok_or_else(|| AppError::NotFound(format!("Schritt {} existiert nicht", step)))?;
    validate_sell_step(&submission, sell_step).map_err(AppError::Validation)?;
    Ok(Json(StepResponse {
        step,
        valid: true,
        next_step: SellStep::from_number(step + 1).map(|_| step + 1),
    }))
}
