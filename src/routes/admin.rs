// Admin dashboard handlers. Every handler takes AdminUser, so the route guard runs first.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    auth_middleware::AdminUser,
    backend::{ApiError, VehicleListing},
    error::{AppError, AppResult},
    models::{CustomerForm, FormStatus, ImageUpload, Vehicle, VehicleDraft, VehicleId},
    validation::{FieldErrors, MAX_IMAGES, MAX_IMAGE_BYTES, validate_vehicle_form},
    AppState,
};

// Room for a full set of images plus the text fields
pub const UPLOAD_LIMIT: usize = MAX_IMAGES * MAX_IMAGE_BYTES + 1024 * 1024;

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct StatusInput {
    status: FormStatus,
}

// A 401 from the backend means the stored token is no longer accepted
async fn backend_result<T>(state: &AppState, result: Result<T, ApiError>) -> AppResult<T> {
    match result {
        Err(ApiError::Unauthorized) => {
            tracing::warn!("Backend rejected admin token, ending session");
            state.context.session.lock().await.logout();
            Err(ApiError::Unauthorized.into())
        }
        other => Ok(other?),
    }
}

fn parse_number(field: &'static str, raw: &str, errors: &mut FieldErrors) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(field, "Bitte eine Zahl eingeben");
            None
        }
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(FieldErrors::single("form", e.body_text()))
}

async fn read_draft(mut multipart: Multipart) -> AppResult<VehicleDraft> {
    let mut draft = VehicleDraft::default();
    let mut errors = FieldErrors::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
            draft.images.push(ImageUpload {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let text = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "brand" => draft.brand = text.trim().to_string(),
            "model" => draft.model = text.trim().to_string(),
            "year" => draft.year = parse_number("year", &text, &mut errors),
            "price" => draft.price = parse_number("price", &text, &mut errors),
            "mileage" => draft.mileage = parse_number("mileage", &text, &mut errors),
            "description" => draft.description = Some(text).filter(|d| !d.trim().is_empty()),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    if let Err(form_errors) = validate_vehicle_form(&draft) {
        errors.merge(form_errors);
    }
    errors.into_result().map_err(AppError::Validation)?;
    Ok(draft)
}

// --- Vehicles ---

pub async fn list_vehicles(
    admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<VehicleListing>> {
    let page = query
        .page
        .map(|page| (page, query.limit.unwrap_or(state.settings.page_size)));
    let result = state.backend.list_vehicles(page, Some(&admin.token)).await;
    Ok(Json(backend_result(&state, result).await?))
}

pub async fn create_vehicle(
    admin: AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Vehicle>)> {
    let draft = read_draft(multipart).await?;
    let result = state.backend.create_vehicle(&draft, &admin.token).await;
    let vehicle = backend_result(&state, result).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn update_vehicle(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    multipart: Multipart,
) -> AppResult<Json<Vehicle>> {
    let draft = read_draft(multipart).await?;
    let result = state.backend.update_vehicle(id, &draft, &admin.token).await;
    Ok(Json(backend_result(&state, result).await?))
}

pub async fn delete_vehicle(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
) -> AppResult<StatusCode> {
    let result = state.backend.delete_vehicle(id, &admin.token).await;
    backend_result(&state, result).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Customer forms ---

pub async fn list_forms(_admin: AdminUser, State(state): State<AppState>) -> Json<Vec<CustomerForm>> {
    Json(state.context.forms.list())
}

pub async fn get_form(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> AppResult<Json<CustomerForm>> {
    state
        .context
        .forms
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Formular {} nicht gefunden", id)))
}

pub async fn update_form_status(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<StatusInput>,
) -> AppResult<Json<CustomerForm>> {
    let form = state.context.forms.update_status(id, input.status)?;
    tracing::info!(form_id = id, admin_id = admin.user.id, "Form status changed by admin");
    Ok(Json(form))
}

pub async fn export_forms(_admin: AdminUser, State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let csv = state.context.forms.export_csv()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"kundenformulare.csv\""),
        ],
        csv,
    ))
}
