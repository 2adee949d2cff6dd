use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{AuthResponse, LoginRequest, RegisterRequest, User},
    session::GuardDecision,
    validation::{PasswordStrength, password_score, password_strength, validate_login, validate_registration},
    AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    loading: bool,
    authenticated: bool,
    is_admin: bool,
    user: Option<User>,
}

#[derive(Deserialize)]
pub struct GuardQuery {
    #[serde(default)]
    admin: bool,
}

#[derive(Serialize)]
pub struct GuardResponse {
    decision: GuardDecision,
    redirect: Option<&'static str>,
}

#[derive(Deserialize)]
pub struct PasswordInput {
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
pub struct StrengthResponse {
    score: u8,
    strength: PasswordStrength,
}

// Record a successful backend login in the shared session
async fn start_session(state: &AppState, response: &AuthResponse) {
    let mut session = state.context.session.lock().await;
    if let Err(e) = session.login(response.user.clone(), response.token.clone()) {
        // The in-memory session is still usable; it just won't survive a restart
        tracing::warn!(error = %e, "Failed to persist session");
    }
}

// Handler for POST /api/auth/login
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> AppResult<Json<AuthResponse>> {
    validate_login(&request).map_err(AppError::Validation)?;
    let response = state.backend.login(&request).await.map_err(AppError::from_login)?;
    start_session(&state, &response).await;
    Ok(Json(response))
}

// Handler for POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    validate_registration(&request).map_err(AppError::Validation)?;
    let response = state
        .backend
        .register(&request)
        .await
        .map_err(AppError::from_login)?;
    tracing::info!(user_id = response.user.id, "Account registered");
    start_session(&state, &response).await;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.context.session.lock().await.logout();
    StatusCode::NO_CONTENT
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let session = state.context.session.lock().await;
    Json(SessionResponse {
        loading: session.is_loading(),
        authenticated: session.is_authenticated(),
        is_admin: session.is_admin(),
        user: session.user().cloned(),
    })
}

// Lets the frontend ask what to do with a protected page before rendering it
pub async fn guard(State(state): State<AppState>, Query(query): Query<GuardQuery>) -> Json<GuardResponse> {
    let decision = state.context.session.lock().await.guard(query.admin);
    Json(GuardResponse {
        decision,
        redirect: decision.redirect_target(),
    })
}

// Meter shown next to the registration password field
pub async fn check_password(Json(input): Json<PasswordInput>) -> Json<StrengthResponse> {
    let score = password_score(&input.password);
    Json(StrengthResponse {
        score,
        strength: password_strength(score),
    })
}
