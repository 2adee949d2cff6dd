// Application error type and its HTTP rendering
// Every handler returns AppResult so failures reach the client as a JSON body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::backend::ApiError;
use crate::customer_forms::FormQueueError;
use crate::validation::FieldErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited")]
    RateLimited,
    // Guard outcome, rendered as a 303 redirect rather than an error body
    #[error("redirect to {0}")]
    Redirect(&'static str),
    #[error("session is still loading")]
    Pending,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend failure: {0}")]
    Upstream(String),
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error(transparent)]
    InternalServerError(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Redirect(_) => StatusCode::SEE_OTHER,
            AppError::Pending | AppError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Treats a backend 401 on a login attempt as bad credentials instead of an expired session
    pub fn from_login(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized => AppError::Unauthorized("Email oder Passwort ist falsch".into()),
            ApiError::Conflict(_) => AppError::Conflict("Diese Email ist bereits registriert".into()),
            other => other.into(),
        }
    }
}

impl From<ApiError> for AppError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized => {
                AppError::Unauthorized("Sitzung abgelaufen, bitte erneut anmelden".into())
            }
            ApiError::RateLimited => AppError::RateLimited,
            ApiError::NotFound => AppError::NotFound("Fahrzeug nicht gefunden".into()),
            ApiError::Conflict(message) => AppError::Conflict(message),
            ApiError::Rejected { message, .. } => {
                AppError::Validation(FieldErrors::single("form", message))
            }
            ApiError::InvalidUpload(message) => AppError::Validation(FieldErrors::single("images", message)),
            ApiError::Network(e) => AppError::Network(e.to_string()),
            e @ (ApiError::Server { .. } | ApiError::Decode(_)) => AppError::Upstream(e.to_string()),
        }
    }
}

impl From<FormQueueError> for AppError {
    fn from(error: FormQueueError) -> Self {
        match error {
            FormQueueError::Invalid(fields) => AppError::Validation(fields),
            FormQueueError::NotFound(id) => AppError::NotFound(format!("Formular {} nicht gefunden", id)),
            other => AppError::InternalServerError(other.into()),
        }
    }
}

impl AppError {
    fn into_body(self) -> ErrorBody<'static> {
        let (error, message, fields) = match self {
            AppError::Validation(fields) => (
                "validation",
                "Bitte pruefen Sie die markierten Felder".to_string(),
                Some(fields),
            ),
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized: {}", message);
                ("unauthorized", message, None)
            }
            AppError::RateLimited => (
                "rate_limited",
                "Zu viele Versuche, bitte spaeter erneut versuchen".to_string(),
                None,
            ),
            AppError::Redirect(target) => ("redirect", target.to_string(), None),
            AppError::Pending => ("pending", "Sitzung wird geladen".to_string(), None),
            AppError::NotFound(what) => (
                "not_found",
                format!("{}. Zurueck zur Fahrzeuguebersicht: /fahrzeuge", what),
                None,
            ),
            AppError::Conflict(message) => ("conflict", message, None),
            AppError::Upstream(detail) => {
                tracing::error!(detail = %detail, "Backend request failed");
                (
                    "upstream",
                    "Der Server hat einen Fehler gemeldet, bitte spaeter erneut versuchen".to_string(),
                    None,
                )
            }
            AppError::Network(detail) => {
                tracing::error!(detail = %detail, "Backend unreachable");
                (
                    "network",
                    "Keine Verbindung zum Server, bitte Verbindung pruefen und erneut versuchen".to_string(),
                    None,
                )
            }
            AppError::InternalServerError(e) => {
                // Details stay in the log
                tracing::error!("Internal server error: {:?}", e);
                ("internal", "Internal Server Error".to_string(), None)
            }
        };
        ErrorBody {
            error,
            message,
            fields,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Redirect(target) => {
                tracing::debug!(location = target, "Guard redirect");
                Redirect::to(target).into_response()
            }
            other => (other.status(), Json(other.into_body())).into_response(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::LOCATION;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_carry_field_map() {
        let (status, body) = body_json(AppError::Validation(FieldErrors::single("email", "Ungueltige Email"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation");
        assert_eq!(body["fields"]["email"], "Ungueltige Email");
    }

    #[tokio::test]
    async fn internal_details_are_not_exposed() {
        let (status, body) = body_json(anyhow::anyhow!("disk on fire").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("disk"));
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn not_found_offers_a_way_back() {
        let (status, body) = body_json(ApiError::NotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("/fahrzeuge"));
    }

    #[test]
    fn redirect_uses_see_other() {
        let response = AppError::Redirect("/login").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/login");
    }

    #[test]
    fn backend_errors_map_to_statuses() {
        assert_eq!(AppError::from(ApiError::RateLimited).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::from(ApiError::Server { status: 500 }).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::from(ApiError::Rejected {
                status: 400,
                message: "Nachricht zu kurz".into()
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert!(matches!(
            AppError::from_login(ApiError::Unauthorized),
            AppError::Unauthorized(m) if m.contains("Passwort")
        ));
        assert_eq!(AppError::from_login(ApiError::Conflict(String::new())).status(), StatusCode::CONFLICT);
    }
}
