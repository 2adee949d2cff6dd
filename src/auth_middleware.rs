use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::warn;

use crate::error::AppError;
use crate::models::User;
use crate::session::GuardDecision;
use crate::AppState;

// Extracted in admin handlers. Runs the route guard against the shared session,
// then requires the caller to present the session's bearer token.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let (user, token) = {
            let session = app_state.context.session.lock().await;
            match session.guard(true) {
                GuardDecision::Allow => {}
                GuardDecision::Pending => return Err(AppError::Pending),
                decision => {
                    let target = decision.redirect_target().unwrap_or("/login");
                    warn!(target_path = target, "Admin route guard redirected request");
                    return Err(AppError::Redirect(target));
                }
            }
            match (session.user(), session.token()) {
                (Some(user), Some(token)) => (user.clone(), token.to_string()),
                _ => return Err(AppError::Redirect("/login")),
            }
        };

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|e| {
                warn!("Failed to extract Authorization header: {}", e);
                AppError::Unauthorized("Missing or invalid Authorization header".into())
            })?;

        if bearer.token() != token {
            warn!(user_id = user.id, "Bearer token does not match the active session");
            return Err(AppError::Unauthorized("Sitzung abgelaufen, bitte erneut anmelden".into()));
        }

        Ok(AdminUser { user, token })
    }
}
