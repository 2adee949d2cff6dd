// Route definitions

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod admin;
mod api;
mod auth;

pub fn create_router(app_state: AppState) -> Router {
    // Guarded by the AdminUser extractor in every handler
    let admin_router = Router::new()
        .route("/vehicles", get(admin::list_vehicles).post(admin::create_vehicle))
        .route(
            "/vehicles/:id",
            put(admin::update_vehicle).delete(admin::delete_vehicle),
        )
        .route("/forms", get(admin::list_forms))
        .route("/forms/export", get(admin::export_forms))
        .route("/forms/:id", get(admin::get_form))
        .route("/forms/:id/status", put(admin::update_form_status))
        .layer(DefaultBodyLimit::max(admin::UPLOAD_LIMIT));

    let api_router = Router::new()
        // Catalog
        .route("/vehicles", get(api::list_vehicles))
        .route("/vehicles/:id", get(api::get_vehicle))
        .route("/vehicles/:id/inquiries", post(api::submit_inquiry))
        // Listing view state
        .route("/listing", get(api::get_listing).post(api::apply_listing_filters))
        .route("/listing/search", post(api::search_listing))
        .route("/listing/sort", post(api::sort_listing))
        .route("/listing/page", post(api::page_listing))
        .route("/listing/reset", post(api::reset_listing))
        // Favorites
        .route("/favorites", get(api::get_favorites).delete(api::clear_favorites))
        .route(
            "/favorites/:id",
            post(api::add_favorite).delete(api::remove_favorite),
        )
        .route("/favorites/:id/toggle", post(api::toggle_favorite))
        // Compare
        .route("/compare", get(api::get_compare).delete(api::clear_compare))
        .route("/compare/:id", post(api::add_compare).delete(api::remove_compare))
        .route("/compare/:id/toggle", post(api::toggle_compare))
        // Theme
        .route("/theme", get(api::get_theme).put(api::set_theme))
        .route("/theme/toggle", post(api::toggle_theme))
        .route("/theme/environment", post(api::theme_environment))
        // Session
        .route("/session", get(auth::get_session))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/guard", get(auth::guard))
        .route("/auth/password-strength", post(auth::check_password))
        // Sell wizard
        .route("/sell", post(api::submit_sell))
        .route("/sell/validate/:step", post(api::validate_sell))
        .nest("/admin", admin_router);

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::BackendClient,
        catalog::{load_file, Catalog},
        config::Settings,
        context::ClientContext,
        models::User,
        storage::{KeyValueStore, MemoryStore},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::io::Write;
    use std::sync::Arc;
    use tower::ServiceExt;

    const CATALOG: &str = r#"[
        {"id":1,"brand":"BMW","model":"M4","year":2022,"price":89900,"mileage":15000,
         "fuelType":"Benzin","transmission":"Automatik","images":["m4.jpg"]},
        {"id":2,"brand":"Audi","model":"A3","year":2021,"price":58900,"mileage":32000,
         "fuelType":"Benzin","transmission":"Schaltgetriebe"},
        {"id":3,"brand":"Tesla","model":"Model 3","year":2023,"price":42990,"mileage":8000,
         "fuelType":"Elektro","transmission":"Automatik"},
        {"id":4,"brand":"VW","model":"Golf","year":2019,"price":18500,"mileage":76000,
         "fuelType":"Diesel","transmission":"Schaltgetriebe"}
    ]"#;

    fn test_state() -> AppState {
        let mut settings = Settings::for_tests();
        // Commit search input on the next poll
        settings.search_debounce_ms = 0;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let vehicles = load_file(file.path()).unwrap();

        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let backend = BackendClient::new(&settings).unwrap();
        AppState {
            context: ClientContext::init(store, &settings),
            catalog: Catalog::Static(Arc::new(vehicles)),
            backend,
            settings: Arc::new(settings),
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn login_admin(state: &AppState) {
        let admin = User {
            id: 1,
            email: "admin@kfz.de".into(),
            name: "Admin".into(),
            role: "admin".into(),
        };
        state
            .context
            .session
            .lock()
            .await
            .login(admin, "admin-token".into())
            .unwrap();
    }

    #[tokio::test]
    async fn vehicle_query_filters_and_resolves_images() {
        let app = create_router(test_state());
        let (status, body) = send(&app, "GET", "/api/vehicles?minPrice=60000&fuel=benzin", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["id"], 1);
        assert_eq!(
            body["items"][0]["imageUrls"][0],
            "http://127.0.0.1:9/uploads/vehicles/m4.jpg"
        );

        let (status, body) = send(&app, "GET", "/api/vehicles?sort=year_desc&page=2&brands=", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPages"], 1);
        assert_eq!(body["items"].as_array().unwrap().len(), 0);
        assert_eq!(body["noResults"], false);
    }

    #[tokio::test]
    async fn unknown_fuel_is_rejected() {
        let app = create_router(test_state());
        let (status, body) = send(&app, "GET", "/api/vehicles?fuel=kerosin", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["fuel"].is_string());
    }

    #[tokio::test]
    async fn numeric_params_are_validated() {
        let app = create_router(test_state());
        let (status, body) = send(&app, "GET", "/api/vehicles?minPrice=", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 4);

        let (status, body) = send(&app, "GET", "/api/vehicles?minPrice=abc", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation");
        assert!(body["fields"]["minPrice"].is_string());

        let (status, body) = send(&app, "GET", "/api/vehicles?page=zwei", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["page"].is_string());
    }

    #[tokio::test]
    async fn missing_vehicle_is_not_found() {
        let app = create_router(test_state());
        let (status, body) = send(&app, "GET", "/api/vehicles/99", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn favorites_toggle_and_resolve() {
        let app = create_router(test_state());
        let (_, body) = send(&app, "POST", "/api/favorites/3/toggle", None, None).await;
        assert_eq!(body["active"], true);
        send(&app, "POST", "/api/favorites/1", None, None).await;

        let (_, body) = send(&app, "GET", "/api/favorites", None, None).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["vehicles"][0]["brand"], "Tesla");
        assert_eq!(body["vehicles"][0]["isFavorite"], true);

        let (_, body) = send(&app, "POST", "/api/favorites/3/toggle", None, None).await;
        assert_eq!(body["active"], false);
        assert_eq!(body["ids"], json!([1]));
    }

    #[tokio::test]
    async fn compare_is_capped_at_three() {
        let app = create_router(test_state());
        for id in 1..=3 {
            send(&app, "POST", &format!("/api/compare/{}", id), None, None).await;
        }
        let (status, body) = send(&app, "POST", "/api/compare/4", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], false);
        assert_eq!(body["canAddMore"], false);
        assert_eq!(body["ids"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn explicit_theme_ignores_environment() {
        let app = create_router(test_state());
        let (_, body) = send(&app, "POST", "/api/theme/environment", Some(json!({"prefersDark": true})), None).await;
        assert_eq!(body["mode"], "dark");
        assert_eq!(body["hasExplicitChoice"], false);

        let (_, body) = send(&app, "PUT", "/api/theme", Some(json!({"mode": "light"})), None).await;
        assert_eq!(body["hasExplicitChoice"], true);

        let (_, body) = send(&app, "POST", "/api/theme/environment", Some(json!({"prefersDark": true})), None).await;
        assert_eq!(body["mode"], "light");

        let (status, _) = send(&app, "PUT", "/api/theme", Some(json!({"mode": "sepia"})), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn listing_state_tracks_search_and_filters() {
        let app = create_router(test_state());
        send(&app, "POST", "/api/listing/page", Some(json!({"page": 2})), None).await;
        let (_, body) = send(&app, "POST", "/api/listing/search", Some(json!({"text": "golf"})), None).await;
        assert_eq!(body["params"]["q"], "golf");
        assert!(body["params"].get("page").is_none());
        assert_eq!(body["results"]["total"], 1);

        let (_, body) = send(&app, "POST", "/api/listing", Some(json!({"fuel": "Elektro"})), None).await;
        assert_eq!(body["params"]["q"], "golf");
        assert_eq!(body["results"]["noResults"], true);
        assert_eq!(body["hasActiveFilters"], true);

        let (_, body) = send(&app, "POST", "/api/listing/reset", None, None).await;
        assert_eq!(body["params"], json!({}));
        assert_eq!(body["results"]["total"], 4);
    }

    #[tokio::test]
    async fn invalid_forms_never_reach_backend() {
        let app = create_router(test_state());
        let (status, body) = send(&app, "POST", "/api/auth/login", Some(json!({"email": "nope"})), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["password"].is_string());

        let (status, body) = send(&app, "POST", "/api/vehicles/1/inquiries", Some(json!({"name": "Erika", "message": "kurz"})), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["message"].is_string());
    }

    #[tokio::test]
    async fn admin_routes_are_guarded() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/admin/forms").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");

        login_admin(&state).await;
        let (status, _) = send(&app, "GET", "/api/admin/forms", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = send(&app, "GET", "/api/admin/forms", None, Some("admin-token")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn non_admin_is_sent_home() {
        let state = test_state();
        let app = create_router(state.clone());
        let customer = User {
            id: 7,
            email: "kunde@kfz.de".into(),
            name: "Kunde".into(),
            role: "user".into(),
        };
        state.context.session.lock().await.login(customer, "user-token".into()).unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/admin/forms")
                    .header(header::AUTHORIZATION, "Bearer user-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let (_, body) = send(&app, "GET", "/api/auth/guard", None, None).await;
        assert_eq!(body["decision"], "allow");
        let (_, body) = send(&app, "GET", "/api/auth/guard?admin=true", None, None).await;
        assert_eq!(body["decision"], "redirect_to_home");
        assert_eq!(body["redirect"], "/");
    }

    #[tokio::test]
    async fn sell_submission_lands_in_review_queue() {
        let state = test_state();
        let app = create_router(state.clone());
        let submission = json!({
            "brand": "Opel", "model": "Astra", "year": 2017, "mileage": 110000,
            "fuelType": "Diesel", "transmission": "Schaltgetriebe",
            "images": ["astra.jpg"],
            "contactName": "Tom", "email": "tom@kfz.de", "phone": "0170 1234567"
        });

        let (status, body) = send(&app, "POST", "/api/sell/validate/3", Some(submission.clone()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nextStep"], Value::Null);
        let (status, _) = send(&app, "POST", "/api/sell/validate/4", Some(submission.clone()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, form) = send(&app, "POST", "/api/sell", Some(submission), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(form["status"], "neu");

        login_admin(&state).await;
        let id = form["id"].as_u64().unwrap();
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/admin/forms/{}/status", id),
            Some(json!({"status": "abgeschlossen"})),
            Some("admin-token"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "abgeschlossen");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/admin/forms/export")
                    .header(header::AUTHORIZATION, "Bearer admin-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let csv = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&csv).contains("Abgeschlossen"));
    }

    #[tokio::test]
    async fn password_meter_scores_input() {
        let app = create_router(test_state());
        let (_, body) = send(&app, "POST", "/api/auth/password-strength", Some(json!({"password": "Abcdefg1!xyz"})), None).await;
        assert_eq!(body["score"], 100);
        assert_eq!(body["strength"], "strong");
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let state = test_state();
        let app = create_router(state.clone());
        login_admin(&state).await;

        let (_, body) = send(&app, "GET", "/api/session", None, None).await;
        assert_eq!(body["isAdmin"], true);
        let (status, _) = send(&app, "POST", "/api/auth/logout", None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&app, "GET", "/api/session", None, None).await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["user"], Value::Null);
    }
}
