// Client for the marketplace backend (vehicles, auth, inquiries)

use cached::{Cached, SizedCache};
use futures::future::join_all;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::models::{AuthResponse, InquiryRequest, LoginRequest, RegisterRequest, Vehicle, VehicleDraft, VehicleId};

const USER_AGENT: &str = concat!("kfz_marketplace/", env!("CARGO_PKG_VERSION"));
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-vehicle.jpg";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("credentials rejected or session expired")]
    Unauthorized,
    #[error("too many attempts")]
    RateLimited,
    #[error("resource not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rejected by backend ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("backend failed with status {status}")]
    Server { status: u16 },
    #[error("could not reach backend: {0}")]
    Network(#[source] reqwest::Error),
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Decode(error.to_string())
        } else {
            ApiError::Network(error)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Map a non-success status (and the backend's message, if any) to an error.
pub fn error_for_status(status: StatusCode, message: Option<String>) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::CONFLICT => ApiError::Conflict(message.unwrap_or_default()),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Rejected {
            status: status.as_u16(),
            message: message.unwrap_or_default(),
        },
        _ => ApiError::Server {
            status: status.as_u16(),
        },
    }
}

// The listing endpoint answers either with a bare array or a paginated envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VehicleListBody {
    Page { vehicles: Vec<Vehicle>, total: usize },
    List(Vec<Vehicle>),
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleListing {
    pub vehicles: Vec<Vehicle>,
    pub total: usize,
}

impl From<VehicleListBody> for VehicleListing {
    fn from(body: VehicleListBody) -> Self {
        match body {
            VehicleListBody::Page { vehicles, total } => VehicleListing { vehicles, total },
            VehicleListBody::List(vehicles) => VehicleListing {
                total: vehicles.len(),
                vehicles,
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InquiryPayload<'a> {
    vehicle_id: VehicleId,
    #[serde(flatten)]
    inquiry: &'a InquiryRequest,
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    details: Arc<Mutex<SizedCache<VehicleId, Vehicle>>>,
}

impl BackendClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self::with_client(http, &settings.backend_url, settings.detail_cache_size))
    }

    pub fn with_client(http: Client, base_url: &str, cache_size: usize) -> Self {
        BackendClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            details: Arc::new(Mutex::new(SizedCache::with_size(cache_size.max(1)))),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Where the view should load an image reference from.
    pub fn image_url(&self, reference: Option<&str>) -> String {
        match reference.map(str::trim).filter(|r| !r.is_empty()) {
            None => PLACEHOLDER_IMAGE.to_string(),
            Some(r) if r.starts_with("http") => r.to_string(),
            Some(r) => format!("{}/uploads/vehicles/{}", self.base_url, r.trim_start_matches('/')),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        tracing::warn!(status = %status, message = ?message, "Backend returned an error");
        Err(error_for_status(status, message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }

    /// `page` is `(page, limit)` with 1-based pages; `None` fetches the full catalog.
    pub async fn list_vehicles(&self, page: Option<(usize, usize)>, token: Option<&str>) -> Result<VehicleListing, ApiError> {
        let mut request = self.http.get(self.url("/api/vehicles"));
        if let Some((page, limit)) = page {
            request = request.query(&[("page", page), ("limit", limit)]);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let body: VehicleListBody = self.send_json(request).await?;
        let listing = VehicleListing::from(body);
        tracing::debug!(count = listing.vehicles.len(), total = listing.total, "Fetched vehicle listing");
        Ok(listing)
    }

    pub async fn vehicle(&self, id: VehicleId) -> Result<Vehicle, ApiError> {
        if let Some(vehicle) = self.details.lock().await.cache_get(&id) {
            tracing::debug!(id, "Vehicle detail served from cache");
            return Ok(vehicle.clone());
        }
        let vehicle: Vehicle = self
            .send_json(self.http.get(self.url(&format!("/api/vehicles/{}", id))))
            .await?;
        self.details.lock().await.cache_set(id, vehicle.clone());
        Ok(vehicle)
    }

    /// Fetches several vehicles concurrently, in the order given. Ones that fail are skipped.
    pub async fn vehicles_by_ids(&self, ids: &[VehicleId]) -> Vec<Vehicle> {
        let results = join_all(ids.iter().map(|&id| self.vehicle(id))).await;
        ids.iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(vehicle) => Some(vehicle),
                Err(e) => {
                    tracing::warn!(id, error = %e, "Skipping vehicle that could not be loaded");
                    None
                }
            })
            .collect()
    }

    fn vehicle_form(draft: &VehicleDraft) -> Result<Form, ApiError> {
        let mut form = Form::new()
            .text("brand", draft.brand.clone())
            .text("model", draft.model.clone());
        if let Some(year) = draft.year {
            form = form.text("year", year.to_string());
        }
        if let Some(price) = draft.price {
            form = form.text("price", price.to_string());
        }
        if let Some(mileage) = draft.mileage {
            form = form.text("mileage", mileage.to_string());
        }
        if let Some(description) = draft.description.as_ref().filter(|d| !d.is_empty()) {
            form = form.text("description", description.clone());
        }
        for image in &draft.images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.content_type)
                .map_err(|e| ApiError::InvalidUpload(format!("{}: {}", image.file_name, e)))?;
            form = form.part("images", part);
        }
        Ok(form)
    }

    pub async fn create_vehicle(&self, draft: &VehicleDraft, token: &str) -> Result<Vehicle, ApiError> {
        let form = Self::vehicle_form(draft)?;
        let request = self.http.post(self.url("/api/vehicles")).bearer_auth(token).multipart(form);
        let vehicle: Vehicle = self.send_json(request).await?;
        tracing::info!(id = vehicle.id, brand = %vehicle.brand, "Vehicle created");
        Ok(vehicle)
    }

    pub async fn update_vehicle(&self, id: VehicleId, draft: &VehicleDraft, token: &str) -> Result<Vehicle, ApiError> {
        let form = Self::vehicle_form(draft)?;
        let request = self
            .http
            .put(self.url(&format!("/api/vehicles/{}", id)))
            .bearer_auth(token)
            .multipart(form);
        let result = self.send_json::<Vehicle>(request).await;
        self.details.lock().await.cache_remove(&id);
        let vehicle = result?;
        tracing::info!(id, "Vehicle updated");
        Ok(vehicle)
    }

    pub async fn delete_vehicle(&self, id: VehicleId, token: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .delete(self.url(&format!("/api/vehicles/{}", id)))
            .bearer_auth(token);
        let result = self.send(request).await;
        self.details.lock().await.cache_remove(&id);
        result?;
        tracing::info!(id, "Vehicle deleted");
        Ok(())
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.send_json(self.http.post(self.url("/api/auth/login")).json(request))
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.send_json(self.http.post(self.url("/api/auth/register")).json(request))
            .await
    }

    pub async fn submit_inquiry(&self, vehicle_id: VehicleId, inquiry: &InquiryRequest) -> Result<(), ApiError> {
        let payload = InquiryPayload { vehicle_id, inquiry };
        self.send(self.http.post(self.url("/api/inquiries")).json(&payload))
            .await?;
        tracing::info!(vehicle_id, "Inquiry submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BackendClient {
        BackendClient::with_client(Client::new(), "http://localhost:3000/", 4)
    }

    #[test]
    fn image_urls_resolve_against_upload_dir() {
        let backend = client();
        assert_eq!(backend.image_url(None), PLACEHOLDER_IMAGE);
        assert_eq!(backend.image_url(Some("  ")), PLACEHOLDER_IMAGE);
        assert_eq!(
            backend.image_url(Some("https://cdn.example/a.jpg")),
            "https://cdn.example/a.jpg"
        );
        assert_eq!(
            backend.image_url(Some("m4-front.jpg")),
            "http://localhost:3000/uploads/vehicles/m4-front.jpg"
        );
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        assert!(matches!(error_for_status(StatusCode::UNAUTHORIZED, None), ApiError::Unauthorized));
        assert!(matches!(error_for_status(StatusCode::TOO_MANY_REQUESTS, None), ApiError::RateLimited));
        assert!(matches!(error_for_status(StatusCode::NOT_FOUND, None), ApiError::NotFound));
        match error_for_status(StatusCode::BAD_REQUEST, Some("Email fehlt".into())) {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Email fehlt");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, None),
            ApiError::Server { status: 502 }
        ));
    }

    #[test]
    fn listing_accepts_array_and_envelope() {
        let vehicle = r#"{"id":1,"brand":"BMW","model":"M4","year":2022,"price":89900,
            "mileage":15000,"fuelType":"Benzin","transmission":"Automatik"}"#;

        let list: VehicleListBody = serde_json::from_str(&format!("[{}]", vehicle)).unwrap();
        let listing = VehicleListing::from(list);
        assert_eq!(listing.total, 1);

        let page: VehicleListBody =
            serde_json::from_str(&format!(r#"{{"vehicles":[{}],"total":40}}"#, vehicle)).unwrap();
        let listing = VehicleListing::from(page);
        assert_eq!(listing.vehicles.len(), 1);
        assert_eq!(listing.total, 40);
    }

    #[test]
    fn inquiry_payload_carries_vehicle_id() {
        let inquiry = InquiryRequest {
            name: "Erika".into(),
            email: "erika@kfz.de".into(),
            phone: String::new(),
            message: "Ist das Fahrzeug noch verfuegbar?".into(),
        };
        let payload = serde_json::to_value(InquiryPayload {
            vehicle_id: 2,
            inquiry: &inquiry,
        })
        .unwrap();
        assert_eq!(payload["vehicleId"], 2);
        assert_eq!(payload["name"], "Erika");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(500))
            .build()
            .unwrap();
        // Port 9 (discard) is closed on test machines
        let backend = BackendClient::with_client(http, "http://127.0.0.1:9", 4);
        let err = backend.vehicle(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "{:?}", err);
    }
}
