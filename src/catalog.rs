// Where listing data comes from: the live backend, or a JSON file for demos and offline use

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

use crate::backend::{ApiError, BackendClient};
use crate::config::Settings;
use crate::models::{Vehicle, VehicleId};

#[derive(Clone)]
pub enum Catalog {
    Remote(BackendClient),
    Static(Arc<Vec<Vehicle>>),
}

impl Catalog {
    pub fn from_settings(settings: &Settings, backend: &BackendClient) -> anyhow::Result<Self> {
        match settings.catalog_file.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => {
                let vehicles = load_file(path)?;
                tracing::info!(path, count = vehicles.len(), "Serving listings from static catalog");
                Ok(Catalog::Static(Arc::new(vehicles)))
            }
            None => {
                tracing::info!(backend = backend.base_url(), "Serving listings from backend");
                Ok(Catalog::Remote(backend.clone()))
            }
        }
    }

    /// The full catalog, which the query engine filters and pages locally.
    pub async fn vehicles(&self) -> Result<Arc<Vec<Vehicle>>, ApiError> {
        match self {
            Catalog::Remote(backend) => {
                let listing = backend.list_vehicles(None, None).await?;
                Ok(Arc::new(listing.vehicles))
            }
            Catalog::Static(vehicles) => Ok(vehicles.clone()),
        }
    }

    pub async fn vehicle(&self, id: VehicleId) -> Result<Vehicle, ApiError> {
        match self {
            Catalog::Remote(backend) => backend.vehicle(id).await,
            Catalog::Static(vehicles) => vehicles
                .iter()
                .find(|v| v.id == id)
                .cloned()
                .ok_or(ApiError::NotFound),
        }
    }

    /// Vehicles for `ids` in the given order; unknown ids are skipped.
    pub async fn resolve(&self, ids: &[VehicleId]) -> Vec<Vehicle> {
        match self {
            Catalog::Remote(backend) => backend.vehicles_by_ids(ids).await,
            Catalog::Static(vehicles) => ids
                .iter()
                .filter_map(|id| vehicles.iter().find(|v| v.id == *id).cloned())
                .collect(),
        }
    }
}

pub fn load_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<Vehicle>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse catalog file {}", path.display()))
}
