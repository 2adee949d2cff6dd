// Application settings, layered with the 'config' crate on top of '.env'

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // Base URL of the marketplace backend (vehicles, auth, inquiries)
    pub backend_url: String,
    // Optional JSON catalog used for listings instead of the backend
    pub catalog_file: Option<String>,
    // Where the durable key-value store lives
    pub storage_path: String,
    pub page_size: usize,
    pub search_debounce_ms: u64,
    // Environment color-scheme preference assumed until the browser reports one
    pub prefers_dark: bool,
    pub request_timeout_secs: u64,
    pub detail_cache_size: usize,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:8080")?
            .set_default("backend_url", "http://localhost:3000")?
            .set_default("storage_path", "kfz_storage.json")?
            .set_default("page_size", 12)?
            .set_default("search_debounce_ms", 300)?
            .set_default("prefers_dark", false)?
            .set_default("request_timeout_secs", 15)?
            .set_default("detail_cache_size", 64)?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_BACKEND_URL)
            .add_source(Environment::with_prefix("APP").try_parsing(true));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
impl Settings {
    pub fn for_tests() -> Self {
        Settings {
            server_address: "127.0.0.1:0".into(),
            backend_url: "http://127.0.0.1:9".into(),
            catalog_file: None,
            storage_path: String::new(),
            page_size: 12,
            search_debounce_ms: 300,
            prefers_dark: false,
            request_timeout_secs: 1,
            detail_cache_size: 8,
        }
    }
}
