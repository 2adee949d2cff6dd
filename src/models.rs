// Data structures shared by the client state, the backend client and the API

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type VehicleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FuelType {
    Gasoline,
    Diesel,
    Electric,
    Hybrid,
    PluginHybrid,
    Gas,
}

impl FuelType {
    pub const ALL: [FuelType; 6] = [
        FuelType::Gasoline,
        FuelType::Diesel,
        FuelType::Electric,
        FuelType::Hybrid,
        FuelType::PluginHybrid,
        FuelType::Gas,
    ];

    /// Label used on the wire and in the listing filters.
    pub fn label(self) -> &'static str {
        match self {
            FuelType::Gasoline => "Benzin",
            FuelType::Diesel => "Diesel",
            FuelType::Electric => "Elektro",
            FuelType::Hybrid => "Hybrid",
            FuelType::PluginHybrid => "Plug-in-Hybrid",
            FuelType::Gas => "Gas",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FuelType {
    type Err = String;

    // Case-insensitive; English names are accepted alongside the wire labels
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "benzin" | "gasoline" | "petrol" => Ok(FuelType::Gasoline),
            "diesel" => Ok(FuelType::Diesel),
            "elektro" | "electric" => Ok(FuelType::Electric),
            "hybrid" => Ok(FuelType::Hybrid),
            "plug-in-hybrid" | "plugin-hybrid" | "plugin_hybrid" => Ok(FuelType::PluginHybrid),
            "gas" | "lpg" | "cng" => Ok(FuelType::Gas),
            other => Err(format!("unknown fuel type '{}'", other)),
        }
    }
}

impl TryFrom<String> for FuelType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FuelType> for String {
    fn from(value: FuelType) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Transmission {
    Automatic,
    Manual,
}

impl Transmission {
    pub fn label(self) -> &'static str {
        match self {
            Transmission::Automatic => "Automatik",
            Transmission::Manual => "Schaltgetriebe",
        }
    }
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Transmission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            // Dual-clutch gearboxes are listed by their brand names
            "automatik" | "automatic" | "pdk" | "dsg" => Ok(Transmission::Automatic),
            "schaltgetriebe" | "manuell" | "manual" => Ok(Transmission::Manual),
            other => Err(format!("unknown transmission '{}'", other)),
        }
    }
}

impl TryFrom<String> for Transmission {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Transmission> for String {
    fn from(value: Transmission) -> Self {
        value.label().to_string()
    }
}

// A vehicle listing as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub brand: String,
    pub model: String,
    pub year: u32,
    pub price: u64,
    pub mileage: u64,
    pub fuel_type: FuelType,
    #[serde(default)]
    pub power: String,
    pub transmission: Transmission,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

// Authenticated user record as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub confirm_password: String,
}

// Purchase inquiry for a single vehicle
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub message: String,
}

// An image picked for upload, already read into memory
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

// Fields of the admin vehicle form, sent as multipart to the backend
#[derive(Debug, Clone, Default)]
pub struct VehicleDraft {
    pub brand: String,
    pub model: String,
    pub year: Option<i64>,
    pub price: Option<i64>,
    pub mileage: Option<i64>,
    pub description: Option<String>,
    pub images: Vec<ImageUpload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Neu,
    InBearbeitung,
    Abgeschlossen,
    Abgelehnt,
}

impl FormStatus {
    pub fn label(self) -> &'static str {
        match self {
            FormStatus::Neu => "Neu",
            FormStatus::InBearbeitung => "In Bearbeitung",
            FormStatus::Abgeschlossen => "Abgeschlossen",
            FormStatus::Abgelehnt => "Abgelehnt",
        }
    }
}

// Vehicle details entered in the sell wizard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormVehicle {
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    pub year: Option<u32>,
    pub mileage: Option<u64>,
    pub price: Option<u64>,
    pub fuel_type: Option<FuelType>,
    pub transmission: Option<Transmission>,
    #[serde(default)]
    pub power: String,
    #[serde(default)]
    pub description: String,
}

// Everything the sell wizard collects before submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellSubmission {
    #[serde(flatten)]
    pub vehicle: FormVehicle,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

// A submitted sell form waiting in the admin review queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerForm {
    pub id: u64,
    pub date: chrono::DateTime<chrono::Utc>,
    pub status: FormStatus,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub vehicle: FormVehicle,
    #[serde(default)]
    pub images: Vec<String>,
}
