//! Field-level validation for every form that can be submitted.
//!
//! Validation runs before any request leaves for the backend; a failed check
//! blocks the submission and reports a message per field.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{ImageUpload, InquiryRequest, LoginRequest, RegisterRequest, SellSubmission, VehicleDraft};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_MESSAGE_LEN: usize = 10;
pub const MAX_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const YEAR_RANGE: std::ops::RangeInclusive<i64> = 1900..=2030;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Keeps the first message reported for a field.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "Email ist erforderlich");
    } else if !is_valid_email(email) {
        errors.add("email", "Ungueltiges Email-Format");
    }
}

pub fn validate_login(request: &LoginRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_email(&mut errors, &request.email);
    if request.password.is_empty() {
        errors.add("password", "Passwort ist erforderlich");
    }
    errors.into_result()
}

pub fn validate_registration(request: &RegisterRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if request.name.trim().is_empty() {
        errors.add("name", "Name ist erforderlich");
    }
    check_email(&mut errors, &request.email);
    if request.password.is_empty() {
        errors.add("password", "Passwort ist erforderlich");
    } else if request.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Passwort muss mindestens 8 Zeichen lang sein");
    }
    if request.confirm_password.is_empty() {
        errors.add("confirmPassword", "Passwort-Bestaetigung ist erforderlich");
    } else if request.password != request.confirm_password {
        errors.add("confirmPassword", "Passwoerter stimmen nicht ueberein");
    }
    errors.into_result()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

/// Score from 0 to 100, shown as a meter while the password is typed.
pub fn password_score(password: &str) -> u8 {
    if password.is_empty() {
        return 0;
    }
    let len = password.chars().count();
    let mut score: u32 = 0;
    if len >= 8 {
        score += 25;
    }
    if len >= 12 {
        score += 15;
    }
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        score += 15;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        score += 15;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 15;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        score += 15;
    }
    score.min(100) as u8
}

pub fn password_strength(score: u8) -> PasswordStrength {
    match score {
        0..=29 => PasswordStrength::Weak,
        30..=59 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    }
}

pub fn validate_inquiry(request: &InquiryRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if request.name.trim().is_empty() {
        errors.add("name", "Name ist erforderlich");
    }
    check_email(&mut errors, &request.email);
    let message = request.message.trim();
    if message.is_empty() {
        errors.add("message", "Nachricht ist erforderlich");
    } else if message.chars().count() < MIN_MESSAGE_LEN {
        errors.add("message", "Nachricht muss mindestens 10 Zeichen lang sein");
    }
    errors.into_result()
}

pub fn validate_image(image: &ImageUpload) -> Result<(), String> {
    if !image.content_type.starts_with("image/") {
        return Err(format!("{} ist kein Bild", image.file_name));
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(format!("{} ist groesser als 5MB", image.file_name));
    }
    Ok(())
}

/// The admin vehicle form. Year, price and mileage are optional but must be sane when given.
pub fn validate_vehicle_form(draft: &VehicleDraft) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if draft.brand.trim().is_empty() {
        errors.add("brand", "Marke ist erforderlich");
    }
    if draft.model.trim().is_empty() {
        errors.add("model", "Modell ist erforderlich");
    }
    if draft.year.is_some_and(|year| !YEAR_RANGE.contains(&year)) {
        errors.add("year", "Ungueltiges Jahr");
    }
    if draft.price.is_some_and(|price| price < 0) {
        errors.add("price", "Ungueltiger Preis");
    }
    if draft.mileage.is_some_and(|mileage| mileage < 0) {
        errors.add("mileage", "Ungueltiger Kilometerstand");
    }
    if draft.images.len() > MAX_IMAGES {
        errors.add("images", "Maximal 10 Bilder erlaubt");
    }
    for image in &draft.images {
        if let Err(message) = validate_image(image) {
            errors.add("images", message);
        }
    }
    errors.into_result()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellStep {
    VehicleData,
    Images,
    Contact,
}

impl SellStep {
    pub const ALL: [SellStep; 3] = [SellStep::VehicleData, SellStep::Images, SellStep::Contact];

    /// Steps are numbered from 1 in the wizard.
    pub fn from_number(step: u8) -> Option<Self> {
        match step {
            1 => Some(SellStep::VehicleData),
            2 => Some(SellStep::Images),
            3 => Some(SellStep::Contact),
            _ => None,
        }
    }
}

pub fn validate_sell_step(submission: &SellSubmission, step: SellStep) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    match step {
        SellStep::VehicleData => {
            let vehicle = &submission.vehicle;
            if vehicle.brand.trim().is_empty() {
                errors.add("brand", "Marke ist erforderlich");
            }
            if vehicle.model.trim().is_empty() {
                errors.add("model", "Modell ist erforderlich");
            }
            match vehicle.year {
                None => errors.add("year", "Baujahr ist erforderlich"),
                Some(year) if !YEAR_RANGE.contains(&i64::from(year)) => errors.add("year", "Ungueltiges Jahr"),
                Some(_) => {}
            }
            if vehicle.mileage.is_none() {
                errors.add("mileage", "Kilometerstand ist erforderlich");
            }
            if vehicle.fuel_type.is_none() {
                errors.add("fuelType", "Kraftstoff ist erforderlich");
            }
            if vehicle.transmission.is_none() {
                errors.add("transmission", "Getriebe ist erforderlich");
            }
        }
        SellStep::Images => {
            if submission.images.is_empty() {
                errors.add("images", "Mindestens ein Bild ist erforderlich");
            } else if submission.images.len() > MAX_IMAGES {
                errors.add("images", "Maximal 10 Bilder erlaubt");
            }
        }
        SellStep::Contact => {
            if submission.contact_name.trim().is_empty() {
                errors.add("contactName", "Name ist erforderlich");
            }
            check_email(&mut errors, &submission.email);
            if submission.phone.trim().is_empty() {
                errors.add("phone", "Telefon ist erforderlich");
            }
        }
    }
    errors.into_result()
}

pub fn validate_sell_submission(submission: &SellSubmission) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    for step in SellStep::ALL {
        if let Err(step_errors) = validate_sell_step(submission, step) {
            errors.merge(step_errors);
        }
    }
    errors.into_result()
}
