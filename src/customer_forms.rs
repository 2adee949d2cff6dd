//! Review queue for sell-vehicle submissions.
//!
//! Stands in for a backend review endpoint: forms are kept in local storage,
//! newest first, and the admin dashboard moves them through their statuses.
//! Clones share one write lock, so concurrent submissions and status changes
//! never overwrite each other.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::models::{CustomerForm, FormStatus, SellSubmission};
use crate::storage::{KeyValueStore, StorageError, lock, read_json, write_json};
use crate::validation::{FieldErrors, validate_sell_submission};

pub const CUSTOMER_FORMS_KEY: &str = "customerForms";

#[derive(Debug, Error)]
pub enum FormQueueError {
    #[error("submission is incomplete")]
    Invalid(FieldErrors),
    #[error("customer form {0} not found")]
    NotFound(u64),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("CSV export failed: {0}")]
    Export(String),
}

#[derive(Clone)]
pub struct CustomerFormQueue {
    store: Arc<dyn KeyValueStore>,
    // Held across every read-modify-write of the stored list
    writes: Arc<Mutex<()>>,
}

impl CustomerFormQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        CustomerFormQueue {
            store,
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn list(&self) -> Vec<CustomerForm> {
        read_json(self.store.as_ref(), CUSTOMER_FORMS_KEY).unwrap_or_default()
    }

    pub fn get(&self, id: u64) -> Option<CustomerForm> {
        self.list().into_iter().find(|form| form.id == id)
    }

    pub fn submit(&self, submission: SellSubmission, now: DateTime<Utc>) -> Result<CustomerForm, FormQueueError> {
        validate_sell_submission(&submission).map_err(FormQueueError::Invalid)?;

        let _writes = lock(&self.writes);
        let mut forms = self.list();
        // Millisecond timestamps, bumped when two submissions share one
        let mut id = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        if let Some(max) = forms.iter().map(|f| f.id).max() {
            id = id.max(max + 1);
        }

        let form = CustomerForm {
            id,
            date: now,
            status: FormStatus::Neu,
            customer_name: submission.contact_name,
            email: submission.email,
            phone: submission.phone,
            vehicle: submission.vehicle,
            images: submission.images,
        };
        forms.insert(0, form.clone());
        write_json(self.store.as_ref(), CUSTOMER_FORMS_KEY, &forms)?;
        tracing::info!(form_id = form.id, brand = %form.vehicle.brand, "Customer form queued for review");
        Ok(form)
    }

    pub fn update_status(&self, id: u64, status: FormStatus) -> Result<CustomerForm, FormQueueError> {
        let _writes = lock(&self.writes);
        let mut forms = self.list();
        let form = forms
            .iter_mut()
            .find(|form| form.id == id)
            .ok_or(FormQueueError::NotFound(id))?;
        form.status = status;
        let updated = form.clone();
        write_json(self.store.as_ref(), CUSTOMER_FORMS_KEY, &forms)?;
        tracing::info!(form_id = id, status = status.label(), "Customer form status updated");
        Ok(updated)
    }

    pub fn export_csv(&self) -> Result<String, FormQueueError> {
        let export_err = |e: csv::Error| FormQueueError::Export(e.to_string());
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "id",
                "date",
                "status",
                "customerName",
                "email",
                "phone",
                "brand",
                "model",
                "year",
                "mileage",
                "price",
                "fuelType",
                "transmission",
                "power",
                "description",
                "images",
            ])
            .map_err(export_err)?;

        let opt = |value: Option<String>| value.unwrap_or_default();
        for form in self.list() {
            let vehicle = &form.vehicle;
            writer
                .write_record([
                    form.id.to_string(),
                    form.date.to_rfc3339(),
                    form.status.label().to_string(),
                    form.customer_name.clone(),
                    form.email.clone(),
                    form.phone.clone(),
                    vehicle.brand.clone(),
                    vehicle.model.clone(),
                    opt(vehicle.year.map(|y| y.to_string())),
                    opt(vehicle.mileage.map(|m| m.to_string())),
                    opt(vehicle.price.map(|p| p.to_string())),
                    opt(vehicle.fuel_type.map(|f| f.label().to_string())),
                    opt(vehicle.transmission.map(|t| t.label().to_string())),
                    vehicle.power.clone(),
                    vehicle.description.clone(),
                    form.images.join(" "),
                ])
                .map_err(export_err)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| FormQueueError::Export(e.error().to_string()))?;
        String::from_utf8(bytes).map_err(|e| FormQueueError::Export(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormVehicle, FuelType, Transmission};
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn submission(brand: &str) -> SellSubmission {
        SellSubmission {
            vehicle: FormVehicle {
                brand: brand.into(),
                model: "Astra".into(),
                year: Some(2017),
                mileage: Some(110_000),
                price: Some(9_500),
                fuel_type: Some(FuelType::Gasoline),
                transmission: Some(Transmission::Manual),
                power: "92 kW (125 PS)".into(),
                description: "Scheckheftgepflegt".into(),
            },
            images: vec!["astra.jpg".into()],
            contact_name: "Tom".into(),
            email: "tom@kfz.de".into(),
            phone: "0170 1234567".into(),
        }
    }

    fn queue() -> (Arc<dyn KeyValueStore>, CustomerFormQueue) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        (store.clone(), CustomerFormQueue::new(store))
    }

    #[test]
    fn newest_submission_comes_first() {
        let (_, queue) = queue();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let first = queue.submit(submission("Opel"), t0).unwrap();
        let second = queue.submit(submission("Ford"), t0).unwrap();

        assert_ne!(first.id, second.id);
        let forms = queue.list();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].vehicle.brand, "Ford");
        assert_eq!(forms[1].status, FormStatus::Neu);
    }

    #[test]
    fn incomplete_submission_is_rejected() {
        let (store, queue) = queue();
        let mut incomplete = submission("Opel");
        incomplete.images.clear();
        match queue.submit(incomplete, Utc::now()) {
            Err(FormQueueError::Invalid(errors)) => assert!(errors.contains("images")),
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert_eq!(store.get(CUSTOMER_FORMS_KEY), None);
    }

    #[test]
    fn status_updates_are_persisted() {
        let (_, queue) = queue();
        let form = queue.submit(submission("Opel"), Utc::now()).unwrap();
        queue.update_status(form.id, FormStatus::InBearbeitung).unwrap();
        assert_eq!(queue.get(form.id).unwrap().status, FormStatus::InBearbeitung);

        assert!(matches!(
            queue.update_status(form.id + 1, FormStatus::Abgelehnt),
            Err(FormQueueError::NotFound(_))
        ));
    }

    #[test]
    fn concurrent_submissions_are_all_kept() {
        let (_, queue) = queue();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let queue = queue.clone();
                scope.spawn(move || {
                    for _ in 0..25 {
                        queue.submit(submission(&format!("Marke {}", worker)), now).unwrap();
                    }
                });
            }
        });

        let forms = queue.list();
        assert_eq!(forms.len(), 200);
        let ids: std::collections::HashSet<u64> = forms.iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn corrupt_queue_reads_as_empty() {
        let (store, queue) = queue();
        store.set(CUSTOMER_FORMS_KEY, "[{\"id\":").unwrap();
        assert!(queue.list().is_empty());
    }

    #[test]
    fn export_has_header_and_one_row_per_form() {
        let (_, queue) = queue();
        queue.submit(submission("Opel"), Utc::now()).unwrap();
        let csv = queue.export_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,date,status"));
        assert!(lines[1].contains("Opel"));
        assert!(lines[1].contains("Schaltgetriebe"));
    }
}
