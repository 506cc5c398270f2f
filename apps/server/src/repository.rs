//! In-memory collections mirrored to the key/value store.
//!
//! Every mutation serializes the would-be collection and writes it first;
//! memory is only updated once the write succeeded, so a failed write
//! leaves both sides as they were.

use serde::{de::DeserializeOwned, Serialize};

use crate::db::{keys, KvStore, StoreError};
use crate::models::{default_catalog, Appointment, GalleryItem, Price, Service};
use crate::pricing;

pub trait Record: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &str;
}

impl Record for Appointment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for GalleryItem {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Service {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("horário já ocupado")]
    SlotTaken,
}

#[derive(Debug, Clone, Copy)]
enum Position {
    Front,
    Back,
}

/// One list stored under one fixed key.
#[derive(Debug)]
pub struct Collection<T> {
    key: &'static str,
    items: Vec<T>,
}

impl<T: Record> Collection<T> {
    async fn load(
        store: &KvStore,
        key: &'static str,
        default: impl FnOnce() -> Vec<T>,
    ) -> Result<Self, StoreError> {
        let items = store.load::<Vec<T>>(key).await?.unwrap_or_else(default);
        tracing::info!(key, count = items.len(), "Loaded collection");
        Ok(Self { key, items })
    }

    pub fn list(&self) -> &[T] {
        &self.items
    }

    async fn commit(&mut self, store: &KvStore, next: Vec<T>) -> Result<(), StoreError> {
        if let Err(e) = store.save(self.key, &next).await {
            tracing::error!(key = self.key, error = %e, "Write-through failed");
            return Err(e);
        }
        self.items = next;
        Ok(())
    }

    async fn add(&mut self, store: &KvStore, item: T, at: Position) -> Result<(), StoreError> {
        let mut next = Vec::with_capacity(self.items.len() + 1);
        match at {
            Position::Front => {
                next.push(item);
                next.extend(self.items.iter().cloned());
            }
            Position::Back => {
                next.extend(self.items.iter().cloned());
                next.push(item);
            }
        }
        self.commit(store, next).await
    }

    /// Apply `change` to the record with `id`. `None` when absent.
    async fn update(
        &mut self,
        store: &KvStore,
        id: &str,
        change: impl FnOnce(&mut T),
    ) -> Result<Option<T>, StoreError> {
        let Some(index) = self.items.iter().position(|item| item.id() == id) else {
            return Ok(None);
        };
        let mut next = self.items.clone();
        change(&mut next[index]);
        let updated = next[index].clone();
        self.commit(store, next).await?;
        Ok(Some(updated))
    }

    /// Remove the record with `id`. `None` when absent.
    async fn remove(&mut self, store: &KvStore, id: &str) -> Result<Option<T>, StoreError> {
        let Some(index) = self.items.iter().position(|item| item.id() == id) else {
            return Ok(None);
        };
        let mut next = self.items.clone();
        let removed = next.remove(index);
        self.commit(store, next).await?;
        Ok(Some(removed))
    }
}

/// Single owner of the shop's data.
#[derive(Debug)]
pub struct Repository {
    store: KvStore,
    appointments: Collection<Appointment>,
    gallery: Collection<GalleryItem>,
    services: Collection<Service>,
}

impl Repository {
    /// Read every collection once; absent keys fall back to empty lists and
    /// the built-in catalog.
    pub async fn load(store: KvStore) -> Result<Self, StoreError> {
        let appointments = Collection::load(&store, keys::APPOINTMENTS, Vec::new).await?;
        let gallery = Collection::load(&store, keys::GALLERY, Vec::new).await?;
        let services = Collection::load(&store, keys::SERVICES, default_catalog).await?;
        Ok(Self {
            store,
            appointments,
            gallery,
            services,
        })
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn appointments(&self) -> &[Appointment] {
        self.appointments.list()
    }

    pub fn gallery(&self) -> &[GalleryItem] {
        self.gallery.list()
    }

    pub fn services(&self) -> &[Service] {
        self.services.list()
    }

    // ── Appointments ──

    /// Append a new booking, refusing a slot that is already taken.
    pub async fn add_appointment(&mut self, appointment: Appointment) -> Result<(), RepositoryError> {
        if pricing::is_slot_occupied(self.appointments.list(), appointment.date, &appointment.time) {
            return Err(RepositoryError::SlotTaken);
        }
        let id = appointment.id.clone();
        self.appointments
            .add(&self.store, appointment, Position::Back)
            .await?;
        tracing::info!(appointment_id = %id, "Appointment booked");
        Ok(())
    }

    /// Flip `completed`. Returns the new value, `None` if the id is unknown.
    pub async fn toggle_completed(&mut self, id: &str) -> Result<Option<bool>, StoreError> {
        let updated = self
            .appointments
            .update(&self.store, id, |app| app.completed = !app.completed)
            .await?;
        if let Some(app) = &updated {
            tracing::info!(appointment_id = %id, completed = app.completed, "Appointment toggled");
        }
        Ok(updated.map(|app| app.completed))
    }

    pub async fn remove_appointment(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self.appointments.remove(&self.store, id).await?;
        if removed.is_some() {
            tracing::info!(appointment_id = %id, "Appointment deleted");
        }
        Ok(removed.is_some())
    }

    // ── Catalog ──

    pub async fn update_service(
        &mut self,
        id: &str,
        price: Price,
        description: &str,
    ) -> Result<Option<Service>, StoreError> {
        let updated = self
            .services
            .update(&self.store, id, |service| {
                service.price = price;
                service.description = description.to_string();
            })
            .await?;
        if updated.is_some() {
            tracing::info!(service_id = %id, %price, "Service updated");
        }
        Ok(updated)
    }

    // ── Gallery ──

    /// Newest photos come first.
    pub async fn add_gallery_item(&mut self, item: GalleryItem) -> Result<(), StoreError> {
        let id = item.id.clone();
        self.gallery.add(&self.store, item, Position::Front).await?;
        tracing::info!(gallery_id = %id, "Gallery item added");
        Ok(())
    }

    pub async fn remove_gallery_item(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = self.gallery.remove(&self.store, id).await?;
        if removed.is_some() {
            tracing::info!(gallery_id = %id, "Gallery item removed");
        }
        Ok(removed.is_some())
    }

    // ── Remembered customer ──

    pub async fn customer_phone(&self) -> Result<Option<String>, StoreError> {
        self.store.get_raw(keys::CUSTOMER_PHONE).await
    }

    pub async fn set_customer_phone(&self, phone: &str) -> Result<(), StoreError> {
        self.store.set_raw(keys::CUSTOMER_PHONE, phone).await
    }

    pub async fn clear_customer_phone(&self) -> Result<(), StoreError> {
        self.store.remove(keys::CUSTOMER_PHONE).await
    }
}
