//! HTTP adapters over `SlicerService`.

pub mod health_handlers;
pub mod object_handlers;

use crate::services::slicer_service::SlicerService;
use std::sync::Arc;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: SlicerService,
    /// Owner ids allowed to run gated operations; empty allows everyone.
    pub authorized_owners: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(service: SlicerService, authorized_owners: Vec<String>) -> Self {
        Self {
            service,
            authorized_owners: Arc::new(authorized_owners),
        }
    }

    pub fn is_authorized(&self, owner_id: &str) -> bool {
        self.authorized_owners.is_empty() || self.authorized_owners.iter().any(|id| id == owner_id)
    }
}
