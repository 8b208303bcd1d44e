//! Defines routes for the chunked object operations.
//!
//! ## Structure
//! - **Health endpoints**
//!   - `GET    /healthz` - liveness
//!   - `GET    /readyz` - metadata store + staging disk readiness
//!
//! - **Object endpoints**
//!   - `POST   /objects` - upload a local file (`{"path": ...}`)
//!   - `GET    /objects?page=N` - list stored objects, 8 per page
//!   - `POST   /objects/{token}/download` - download by id, filename or container name
//!   - `DELETE /objects/{token}?confirm=true` - delete after confirmation

use crate::handlers::{
    AppState,
    health_handlers::{healthz, readyz},
    object_handlers::{delete_object, download_object, list_objects, upload_object},
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router carrying `AppState` to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/objects", post(upload_object).get(list_objects))
        .route("/objects/{token}/download", post(download_object))
        .route("/objects/{token}", delete(delete_object))
}
