//! HTTP handlers for the chunked object operations.
//! Each handler checks the requester, delegates to `SlicerService` and turns
//! the outcome into a single terminal JSON status.

use crate::{
    errors::AppError,
    handlers::AppState,
    models::object_record::ObjectRecord,
    services::{
        deletion::{Decision, DeletionOutcome, PresetDecision},
        listing::{ListingEntry, Page},
        progress::LogProgress,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Header carrying the requester's owner id.
pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Debug, Deserialize)]
pub struct UploadReq {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub confirm: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub object: ObjectRecord,
    pub bytes: u64,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub status: &'static str,
    pub message: String,
    pub container_id: String,
    pub output: PathBuf,
    pub parts: u32,
    pub bytes: u64,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    pub message: String,
    pub object: ObjectRecord,
}

/// Extract the requester from `x-owner-id` and check it against the allow-list.
fn requester(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let owner_id = headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                format!("missing `{}` header", OWNER_HEADER),
            )
        })?;
    if !state.is_authorized(owner_id) {
        warn!(owner_id, "rejected unauthorized requester");
        return Err(AppError::forbidden("You are not authorized to run this command."));
    }
    Ok(owner_id.to_string())
}

/// POST `/objects` - split and upload a local file.
pub async fn upload_object(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadReq>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let owner_id = requester(&state, &headers)?;
    let report = state
        .service
        .upload(&owner_id, &req.path, &LogProgress)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            status: "uploaded",
            message: report.describe(),
            bytes: report.bytes,
            elapsed_ms: report.elapsed.as_millis(),
            object: report.record,
        }),
    ))
}

/// GET `/objects?page=N` - one page of stored objects. Not gated.
pub async fn list_objects(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Page<ListingEntry>>, AppError> {
    let page = state.service.list_page(q.page.unwrap_or(1)).await?;
    Ok(Json(page))
}

/// POST `/objects/{token}/download` - fetch and reassemble an object.
pub async fn download_object(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DownloadResponse>, AppError> {
    let owner_id = requester(&state, &headers)?;
    let report = state
        .service
        .download(&owner_id, &token, &LogProgress)
        .await?;
    Ok(Json(DownloadResponse {
        status: "downloaded",
        message: report.describe(),
        parts: report.parts,
        bytes: report.bytes,
        elapsed_ms: report.elapsed.as_millis(),
        container_id: report.container_id,
        output: report.output,
    }))
}

/// DELETE `/objects/{token}?confirm=true|false` - two-phase delete.
///
/// Without `confirm` the object is only reported back for confirmation.
pub async fn delete_object(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(q): Query<DeleteQuery>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>, AppError> {
    requester(&state, &headers)?;
    let decision = if q.confirm == Some(true) {
        Decision::Confirm
    } else {
        Decision::Cancel
    };
    let outcome = state
        .service
        .delete(&token, &PresetDecision(decision))
        .await?;

    let message = outcome.describe();
    let (status, message, object) = match outcome {
        DeletionOutcome::Deleted { record, .. } => ("deleted", message, record),
        DeletionOutcome::Cancelled { record } if q.confirm.is_none() => (
            "pending_confirmation",
            format!(
                "Are you sure you want to delete {}? Repeat with confirm=true.",
                record.file_name()
            ),
            record,
        ),
        DeletionOutcome::Cancelled { record } => ("cancelled", message, record),
    };
    let response = DeleteResponse {
        status,
        message,
        object,
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::slicer_service::tests::{test_service, write_source};
    use axum::http::HeaderValue;

    fn owner(id: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_static(id));
        headers
    }

    #[tokio::test]
    async fn allow_list_gates_operations_but_not_listing() {
        let (service, tmp) = test_service(8).await;
        let source = write_source(tmp.path(), "secret.txt", 12).await;
        let state = AppState::new(service, vec!["42".into()]);

        let err = upload_object(
            State(state.clone()),
            owner("7"),
            Json(UploadReq {
                path: source.clone(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = upload_object(
            State(state.clone()),
            HeaderMap::new(),
            Json(UploadReq {
                path: source.clone(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let Json(page) = list_objects(State(state), Query(ListQuery { page: None }))
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn delete_requires_explicit_confirmation() {
        let (service, tmp) = test_service(8).await;
        let source = write_source(tmp.path(), "draft.txt", 12).await;
        let state = AppState::new(service, Vec::new());

        let (status, Json(uploaded)) = upload_object(
            State(state.clone()),
            owner("1"),
            Json(UploadReq { path: source }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(uploaded.object.part_count, Some(2));

        let token = uploaded.object.object_id.to_string();
        let Json(pending) = delete_object(
            State(state.clone()),
            Path(token.clone()),
            Query(DeleteQuery { confirm: None }),
            owner("1"),
        )
        .await
        .unwrap();
        assert_eq!(pending.status, "pending_confirmation");

        let Json(declined) = delete_object(
            State(state.clone()),
            Path(token.clone()),
            Query(DeleteQuery {
                confirm: Some(false),
            }),
            owner("1"),
        )
        .await
        .unwrap();
        assert_eq!(declined.status, "cancelled");

        let Json(deleted) = delete_object(
            State(state.clone()),
            Path(token.clone()),
            Query(DeleteQuery {
                confirm: Some(true),
            }),
            owner("1"),
        )
        .await
        .unwrap();
        assert_eq!(deleted.status, "deleted");
        assert!(deleted.message.starts_with("Successfully deleted draft.txt in "));

        let err = download_object(State(state), Path(token), owner("1"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
