//! File operations routes
//!
//! Upload, list, restore (download), delete, and storage accounting.

use crate::api::AppState;
use crate::db::{activities, files, users};
use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::error::{extract_user_id, sanitize_filename, AppError};

// ============================================================================
// ROUTES
// ============================================================================

pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profile", get(profile))
        .route("/api/user/files", get(list_files))
        .route("/api/upload", post(upload_file))
        .route("/api/restore/:id", get(restore_file))
        .route("/api/delete/:id", delete(delete_file))
        .route("/api/user/storage-usage", get(storage_usage))
}

// ============================================================================
// TYPES
// ============================================================================

/// The one canonical file shape clients see.
#[derive(Serialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub uploaded_at: String,
}

impl From<crate::db::StoredFile> for FileResponse {
    fn from(f: crate::db::StoredFile) -> Self {
        FileResponse {
            id: f.id.to_string(),
            name: f.name,
            size_bytes: f.size_bytes,
            mime_type: f.mime_type,
            uploaded_at: f.uploaded_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
struct ListFilesResponse {
    files: Vec<FileResponse>,
}

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    file: FileResponse,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct ProfileResponse {
    username: String,
    email: String,
}

#[derive(Serialize)]
struct StorageUsageResponse {
    total_storage_used: i64,
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn profile(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let user = users::get_user_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown account".into()))?;

    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email,
    }))
}

async fn list_files(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ListFilesResponse>, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let file_list = files::list_files_for_user(&state.db, user_id).await?;
    let files = file_list.into_iter().map(FileResponse::from).collect();

    Ok(Json(ListFilesResponse { files }))
}

/// Multipart upload, one file per request under the `file` field.
async fn upload_file(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let mut file_name: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            file_name = field.file_name().map(String::from);
            mime_type = field.content_type().map(String::from);
            content = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let content = content.ok_or_else(|| AppError::BadRequest("No file provided.".into()))?;
    let file_name = sanitize_filename(file_name.as_deref().unwrap_or_default())?;
    let mime_type = mime_type.unwrap_or_default();

    // Content is opaque to the server; store it under a fresh object name.
    let stored_name = Uuid::new_v4().simple().to_string();
    state.store.write(&stored_name, &content)?;

    let file = match files::create_file(
        &state.db,
        user_id,
        &file_name,
        &stored_name,
        content.len() as i64,
        &mime_type,
    )
    .await
    {
        Ok(file) => file,
        Err(e) => {
            // Don't leave an orphaned object behind if the metadata insert failed.
            if let Err(cleanup) = state.store.delete(&stored_name) {
                tracing::warn!("could not clean up object {}: {}", stored_name, cleanup);
            }
            return Err(e.into());
        }
    };

    if let Err(e) = activities::log_activity(
        &state.db,
        user_id,
        "upload",
        &format!("Uploaded \"{}\"", file.name),
    )
    .await
    {
        tracing::warn!("could not log activity: {}", e);
    }

    tracing::info!("user {} uploaded {} ({} bytes)", user_id, file.name, file.size_bytes);

    Ok(Json(UploadResponse {
        message: "File uploaded successfully.".into(),
        file: file.into(),
    }))
}

async fn restore_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let file_id =
        Uuid::parse_str(&id).map_err(|_| AppError::BadRequest("Invalid file ID".into()))?;

    let file = files::get_file_for_user(&state.db, file_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let content = state.store.read(&file.stored_name)?;

    // Prefer the MIME type recorded at upload; fall back to the extension.
    let content_type = if file.mime_type.is_empty() {
        mime_guess::from_path(&file.name)
            .first_or_octet_stream()
            .to_string()
    } else {
        file.mime_type.clone()
    };

    let content_disposition = format!("attachment; filename=\"{}\"", file.name);

    // Safely convert to header values, falling back to defaults if invalid
    let content_type_header = header::HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| header::HeaderValue::from_static("application/octet-stream"));
    let content_disposition_header = header::HeaderValue::from_str(&content_disposition)
        .unwrap_or_else(|_| header::HeaderValue::from_static("attachment"));

    if let Err(e) = activities::log_activity(
        &state.db,
        user_id,
        "restore",
        &format!("Restored \"{}\"", file.name),
    )
    .await
    {
        tracing::warn!("could not log activity: {}", e);
    }

    tracing::debug!("serving {} ({} bytes, {})", file.name, content.len(), content_type);

    Ok((
        [
            (header::CONTENT_TYPE, content_type_header),
            (header::CONTENT_DISPOSITION, content_disposition_header),
        ],
        content,
    ))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let file_id =
        Uuid::parse_str(&id).map_err(|_| AppError::BadRequest("Invalid file ID".into()))?;

    let file = files::delete_file_for_user(&state.db, file_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    // Metadata row is gone; a failed disk removal only leaks space.
    if let Err(e) = state.store.delete(&file.stored_name) {
        tracing::warn!("could not delete object {}: {}", file.stored_name, e);
    }

    if let Err(e) = activities::log_activity(
        &state.db,
        user_id,
        "delete",
        &format!("Deleted \"{}\"", file.name),
    )
    .await
    {
        tracing::warn!("could not log activity: {}", e);
    }

    Ok(Json(MessageResponse {
        message: "File deleted successfully.".into(),
    }))
}

async fn storage_usage(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<StorageUsageResponse>, AppError> {
    let user_id = extract_user_id(&state, &headers)?;

    let total = files::storage_used(&state.db, user_id).await?;

    Ok(Json(StorageUsageResponse {
        total_storage_used: total,
    }))
}
