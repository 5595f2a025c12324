//! Image uploads for post bodies and cover images.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, FromRef, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use quill_authz::AuthUser;
use quill_db::Database;
use quill_http::AppError;
use quill_kernel::settings::MediaSettings;
use quill_kernel::{InitCtx, Module};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// Directory under the media root that holds uploaded images.
pub const IMAGE_DIR: &str = "blog_images";

const IMAGE_FIELD: &str = "image";

#[derive(Clone, FromRef)]
struct UploadState {
    db: Database,
    media: MediaSettings,
}

#[derive(Debug, Serialize)]
struct Uploaded {
    url: String,
}

pub struct UploadsModule {
    state: UploadState,
}

impl UploadsModule {
    pub fn new(db: Database, media: MediaSettings) -> Self {
        Self {
            state: UploadState { db, media },
        }
    }

    fn image_dir(&self) -> PathBuf {
        self.state.media.root.join(IMAGE_DIR)
    }
}

#[async_trait]
impl Module for UploadsModule {
    fn name(&self) -> &'static str {
        "upload-image"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let dir = self.image_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create upload directory {}", dir.display()))?;

        tracing::info!(
            module = self.name(),
            dir = %dir.display(),
            max_upload_bytes = self.state.media.max_upload_bytes,
            "upload module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(upload_image))
            .layer(DefaultBodyLimit::max(self.state.media.max_upload_bytes))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "description": "Error",
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } } }
        });

        Some(json!({
            "paths": {
                "/": { "post": {
                    "summary": "Upload an image",
                    "tags": ["Uploads"],
                    "security": [{ "tokenAuth": [] }],
                    "requestBody": { "required": true, "content": { "multipart/form-data": { "schema": {
                        "type": "object",
                        "properties": { "image": { "type": "string", "format": "binary" } },
                        "required": ["image"]
                    } } } },
                    "responses": {
                        "201": { "description": "Stored image URL", "content": { "application/json": { "schema": {
                            "type": "object",
                            "properties": { "url": { "type": "string" } },
                            "required": ["url"]
                        } } } },
                        "400": error.clone(),
                        "401": error
                    }
                } }
            }
        }))
    }
}

/// File extension for the accepted image content types.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

async fn upload_image(
    State(media): State<MediaSettings>,
    AuthUser(user): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Uploaded>), AppError> {
    let mut multipart = multipart.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let extension = image_extension(&content_type).ok_or_else(|| {
            AppError::bad_request(format!(
                "Unsupported image type {content_type:?}; expected PNG, JPEG, GIF or WebP."
            ))
        })?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        if bytes.is_empty() {
            return Err(AppError::bad_request("The submitted image is empty."));
        }

        let file_name = format!("{}.{extension}", Uuid::new_v4());
        let dir = media.root.join(IMAGE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        tokio::fs::write(dir.join(&file_name), &bytes)
            .await
            .with_context(|| format!("failed to store {file_name}"))?;

        let url = format!(
            "{}/{IMAGE_DIR}/{file_name}",
            media.url_prefix.trim_end_matches('/')
        );
        tracing::info!(user_id = user.id, %url, bytes = bytes.len(), "image uploaded");

        return Ok((StatusCode::CREATED, Json(Uploaded { url })));
    }

    Err(AppError::bad_request("No image file provided."))
}

pub fn create_module(db: Database, media: MediaSettings) -> Arc<dyn Module> {
    Arc::new(UploadsModule::new(db, media))
}
