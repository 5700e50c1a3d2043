use axum::extract::{Multipart, Path, State};
use axum::Json;
use common::types::ActionMessage;
use serde::Serialize;
use service::{AssetRef, FileError};
use tracing::info;

use super::form::MultipartForm;
use crate::errors::JsonApiError;
use crate::state::ServerState;

#[derive(Debug, Serialize)]
pub struct UploadImagesOutput {
    pub success: bool,
    pub message: String,
    pub new_images: Vec<AssetRef>,
    pub failed: Vec<FileError>,
}

#[derive(Debug, Serialize)]
pub struct ReplaceImageOutput {
    pub success: bool,
    pub message: String,
    pub new_image_url: String,
}

#[derive(Debug, Serialize)]
pub struct ListImagesOutput {
    pub success: bool,
    pub images: Vec<AssetRef>,
}

fn summarize(failed: &[FileError]) -> String {
    failed.iter().map(|f| format!("{}: {}", f.filename, f.message)).collect::<Vec<_>>().join("; ")
}

#[utoipa::path(
    post, path = "/service-histories/{id}/upload-images", tag = "images",
    params(("id" = i32, Path, description = "Service history id")),
    responses(
        (status = 200, description = "At least one image attached"),
        (status = 400, description = "No file, or every file rejected"),
        (status = 404, description = "Unknown service history"),
        (status = 500, description = "Every file failed in storage")
    )
)]
pub async fn upload_images(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<UploadImagesOutput>, JsonApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let files = form.take_files(&["images", "images[]"]);
    if files.is_empty() {
        return Err(JsonApiError::bad_request("no files selected"));
    }

    let result = state.images.attach(id, files).await?;
    if result.all_rejected() {
        return Err(JsonApiError::bad_request(summarize(&result.failed)));
    }
    if result.all_failed_in_backend() {
        return Err(JsonApiError::internal(summarize(&result.failed)));
    }

    info!(record_id = id, created = result.created.len(), failed = result.failed.len(), "upload_images");
    let message = if result.failed.is_empty() {
        format!("uploaded {} image(s)", result.created.len())
    } else {
        format!("uploaded {} image(s), {} failed", result.created.len(), result.failed.len())
    };
    Ok(Json(UploadImagesOutput { success: true, message, new_images: result.created, failed: result.failed }))
}

#[utoipa::path(
    post, path = "/service-histories/{id}/replace-image/{image_id}", tag = "images",
    params(
        ("id" = i32, Path, description = "Service history id"),
        ("image_id" = i32, Path, description = "Image id")
    ),
    responses(
        (status = 200, description = "Image replaced"),
        (status = 400, description = "Missing or invalid file"),
        (status = 403, description = "Image belongs to another record"),
        (status = 404, description = "Unknown record or image"),
        (status = 500, description = "Storage or database failure")
    )
)]
pub async fn replace_image(
    State(state): State<ServerState>,
    Path((id, image_id)): Path<(i32, i32)>,
    multipart: Multipart,
) -> Result<Json<ReplaceImageOutput>, JsonApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form
        .take_files(&["new_image"])
        .into_iter()
        .next()
        .ok_or_else(|| JsonApiError::bad_request("no file selected"))?;

    let asset = state.images.replace(id, image_id, file).await?;
    Ok(Json(ReplaceImageOutput {
        success: true,
        message: "image replaced".into(),
        new_image_url: asset.image_url,
    }))
}

#[utoipa::path(
    delete, path = "/service-histories/{id}/images/{image_id}", tag = "images",
    params(
        ("id" = i32, Path, description = "Service history id"),
        ("image_id" = i32, Path, description = "Image id")
    ),
    responses(
        (status = 200, description = "Image deleted"),
        (status = 403, description = "Image belongs to another record"),
        (status = 404, description = "Unknown record or image")
    )
)]
pub async fn delete_image(
    State(state): State<ServerState>,
    Path((id, image_id)): Path<(i32, i32)>,
) -> Result<Json<ActionMessage>, JsonApiError> {
    state.images.delete(id, image_id).await?;
    Ok(Json(ActionMessage::ok("image deleted")))
}

#[utoipa::path(
    get, path = "/service-histories/{id}/images", tag = "images",
    params(("id" = i32, Path, description = "Service history id")),
    responses((status = 200, description = "Images in upload order"), (status = 404, description = "Unknown service history"))
)]
pub async fn list_images(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<ListImagesOutput>, JsonApiError> {
    let images = state.images.list(id).await?;
    Ok(Json(ListImagesOutput { success: true, images }))
}
