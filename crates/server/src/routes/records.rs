use axum::extract::{Multipart, Path, State};
use axum::Json;
use chrono::NaiveDate;
use models::service_history::{self, NewServiceHistory, ServiceHistoryChanges};
use serde::{Deserialize, Serialize};
use service::{AssetRef, FileError};

use super::form::MultipartForm;
use crate::errors::JsonApiError;
use crate::state::ServerState;

#[derive(Debug, Serialize)]
pub struct CreateRecordOutput {
    pub success: bool,
    pub message: String,
    pub record: service_history::Model,
    pub new_images: Vec<AssetRef>,
    pub failed: Vec<FileError>,
}

#[derive(Debug, Serialize)]
pub struct RecordOutput {
    pub success: bool,
    pub record: service_history::Model,
    pub images: Vec<AssetRef>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateRecordInput {
    #[serde(flatten)]
    pub changes: ServiceHistoryChanges,
    #[serde(default)]
    pub delete_images: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct UpdateRecordOutput {
    pub success: bool,
    pub message: String,
    pub record: service_history::Model,
    pub removed: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct DeleteRecordOutput {
    pub success: bool,
    pub message: String,
    pub images_removed: usize,
}

fn parse_record_form(form: &MultipartForm) -> Result<NewServiceHistory, JsonApiError> {
    let service_date = NaiveDate::parse_from_str(form.required("service_date")?, "%Y-%m-%d")
        .map_err(|_| JsonApiError::bad_request("service_date must be YYYY-MM-DD"))?;
    Ok(NewServiceHistory {
        customer_id: form.parse("customer_id")?,
        service_id: form.parse("service_id")?,
        employee_id: form.parse("employee_id")?,
        service_date,
        price: form.parse("price")?,
        payment_method: form.required("payment_method")?.to_string(),
        notes: form.text("notes").map(str::to_string),
    })
}

#[utoipa::path(
    post, path = "/service-histories", tag = "records",
    responses(
        (status = 200, description = "Record created; per-image outcome included"),
        (status = 400, description = "Missing or invalid field")
    )
)]
pub async fn create_record(
    State(state): State<ServerState>,
    multipart: Multipart,
) -> Result<Json<CreateRecordOutput>, JsonApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = parse_record_form(&form)?;
    let files = form.take_files(&["images", "images[]"]);

    let created = state.records.create(input, files).await?;
    let message = match created.attach.failed.len() {
        0 => "service history added".to_string(),
        n => format!("service history added; {n} image(s) failed"),
    };
    Ok(Json(CreateRecordOutput {
        success: true,
        message,
        record: created.record,
        new_images: created.attach.created,
        failed: created.attach.failed,
    }))
}

#[utoipa::path(
    get, path = "/service-histories/{id}", tag = "records",
    params(("id" = i32, Path, description = "Service history id")),
    responses((status = 200, description = "Record with images"), (status = 404, description = "Unknown service history"))
)]
pub async fn get_record(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<RecordOutput>, JsonApiError> {
    let found = state.records.get(id).await?;
    Ok(Json(RecordOutput { success: true, record: found.record, images: found.images }))
}

#[utoipa::path(
    put, path = "/service-histories/{id}", tag = "records",
    params(("id" = i32, Path, description = "Service history id")),
    request_body = crate::openapi::UpdateRecordDoc,
    responses(
        (status = 200, description = "Record updated"),
        (status = 400, description = "Invalid field"),
        (status = 403, description = "A listed image belongs to another record"),
        (status = 404, description = "Unknown service history")
    )
)]
pub async fn update_record(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(input): Json<UpdateRecordInput>,
) -> Result<Json<UpdateRecordOutput>, JsonApiError> {
    let updated = state.records.update(id, &input.changes, &input.delete_images).await?;
    Ok(Json(UpdateRecordOutput {
        success: true,
        message: "service history updated".into(),
        record: updated.record,
        removed: updated.removed,
    }))
}

#[utoipa::path(
    delete, path = "/service-histories/{id}", tag = "records",
    params(("id" = i32, Path, description = "Service history id")),
    responses((status = 200, description = "Record and images deleted"), (status = 404, description = "Unknown service history"))
)]
pub async fn delete_record(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteRecordOutput>, JsonApiError> {
    let summary = state.records.delete(id).await?;
    Ok(Json(DeleteRecordOutput {
        success: true,
        message: "service history deleted".into(),
        images_removed: summary.images_removed,
    }))
}
