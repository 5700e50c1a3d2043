use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct ImageDoc { pub id: i32, pub image_url: String, pub public_id: Option<String> }

#[derive(ToSchema)]
pub struct FileErrorDoc { pub filename: String, pub message: String, pub kind: String }

/// JSON body of `PUT /service-histories/{id}`; omitted fields keep their value.
#[derive(ToSchema)]
pub struct UpdateRecordDoc {
    pub customer_id: Option<i32>,
    pub service_id: Option<i32>,
    pub employee_id: Option<i32>,
    /// `YYYY-MM-DD`
    pub service_date: Option<String>,
    pub price: Option<f64>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub delete_images: Vec<i32>,
}

#[derive(ToSchema)]
pub struct ActionMessageDoc { pub success: bool, pub message: String }

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::records::create_record,
        crate::routes::records::get_record,
        crate::routes::records::update_record,
        crate::routes::records::delete_record,
        crate::routes::images::upload_images,
        crate::routes::images::replace_image,
        crate::routes::images::delete_image,
        crate::routes::images::list_images,
    ),
    components(
        schemas(
            HealthResponse,
            ImageDoc,
            FileErrorDoc,
            UpdateRecordDoc,
            ActionMessageDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "records"),
        (name = "images")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_image_endpoints() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/service-histories/{id}/upload-images"));
        assert!(paths.iter().any(|p| p.as_str() == "/service-histories/{id}/images/{image_id}"));
    }
}
