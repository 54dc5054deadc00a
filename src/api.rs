use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use url::Url;

use crate::error::{IntakeError, IntakeResult, Operation};
use crate::models::{
    Category, FinalizeFieldsRequest, FinalizeFieldsResponse, FinalizeTarget, SelectedFile,
    UploadResponse,
};

pub const CATEGORIES_PATH: &str = "/v1/categories";
pub const UPLOAD_PATH: &str = "/v1/documents/upload";

/// The category-listing, upload-and-extract, and field-finalization services.
#[async_trait]
pub trait IntakeApi: Send + Sync + 'static {
    async fn list_categories(&self) -> IntakeResult<Vec<Category>>;

    async fn upload_document(&self, file: &SelectedFile) -> IntakeResult<UploadResponse>;

    async fn finalize_fields(
        &self,
        target: &FinalizeTarget,
        request: &FinalizeFieldsRequest,
    ) -> IntakeResult<FinalizeFieldsResponse>;
}

/// [`IntakeApi`] over HTTP. Requests are issued once, with no timeout and no retry.
pub struct HttpIntakeApi {
    client: Client,
    base_url: String,
}

impl HttpIntakeApi {
    pub fn new(base_url: &Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("intake-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl IntakeApi for HttpIntakeApi {
    async fn list_categories(&self) -> IntakeResult<Vec<Category>> {
        let operation = Operation::ListCategories;
        let response = self
            .client
            .get(self.url(CATEGORIES_PATH))
            .send()
            .await
            .map_err(|err| IntakeError::network(operation, err))?;
        let response = ensure_success(operation, response).await?;

        response
            .json::<Vec<Category>>()
            .await
            .map_err(|err| IntakeError::decode(operation, err))
    }

    async fn upload_document(&self, file: &SelectedFile) -> IntakeResult<UploadResponse> {
        let operation = Operation::Upload;
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|err| IntakeError::network(operation, err))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|err| IntakeError::network(operation, err))?;
        let response = ensure_success(operation, response).await?;

        let value = response
            .json::<Value>()
            .await
            .map_err(|err| IntakeError::decode(operation, err))?;
        UploadResponse::from_value(value).map_err(|err| IntakeError::decode(operation, err))
    }

    async fn finalize_fields(
        &self,
        target: &FinalizeTarget,
        request: &FinalizeFieldsRequest,
    ) -> IntakeResult<FinalizeFieldsResponse> {
        let operation = Operation::FinalizeFields;
        let path = format!("/v1/documents/{}/fields", target.path_segment());
        let response = self
            .client
            .post(self.url(&path))
            .json(request)
            .send()
            .await
            .map_err(|err| IntakeError::network(operation, err))?;
        let response = ensure_success(operation, response).await?;

        let body = response
            .text()
            .await
            .map_err(|err| IntakeError::network(operation, err))?;
        if body.trim().is_empty() {
            return Ok(FinalizeFieldsResponse::default());
        }
        let value: Value =
            serde_json::from_str(&body).map_err(|err| IntakeError::decode(operation, err))?;
        Ok(FinalizeFieldsResponse::from_value(&value))
    }
}

/// Turns a non-2xx response into a transport error carrying the body text.
async fn ensure_success(operation: Operation, response: Response) -> IntakeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%operation, %status, %body, "intake request rejected");
    Err(IntakeError::status(operation, status, body))
}
