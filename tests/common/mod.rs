#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use intake_client::config::IntakeConfig;
use intake_client::models::{
    Category, FinalizeFieldsRequest, FinalizeFieldsResponse, FinalizeTarget, SelectedFile,
    UploadResponse, PDF_MEDIA_TYPE,
};
use intake_client::{HttpIntakeApi, IntakeApi, IntakeError, IntakeResult, Operation, UploadWorkflow};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use url::Url;

pub fn test_config(api_url: Url) -> IntakeConfig {
    IntakeConfig {
        api_url,
        max_upload_bytes: 1024 * 1024,
        progress_step: 10,
        progress_tick_ms: 5,
        progress_ceiling: 90,
    }
}

pub fn pdf_file(name: &str, bytes: &[u8]) -> SelectedFile {
    SelectedFile::new(name, PDF_MEDIA_TYPE, bytes.to_vec())
}

pub fn category(id: i64, name: &str, format_count: u32) -> Category {
    Category {
        id,
        name: name.to_string(),
        format_count,
    }
}

/// Scripted failure: status plus body text.
pub type Rejection = (StatusCode, String);

#[derive(Default)]
struct FakeState {
    categories: Vec<Category>,
    category_failures: VecDeque<Rejection>,
    uploads: VecDeque<Result<UploadResponse, Rejection>>,
    finalizes: VecDeque<Result<FinalizeFieldsResponse, Rejection>>,
    category_calls: usize,
    uploaded: Vec<SelectedFile>,
    finalized: Vec<(FinalizeTarget, FinalizeFieldsRequest)>,
}

/// In-memory [`IntakeApi`] recording every call it receives.
#[derive(Default)]
pub struct FakeIntakeApi {
    state: Mutex<FakeState>,
}

#[async_trait]
impl IntakeApi for FakeIntakeApi {
    async fn list_categories(&self) -> IntakeResult<Vec<Category>> {
        let mut guard = self.state.lock().await;
        guard.category_calls += 1;
        match guard.category_failures.pop_front() {
            Some((status, body)) => Err(IntakeError::status(
                Operation::ListCategories,
                status,
                body,
            )),
            None => Ok(guard.categories.clone()),
        }
    }

    async fn upload_document(&self, file: &SelectedFile) -> IntakeResult<UploadResponse> {
        let mut guard = self.state.lock().await;
        guard.uploaded.push(file.clone());
        match guard.uploads.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err((status, body))) => Err(IntakeError::status(Operation::Upload, status, body)),
            None => Ok(UploadResponse::default()),
        }
    }

    async fn finalize_fields(
        &self,
        target: &FinalizeTarget,
        request: &FinalizeFieldsRequest,
    ) -> IntakeResult<FinalizeFieldsResponse> {
        let mut guard = self.state.lock().await;
        guard.finalized.push((target.clone(), request.clone()));
        match guard.finalizes.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err((status, body))) => Err(IntakeError::status(
                Operation::FinalizeFields,
                status,
                body,
            )),
            None => Ok(FinalizeFieldsResponse::default()),
        }
    }
}

impl FakeIntakeApi {
    pub async fn set_categories(&self, categories: Vec<Category>) {
        self.state.lock().await.categories = categories;
    }

    pub async fn fail_next_categories(&self, status: StatusCode, body: &str) {
        self.state
            .lock()
            .await
            .category_failures
            .push_back((status, body.to_string()));
    }

    pub async fn push_upload(&self, response: Result<UploadResponse, Rejection>) {
        self.state.lock().await.uploads.push_back(response);
    }

    pub async fn push_finalize(&self, response: Result<FinalizeFieldsResponse, Rejection>) {
        self.state.lock().await.finalizes.push_back(response);
    }

    pub async fn category_calls(&self) -> usize {
        self.state.lock().await.category_calls
    }

    pub async fn uploaded(&self) -> Vec<SelectedFile> {
        self.state.lock().await.uploaded.clone()
    }

    pub async fn finalized(&self) -> Vec<(FinalizeTarget, FinalizeFieldsRequest)> {
        self.state.lock().await.finalized.clone()
    }
}

/// Workflow wired to a [`FakeIntakeApi`].
pub fn fake_workflow() -> Result<(UploadWorkflow, Arc<FakeIntakeApi>)> {
    let fake = Arc::new(FakeIntakeApi::default());
    let api: Arc<dyn IntakeApi> = fake.clone();
    let url = Url::parse("http://fake.invalid").context("fake url")?;
    Ok((UploadWorkflow::new(api, &test_config(url)), fake))
}

#[derive(Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn json(value: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: value.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn into_response(self) -> Response {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            self.body,
        )
            .into_response()
    }
}

#[derive(Clone, Debug)]
pub struct ReceivedUpload {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct ReceivedFinalize {
    pub identifier: String,
    pub body: Value,
}

struct MockState {
    categories: Mutex<MockReply>,
    upload: Mutex<MockReply>,
    finalize: Mutex<MockReply>,
    category_hits: Mutex<usize>,
    uploads: Mutex<Vec<ReceivedUpload>>,
    finalizes: Mutex<Vec<ReceivedFinalize>>,
}

/// The three intake endpoints served by axum on an ephemeral local port.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(MockState {
            categories: Mutex::new(MockReply::json(Value::Array(Vec::new()))),
            upload: Mutex::new(MockReply::json(Value::Object(Default::default()))),
            finalize: Mutex::new(MockReply::json(Value::Object(Default::default()))),
            category_hits: Mutex::new(0),
            uploads: Mutex::new(Vec::new()),
            finalizes: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/v1/categories", get(list_categories))
            .route("/v1/documents/upload", post(upload_document))
            .route("/v1/documents/:identifier/fields", post(finalize_fields))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock server")?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { addr, state })
    }

    pub fn url(&self) -> Result<Url> {
        Url::parse(&format!("http://{}", self.addr)).context("mock server url")
    }

    pub fn api(&self) -> Result<HttpIntakeApi> {
        HttpIntakeApi::new(&self.url()?)
    }

    pub fn workflow(&self) -> Result<UploadWorkflow> {
        let api: Arc<dyn IntakeApi> = Arc::new(self.api()?);
        Ok(UploadWorkflow::new(api, &test_config(self.url()?)))
    }

    pub async fn reply_categories(&self, reply: MockReply) {
        *self.state.categories.lock().await = reply;
    }

    pub async fn reply_upload(&self, reply: MockReply) {
        *self.state.upload.lock().await = reply;
    }

    pub async fn reply_finalize(&self, reply: MockReply) {
        *self.state.finalize.lock().await = reply;
    }

    pub async fn category_hits(&self) -> usize {
        *self.state.category_hits.lock().await
    }

    pub async fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().await.clone()
    }

    pub async fn finalizes(&self) -> Vec<ReceivedFinalize> {
        self.state.finalizes.lock().await.clone()
    }
}

async fn list_categories(State(state): State<Arc<MockState>>) -> Response {
    *state.category_hits.lock().await += 1;
    let reply = state.categories.lock().await.clone();
    reply.into_response().await
}

async fn upload_document(State(state): State<Arc<MockState>>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(|name| name.to_string());
        let content_type = field.content_type().map(|mime| mime.to_string());
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.uploads.lock().await.push(ReceivedUpload {
            field_name,
            file_name,
            content_type,
            bytes,
        });
    }
    let reply = state.upload.lock().await.clone();
    reply.into_response().await
}

async fn finalize_fields(
    State(state): State<Arc<MockState>>,
    Path(identifier): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state
        .finalizes
        .lock()
        .await
        .push(ReceivedFinalize { identifier, body });
    let reply = state.finalize.lock().await.clone();
    reply.into_response().await
}
