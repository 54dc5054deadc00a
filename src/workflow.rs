//! Upload-to-finalization state machine.
//!
//! `Idle -> FileSelected -> Uploading -> Succeeded`, where `Succeeded` is
//! either the details view or the schema editor. `close` returns to `Idle`
//! from anywhere except `Uploading`. All shared state (selected file,
//! document details, working copy) lives inside [`WorkflowState`] and only
//! changes through the transitions below.

use std::mem;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::IntakeApi;
use crate::catalog::CategoryRoster;
use crate::config::IntakeConfig;
use crate::editor::SchemaEditor;
use crate::error::{IntakeError, IntakeResult, ValidationError};
use crate::models::{local_timestamp, DocumentDetails, SelectedFile};
use crate::progress::{ProgressSettings, ProgressSimulator};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    FileSelected { file: SelectedFile },
    Uploading { file: SelectedFile },
    Succeeded(Box<Review>),
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::FileSelected { .. } => "a file is selected",
            WorkflowState::Uploading { .. } => "uploading",
            WorkflowState::Succeeded(review) if review.editing => "editing the schema",
            WorkflowState::Succeeded(_) => "showing document details",
        }
    }
}

/// Rolls an unsettled upload back to `FileSelected` with progress at zero.
///
/// Covers both a failed request and a `submit` future dropped mid-flight
/// (a caller-side timeout or `select!`), so the selection can be retried.
struct InFlightUpload<'a> {
    state: &'a mut WorkflowState,
    progress: &'a ProgressSimulator,
    settled: bool,
}

impl<'a> InFlightUpload<'a> {
    fn new(state: &'a mut WorkflowState, progress: &'a ProgressSimulator) -> Self {
        Self {
            state,
            progress,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlightUpload<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.progress.reset();
        if let WorkflowState::Uploading { file } = mem::replace(self.state, WorkflowState::Idle) {
            debug!(file_name = %file.name, "upload abandoned; selection restored");
            *self.state = WorkflowState::FileSelected { file };
        }
    }
}

/// A successful upload under review.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    file: SelectedFile,
    details: DocumentDetails,
    editor: SchemaEditor,
    editing: bool,
}

impl Review {
    fn new(file: SelectedFile, details: DocumentDetails) -> Self {
        let editor = SchemaEditor::derive(&details);
        Self {
            file,
            details,
            editor,
            editing: false,
        }
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub fn details(&self) -> &DocumentDetails {
        &self.details
    }

    pub fn editor(&self) -> &SchemaEditor {
        &self.editor
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalView {
    Upload,
    Details,
    SchemaEditor,
}

impl ModalView {
    pub fn title(self) -> &'static str {
        match self {
            ModalView::Upload => "Upload PDF Document",
            ModalView::Details => "Document Details",
            ModalView::SchemaEditor => "Edit & Finalize Schema",
        }
    }

    pub fn is_expanded(self) -> bool {
        self == ModalView::SchemaEditor
    }
}

pub struct UploadWorkflow {
    api: Arc<dyn IntakeApi>,
    roster: CategoryRoster,
    progress: ProgressSimulator,
    max_upload_bytes: u64,
    state: WorkflowState,
}

impl UploadWorkflow {
    pub fn new(api: Arc<dyn IntakeApi>, config: &IntakeConfig) -> Self {
        Self::with_limits(api, config.progress_settings(), config.max_upload_bytes)
    }

    pub fn with_limits(
        api: Arc<dyn IntakeApi>,
        progress: ProgressSettings,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            api,
            roster: CategoryRoster::new(),
            progress: ProgressSimulator::new(progress),
            max_upload_bytes,
            state: WorkflowState::Idle,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn view(&self) -> ModalView {
        match &self.state {
            WorkflowState::Succeeded(review) if review.editing => ModalView::SchemaEditor,
            WorkflowState::Succeeded(_) => ModalView::Details,
            _ => ModalView::Upload,
        }
    }

    pub fn roster(&self) -> &CategoryRoster {
        &self.roster
    }

    pub fn progress(&self) -> &ProgressSimulator {
        &self.progress
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        match &self.state {
            WorkflowState::Idle => None,
            WorkflowState::FileSelected { file } | WorkflowState::Uploading { file } => Some(file),
            WorkflowState::Succeeded(review) => Some(&review.file),
        }
    }

    pub fn review(&self) -> Option<&Review> {
        match &self.state {
            WorkflowState::Succeeded(review) => Some(review),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&DocumentDetails> {
        self.review().map(Review::details)
    }

    pub fn editor(&self) -> Option<&SchemaEditor> {
        self.review().map(Review::editor)
    }

    pub fn is_editing(&self) -> bool {
        self.review().is_some_and(Review::is_editing)
    }

    pub fn can_select_file(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::Idle | WorkflowState::FileSelected { .. }
        )
    }

    pub fn can_submit(&self) -> bool {
        matches!(self.state, WorkflowState::FileSelected { .. })
    }

    pub fn can_close(&self) -> bool {
        !matches!(self.state, WorkflowState::Uploading { .. })
    }

    /// Accepts a PDF within the size ceiling. A rejected file leaves the
    /// current state, including any earlier selection, untouched.
    pub fn select_file(&mut self, file: SelectedFile) -> IntakeResult<()> {
        if !self.can_select_file() {
            return Err(IntakeError::invalid_transition(
                "select a file",
                self.state.name(),
            ));
        }
        if !file.is_pdf() {
            warn!(file_name = %file.name, media_type = %file.media_type, "rejected non-PDF selection");
            return Err(ValidationError::UnsupportedMediaType(file.media_type).into());
        }
        if file.size() > self.max_upload_bytes {
            warn!(file_name = %file.name, size = file.size(), limit = self.max_upload_bytes, "rejected oversized selection");
            return Err(ValidationError::FileTooLarge {
                size: file.size(),
                limit: self.max_upload_bytes,
            }
            .into());
        }

        self.progress.reset();
        self.state = WorkflowState::FileSelected { file };
        Ok(())
    }

    pub fn remove_selected_file(&mut self) -> IntakeResult<()> {
        match self.state {
            WorkflowState::Idle => Ok(()),
            WorkflowState::FileSelected { .. } => {
                self.progress.reset();
                self.state = WorkflowState::Idle;
                Ok(())
            }
            _ => Err(IntakeError::invalid_transition(
                "remove the selected file",
                self.state.name(),
            )),
        }
    }

    /// Uploads the selected file and normalizes the extraction result.
    ///
    /// On failure the selection is kept so the same file can be retried.
    /// On success the category roster is refreshed; a failed refresh is
    /// recorded on the roster and does not affect the upload's outcome.
    pub async fn submit(&mut self) -> IntakeResult<()> {
        let file = match mem::replace(&mut self.state, WorkflowState::Idle) {
            WorkflowState::FileSelected { file } => file,
            other => {
                let state = other.name();
                self.state = other;
                return Err(IntakeError::invalid_transition("submit", state));
            }
        };

        self.state = WorkflowState::Uploading { file: file.clone() };
        info!(file_name = %file.name, size = file.size(), "uploading document");

        let in_flight = InFlightUpload::new(&mut self.state, &self.progress);
        let result = self.progress.drive(self.api.upload_document(&file)).await;

        let response = match result {
            Ok(response) => {
                in_flight.settle();
                response
            }
            Err(err) => {
                warn!(file_name = %file.name, error = %err, "document upload failed");
                drop(in_flight);
                return Err(err);
            }
        };

        self.progress.complete();
        let details = DocumentDetails::from_upload(response, &file, local_timestamp());
        info!(
            file_name = %details.file_name,
            file_size = details.file_size,
            category = %details.category_name,
            category_id = ?details.category_id,
            new_category = details.is_new_category,
            fields = details.extracted_fields.len(),
            "document upload succeeded"
        );
        self.state = WorkflowState::Succeeded(Box::new(Review::new(file, details)));

        self.refresh_roster_after("upload").await;
        Ok(())
    }

    pub fn open_editor(&mut self) -> IntakeResult<()> {
        match &mut self.state {
            WorkflowState::Succeeded(review) => {
                review.editing = true;
                Ok(())
            }
            other => Err(IntakeError::invalid_transition(
                "open the schema editor",
                other.name(),
            )),
        }
    }

    /// The working copy, available only while the schema editor is open.
    pub fn editor_mut(&mut self) -> IntakeResult<&mut SchemaEditor> {
        let state = self.state.name();
        match &mut self.state {
            WorkflowState::Succeeded(review) if review.editing => Ok(&mut review.editor),
            _ => Err(IntakeError::invalid_transition("edit the schema", state)),
        }
    }

    /// Discards all edits and returns to the details view. Idempotent.
    pub fn cancel_edit(&mut self) -> IntakeResult<()> {
        match &mut self.state {
            WorkflowState::Succeeded(review) => {
                review.editor = SchemaEditor::derive(&review.details);
                review.editing = false;
                Ok(())
            }
            other => Err(IntakeError::invalid_transition("cancel editing", other.name())),
        }
    }

    /// Posts the edited fields to the finalization service.
    ///
    /// A missing identifier fails before any request. A failed request keeps
    /// the editor open with all edits intact.
    pub async fn commit(&mut self) -> IntakeResult<()> {
        let review = match &mut self.state {
            WorkflowState::Succeeded(review) if review.editing => review,
            other => {
                return Err(IntakeError::invalid_transition(
                    "finalize the schema",
                    other.name(),
                ))
            }
        };

        let target = match review.editor.finalize_target(&review.details) {
            Ok(target) => target,
            Err(err) => {
                warn!(error = %err, "schema finalization refused");
                return Err(err);
            }
        };
        let request = review.editor.finalize_request(&review.details);

        let response = match self.api.finalize_fields(&target, &request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%target, error = %err, "schema finalization failed");
                return Err(err);
            }
        };

        if let Some(category_id) = response.category_id {
            let details = &mut review.details;
            details.category_id = Some(category_id);
            details.category_name = request.category_name;
            details.extracted_fields = request.extracted_fields;
            details.is_new_category = false;
            review.editor = SchemaEditor::derive(&review.details);
        }
        review.editing = false;
        info!(%target, category_id = ?response.category_id, "schema finalized successfully");

        self.refresh_roster_after("finalize").await;
        Ok(())
    }

    /// Back to `Idle`, dropping the selection, progress, details, and edits.
    pub fn close(&mut self) -> IntakeResult<()> {
        if !self.can_close() {
            return Err(IntakeError::invalid_transition("close", self.state.name()));
        }
        self.progress.reset();
        self.state = WorkflowState::Idle;
        Ok(())
    }

    pub async fn refresh_categories(&mut self) -> IntakeResult<()> {
        self.roster.refresh(self.api.as_ref()).await
    }

    async fn refresh_roster_after(&mut self, trigger: &'static str) {
        if let Err(err) = self.roster.refresh(self.api.as_ref()).await {
            warn!(trigger, error = %err, "category refresh after success failed");
        }
    }
}
