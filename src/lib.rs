pub mod api;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod models;
pub mod progress;
pub mod utils;
pub mod workflow;

pub use api::{HttpIntakeApi, IntakeApi};
pub use catalog::CategoryRoster;
pub use config::IntakeConfig;
pub use editor::{FieldId, SchemaEditor};
pub use error::{IntakeError, IntakeResult, Operation, ValidationError};
pub use workflow::{ModalView, UploadWorkflow, WorkflowState};
