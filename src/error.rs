use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::editor::FieldId;
use crate::models::BasicInfoAttribute;

pub type IntakeResult<T> = Result<T, IntakeError>;

/// The three server collaborators, used to label transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListCategories,
    Upload,
    FinalizeFields,
}

impl Operation {
    fn fallback_detail(self) -> &'static str {
        match self {
            Operation::ListCategories => "Failed to fetch categories",
            Operation::Upload => "Unknown error",
            Operation::FinalizeFields => "Failed to save fields",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::ListCategories => "fetching categories",
            Operation::Upload => "upload",
            Operation::FinalizeFields => "saving fields",
        };
        f.write_str(label)
    }
}

/// Rejections raised before any request is issued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please select a PDF file (got {0})")]
    UnsupportedMediaType(String),
    #[error("file is {size} bytes, exceeding the {limit} byte upload ceiling")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("category identifier not found; cannot save fields")]
    MissingIdentifier,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{operation} failed: {detail}")]
    Transport {
        operation: Operation,
        status: Option<StatusCode>,
        detail: String,
    },
    #[error("{operation} returned an unreadable response: {detail}")]
    Decode { operation: Operation, detail: String },
    #[error("field index {index} is out of range for {len} fields")]
    OutOfRange { index: usize, len: usize },
    #[error("field {0} no longer exists")]
    UnknownField(FieldId),
    #[error("{0} is read-only")]
    ReadOnlyAttribute(BasicInfoAttribute),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl IntakeError {
    /// Non-2xx response. An empty body falls back to an operation-specific detail.
    pub fn status(operation: Operation, status: StatusCode, body: impl Into<String>) -> Self {
        let body = body.into();
        let detail = if body.trim().is_empty() {
            operation.fallback_detail().to_string()
        } else {
            body
        };
        Self::Transport {
            operation,
            status: Some(status),
            detail,
        }
    }

    /// The request never produced a response.
    pub fn network(operation: Operation, error: impl fmt::Display) -> Self {
        Self::Transport {
            operation,
            status: None,
            detail: error.to_string(),
        }
    }

    pub fn decode(operation: Operation, error: impl fmt::Display) -> Self {
        Self::Decode {
            operation,
            detail: error.to_string(),
        }
    }

    pub fn invalid_transition(action: &'static str, state: &'static str) -> Self {
        Self::InvalidTransition { action, state }
    }

    /// Whether repeating the same user action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Decode { .. })
    }

    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}
