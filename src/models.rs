use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::Local;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{IntakeError, IntakeResult};
use crate::utils::json::{lenient_field, nested_object, non_empty_string, string_like};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const DEFAULT_CATEGORY_NAME: &str = "Unknown";
pub const DEFAULT_SUMMARY: &str = "Document processed successfully.";
pub const UPLOADED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One extracted key/value/description triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, deserialize_with = "string_like")]
    pub key: String,
    #[serde(default, deserialize_with = "string_like")]
    pub value: String,
    #[serde(default, deserialize_with = "string_like")]
    pub description: String,
}

impl Field {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            description: description.into(),
        }
    }

    pub fn get(&self, attribute: FieldAttribute) -> &str {
        match attribute {
            FieldAttribute::Key => &self.key,
            FieldAttribute::Value => &self.value,
            FieldAttribute::Description => &self.description,
        }
    }

    pub fn set(&mut self, attribute: FieldAttribute, value: impl Into<String>) {
        let slot = match attribute {
            FieldAttribute::Key => &mut self.key,
            FieldAttribute::Value => &mut self.value,
            FieldAttribute::Description => &mut self.description,
        };
        *slot = value.into();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAttribute {
    Key,
    Value,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub format_count: u32,
}

impl Category {
    pub fn format_label(&self) -> String {
        if self.format_count == 1 {
            "1 Format".to_string()
        } else {
            format!("{} Formats", self.format_count)
        }
    }
}

/// Page count as reported by extraction. `NotAvailable` is distinct from zero pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    Known(u32),
    NotAvailable,
}

impl fmt::Display for PageCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageCount::Known(pages) => write!(f, "{pages}"),
            PageCount::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for PageCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageCount::Known(pages) => serializer.serialize_u32(*pages),
            PageCount::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

/// A file chosen for upload, held in memory until submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, declaring its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self::new(name, media_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE)
    }

    pub fn size_mb_label(&self) -> String {
        format!("{:.2} MB", self.size() as f64 / 1024.0 / 1024.0)
    }
}

/// Raw upload-and-extract response. Every field is optional; shape problems
/// are resolved by defaulting in [`DocumentDetails::from_upload`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadResponse {
    pub category_id: Option<i64>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub category_name: Option<String>,
    pub page_count: Option<u32>,
    pub key_values: Option<Vec<Field>>,
    pub formats: Option<Vec<String>>,
    pub confidence: Option<f64>,
    pub message: Option<String>,
    pub is_new_category: Option<bool>,
    pub format_count: Option<u32>,
}

impl UploadResponse {
    pub fn from_value(value: Value) -> Result<Self, String> {
        let object = match value {
            Value::Object(map) => map,
            other => return Err(format!("expected a JSON object, got {other}")),
        };
        Ok(Self::from_object(&object))
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let key_values = nested_object(object, "extractedFields")
            .and_then(|extracted| lenient_field(extracted, "key_values"));
        let format_count = nested_object(object, "category")
            .and_then(|category| lenient_field(category, "formatCount"));

        Self {
            category_id: lenient_field(object, "categoryId"),
            file_name: non_empty_string(object, "fileName"),
            file_size: lenient_field(object, "fileSize"),
            category_name: non_empty_string(object, "categoryName"),
            page_count: lenient_field(object, "pageCount"),
            key_values,
            formats: lenient_field(object, "formats"),
            confidence: lenient_field(object, "confidence"),
            message: non_empty_string(object, "message"),
            is_new_category: lenient_field(object, "isNewCategory"),
            format_count,
        }
    }
}

/// Document metadata and extraction results produced by one successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetails {
    pub category_id: Option<i64>,
    pub file_name: String,
    pub file_size: u64,
    pub uploaded_at: String,
    pub category_name: String,
    pub format_count: u32,
    pub page_count: PageCount,
    pub extracted_fields: Vec<Field>,
    pub formats: BTreeSet<String>,
    pub confidence: f64,
    pub summary: String,
    pub is_new_category: bool,
}

impl DocumentDetails {
    pub fn from_upload(response: UploadResponse, file: &SelectedFile, uploaded_at: String) -> Self {
        let confidence = response
            .confidence
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Self {
            category_id: response.category_id,
            file_name: response.file_name.unwrap_or_else(|| file.name.clone()),
            file_size: response.file_size.unwrap_or_else(|| file.size()),
            uploaded_at,
            category_name: response
                .category_name
                .unwrap_or_else(|| DEFAULT_CATEGORY_NAME.to_string()),
            format_count: response.format_count.unwrap_or(0),
            page_count: response
                .page_count
                .map_or(PageCount::NotAvailable, PageCount::Known),
            extracted_fields: response.key_values.unwrap_or_default(),
            formats: response.formats.unwrap_or_default().into_iter().collect(),
            confidence,
            summary: response
                .message
                .unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
            is_new_category: response.is_new_category.unwrap_or(false),
        }
    }
}

pub fn local_timestamp() -> String {
    Local::now().format(UPLOADED_AT_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicInfoAttribute {
    FileName,
    FileSize,
    PageCount,
    CategoryName,
    UploadedAt,
}

impl BasicInfoAttribute {
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::FileSize | Self::PageCount)
    }
}

impl fmt::Display for BasicInfoAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FileName => "file name",
            Self::FileSize => "file size",
            Self::PageCount => "page count",
            Self::CategoryName => "category",
            Self::UploadedAt => "uploaded at",
        };
        f.write_str(label)
    }
}

/// Working copy of the editable subset of [`DocumentDetails`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableBasicInfo {
    pub file_name: String,
    pub file_size: u64,
    pub page_count: PageCount,
    pub category_name: String,
    pub uploaded_at: String,
}

impl EditableBasicInfo {
    pub fn derive(details: &DocumentDetails) -> Self {
        Self {
            file_name: details.file_name.clone(),
            file_size: details.file_size,
            page_count: details.page_count,
            category_name: details.category_name.clone(),
            uploaded_at: details.uploaded_at.clone(),
        }
    }

    pub fn set(&mut self, attribute: BasicInfoAttribute, value: impl Into<String>) -> IntakeResult<()> {
        let slot = match attribute {
            BasicInfoAttribute::FileName => &mut self.file_name,
            BasicInfoAttribute::CategoryName => &mut self.category_name,
            BasicInfoAttribute::UploadedAt => &mut self.uploaded_at,
            BasicInfoAttribute::FileSize | BasicInfoAttribute::PageCount => {
                return Err(IntakeError::ReadOnlyAttribute(attribute));
            }
        };
        *slot = value.into();
        Ok(())
    }

    /// Size in kilobytes, rounded to the nearest integer.
    pub fn file_size_kb(&self) -> u64 {
        (self.file_size as f64 / 1024.0).round() as u64
    }
}

/// Where finalized fields are posted: an existing category id, or the
/// proposed name of a category that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeTarget {
    CategoryId(i64),
    CategoryName(String),
}

impl FinalizeTarget {
    pub fn path_segment(&self) -> String {
        match self {
            FinalizeTarget::CategoryId(id) => id.to_string(),
            FinalizeTarget::CategoryName(name) => {
                utf8_percent_encode(name, NON_ALPHANUMERIC).to_string()
            }
        }
    }
}

impl fmt::Display for FinalizeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeTarget::CategoryId(id) => write!(f, "category #{id}"),
            FinalizeTarget::CategoryName(name) => write!(f, "new category {name:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeFieldsRequest {
    pub extracted_fields: Vec<Field>,
    pub category_name: String,
    pub category_summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeFieldsResponse {
    pub category_id: Option<i64>,
}

impl FinalizeFieldsResponse {
    /// The save already happened server-side, so an unusable `categoryId`
    /// (mistyped, non-numeric text, or `0`) reads as "no new id".
    pub fn from_value(value: &Value) -> Self {
        let category_id = value
            .as_object()
            .and_then(|object| {
                lenient_field::<i64>(object, "categoryId").or_else(|| {
                    lenient_field::<String>(object, "categoryId")
                        .and_then(|raw| raw.trim().parse().ok())
                })
            })
            .filter(|id| *id != 0);
        Self { category_id }
    }
}

/// `project_name` -> `Project Name`.
pub fn format_field_key(key: &str) -> String {
    let mut formatted = String::with_capacity(key.len());
    let mut at_word_start = true;
    for ch in key.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        let is_word = ch.is_alphanumeric();
        if is_word && at_word_start {
            formatted.extend(ch.to_uppercase());
        } else {
            formatted.push(ch);
        }
        at_word_start = !is_word;
    }
    formatted
}
