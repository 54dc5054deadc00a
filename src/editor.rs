//! Working copy used while reviewing extracted fields before finalization.
//!
//! Fields are addressed by position from the outside, but each one carries a
//! [`FieldId`] that survives removals of its neighbours, so a handle taken
//! before a removal never lands on a different field afterwards.

use std::fmt;

use uuid::Uuid;

use crate::error::{IntakeError, IntakeResult, ValidationError};
use crate::models::{
    BasicInfoAttribute, DocumentDetails, EditableBasicInfo, Field, FieldAttribute,
    FinalizeFieldsRequest, FinalizeTarget,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(Uuid);

impl FieldId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EditableField {
    id: FieldId,
    field: Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEditor {
    fields: Vec<EditableField>,
    basic_info: EditableBasicInfo,
}

impl SchemaEditor {
    /// Fresh working copy of `details`; any previous edits are discarded.
    pub fn derive(details: &DocumentDetails) -> Self {
        Self {
            fields: details
                .extracted_fields
                .iter()
                .cloned()
                .map(|field| EditableField {
                    id: FieldId::new(),
                    field,
                })
                .collect(),
            basic_info: EditableBasicInfo::derive(details),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().map(|entry| &entry.field)
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index).map(|entry| &entry.field)
    }

    pub fn field_id(&self, index: usize) -> IntakeResult<FieldId> {
        self.check_index(index)?;
        Ok(self.fields[index].id)
    }

    pub fn index_of(&self, id: FieldId) -> Option<usize> {
        self.fields.iter().position(|entry| entry.id == id)
    }

    pub fn basic_info(&self) -> &EditableBasicInfo {
        &self.basic_info
    }

    pub fn change_field(
        &mut self,
        index: usize,
        attribute: FieldAttribute,
        value: impl Into<String>,
    ) -> IntakeResult<()> {
        self.check_index(index)?;
        self.fields[index].field.set(attribute, value);
        Ok(())
    }

    pub fn change_field_by_id(
        &mut self,
        id: FieldId,
        attribute: FieldAttribute,
        value: impl Into<String>,
    ) -> IntakeResult<()> {
        let index = self.index_of(id).ok_or(IntakeError::UnknownField(id))?;
        self.fields[index].field.set(attribute, value);
        Ok(())
    }

    /// Removes the field at `index`; later fields shift down by one.
    pub fn remove_field(&mut self, index: usize) -> IntakeResult<Field> {
        self.check_index(index)?;
        Ok(self.fields.remove(index).field)
    }

    pub fn remove_field_by_id(&mut self, id: FieldId) -> IntakeResult<Field> {
        let index = self.index_of(id).ok_or(IntakeError::UnknownField(id))?;
        Ok(self.fields.remove(index).field)
    }

    /// Appends an empty field and returns its handle.
    pub fn add_field(&mut self) -> FieldId {
        let id = FieldId::new();
        self.fields.push(EditableField {
            id,
            field: Field::default(),
        });
        id
    }

    pub fn change_basic_info(
        &mut self,
        attribute: BasicInfoAttribute,
        value: impl Into<String>,
    ) -> IntakeResult<()> {
        self.basic_info.set(attribute, value)
    }

    pub fn edited_fields(&self) -> Vec<Field> {
        self.fields().cloned().collect()
    }

    /// True when the working copy holds exactly what `details` holds.
    pub fn is_pristine(&self, details: &DocumentDetails) -> bool {
        self.basic_info == EditableBasicInfo::derive(details)
            && self.fields().eq(details.extracted_fields.iter())
    }

    /// New categories are addressed by their edited name, existing ones by id.
    pub fn finalize_target(&self, details: &DocumentDetails) -> IntakeResult<FinalizeTarget> {
        let target = if details.is_new_category {
            let name = self.basic_info.category_name.trim();
            (!name.is_empty()).then(|| FinalizeTarget::CategoryName(name.to_string()))
        } else {
            details.category_id.map(FinalizeTarget::CategoryId)
        };
        target.ok_or_else(|| ValidationError::MissingIdentifier.into())
    }

    pub fn finalize_request(&self, details: &DocumentDetails) -> FinalizeFieldsRequest {
        FinalizeFieldsRequest {
            extracted_fields: self.edited_fields(),
            category_name: self.basic_info.category_name.clone(),
            category_summary: details.summary.clone(),
        }
    }

    fn check_index(&self, index: usize) -> IntakeResult<()> {
        if index < self.fields.len() {
            Ok(())
        } else {
            Err(IntakeError::OutOfRange {
                index,
                len: self.fields.len(),
            })
        }
    }
}
