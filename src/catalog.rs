use tracing::{info, warn};

use crate::api::IntakeApi;
use crate::error::IntakeResult;
use crate::models::Category;

/// Last-known category roster plus the error of the most recent failed refresh.
#[derive(Debug, Default)]
pub struct CategoryRoster {
    categories: Vec<Category>,
    error: Option<String>,
    loaded: bool,
}

impl CategoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the roster wholesale. On failure the previous roster stays visible.
    pub async fn refresh(&mut self, api: &dyn IntakeApi) -> IntakeResult<()> {
        match api.list_categories().await {
            Ok(categories) => {
                info!(count = categories.len(), "category roster refreshed");
                self.categories = categories;
                self.error = None;
                self.loaded = true;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, retained = self.categories.len(), "category refresh failed");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether any refresh has ever succeeded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn total(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
