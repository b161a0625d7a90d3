//! Read-only question lookup.

use std::collections::HashMap;
use std::future::Future;

use crate::{CatalogError, CatalogQuestion};

/// Where questions come from. Answers with correctness are only ever
/// read inside the room actor.
///
/// Implementations are shared across rooms, so they must be cheap to call
/// concurrently.
pub trait QuestionCatalog: Send + Sync + 'static {
    /// `Ok(None)` for an unknown id.
    fn get_question(&self, id: &str) -> impl Future<Output = Result<Option<CatalogQuestion>, CatalogError>> + Send;
}

/// In-memory catalog, loaded once at startup.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    questions: HashMap<String, CatalogQuestion>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of questions.
    ///
    /// ```
    /// use buzzline_room::MemoryCatalog;
    ///
    /// let catalog = MemoryCatalog::from_json(
    ///     r#"[{"id":"q1","type":"poll","prompt":"Tea or coffee?",
    ///          "options":[{"id":"t","text":"Tea"},{"id":"c","text":"Coffee"}]}]"#,
    /// ).unwrap();
    /// assert_eq!(catalog.len(), 1);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let questions: Vec<CatalogQuestion> =
            serde_json::from_str(json).map_err(|e| CatalogError::Malformed(e.to_string()))?;
        let mut catalog = Self::new();
        for question in questions {
            if catalog.questions.contains_key(&question.id) {
                return Err(CatalogError::Malformed(format!("duplicate question id {}", question.id)));
            }
            catalog.insert(question);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, question: CatalogQuestion) {
        self.questions.insert(question.id.clone(), question);
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionCatalog for MemoryCatalog {
    async fn get_question(&self, id: &str) -> Result<Option<CatalogQuestion>, CatalogError> {
        Ok(self.questions.get(id).cloned())
    }
}
