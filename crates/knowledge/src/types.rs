//! Knowledge type definitions.

use serde::{Deserialize, Serialize};

/// A short text record in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within the store
    pub id: String,

    pub title: String,

    /// Searchable text
    pub body: String,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Documents selected for one query, in store order.
///
/// An empty result is meaningful: nothing in the store matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalResult<'a> {
    pub documents: Vec<&'a Document>,
}

impl<'a> RetrievalResult<'a> {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn titles(&self) -> Vec<&'a str> {
        self.documents.iter().map(|d| d.title.as_str()).collect()
    }
}
