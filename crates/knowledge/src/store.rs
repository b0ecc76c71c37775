//! In-memory document store.
//!
//! The store is fixed at startup and only ever read afterwards. There is no
//! file or database I/O; the seed corpus is compiled in.

use crate::types::Document;
use chatloop_core::{AppError, AppResult};
use std::collections::HashSet;

/// Ordered, immutable collection of documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    /// Build a store from documents, keeping their order.
    ///
    /// # Errors
    /// Returns an error if two documents share an id.
    pub fn new(documents: Vec<Document>) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(AppError::Knowledge(format!(
                    "Duplicate document id: {}",
                    doc.id
                )));
            }
        }

        tracing::debug!("Document store loaded with {} documents", documents.len());
        Ok(Self { documents })
    }

    /// A store with no documents.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in sample corpus.
    pub fn sample() -> Self {
        Self {
            documents: sample_documents(),
        }
    }

    /// Documents in store order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            "doc1",
            "Python Basics",
            "Python is a high-level programming language known for its simplicity and \
             readability. It was created by Guido van Rossum and first released in 1991. \
             Python supports multiple programming paradigms including procedural, \
             object-oriented, and functional programming. Common use cases include web \
             development, data science, automation, and artificial intelligence.",
        ),
        Document::new(
            "doc2",
            "FastAPI Framework",
            "FastAPI is a modern, fast web framework for building APIs with Python. It was \
             created by Sebastián Ramírez and first released in 2018. FastAPI is built on top \
             of Starlette and Pydantic, providing automatic API documentation, data \
             validation, and high performance. It's one of the fastest Python frameworks \
             available, comparable to NodeJS and Go.",
        ),
        Document::new(
            "doc3",
            "Machine Learning Basics",
            "Machine learning is a subset of artificial intelligence that enables systems to \
             learn and improve from experience without being explicitly programmed. There are \
             three main types: supervised learning, unsupervised learning, and reinforcement \
             learning. Popular frameworks include TensorFlow, PyTorch, and scikit-learn. \
             Applications include image recognition, natural language processing, and \
             predictive analytics.",
        ),
        Document::new(
            "doc4",
            "API Design Best Practices",
            "Good API design is crucial for maintainability and usability. Key principles \
             include: using RESTful conventions, providing clear error messages, versioning \
             your API, implementing proper authentication, and documenting endpoints \
             thoroughly. APIs should be consistent, intuitive, and follow standard HTTP \
             methods (GET, POST, PUT, DELETE). Rate limiting and caching are important for \
             performance.",
        ),
        Document::new(
            "doc5",
            "Database Fundamentals",
            "Databases are organized collections of data that can be easily accessed and \
             managed. SQL databases (like PostgreSQL and MySQL) use structured tables and \
             relationships, while NoSQL databases (like MongoDB) offer more flexibility with \
             document-based storage. Key concepts include indexing for performance, \
             normalization for data integrity, and ACID properties (Atomicity, Consistency, \
             Isolation, Durability) for transactions.",
        ),
    ]
}
