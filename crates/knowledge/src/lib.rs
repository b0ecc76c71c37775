//! Knowledge for retrieval-augmented chat.
//!
//! Provides a static document store, keyword retrieval over it, and the
//! context block that carries retrieved documents to the model.

pub mod context;
pub mod retriever;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use context::{ContextBuilder, GROUNDEDNESS_INSTRUCTION, NO_RELEVANT_DOCUMENTS};
pub use retriever::{retrieve, Retriever, DEFAULT_MAX_RESULTS};
pub use store::DocumentStore;
pub use types::{Document, RetrievalResult};
