//! Context block construction.
//!
//! Retrieved documents are formatted into one text block and paired with a
//! groundedness instruction. The block is rebuilt for every turn and sent as
//! system content; it is never stored in the conversation.

use crate::types::RetrievalResult;

/// Marker emitted when retrieval found nothing.
pub const NO_RELEVANT_DOCUMENTS: &str = "No relevant documents were found.";

/// Instruction that keeps answers tied to the supplied documents.
pub const GROUNDEDNESS_INSTRUCTION: &str = "Instructions:\n\
- Answer based ONLY on the information in the documents above\n\
- If the documents don't contain enough information, say so\n\
- Use the conversation history to resolve follow-up questions\n\
- Cite which document you're referencing when possible";

const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Formats retrieval results for the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Format documents as numbered title/body sections, or the
    /// [`NO_RELEVANT_DOCUMENTS`] marker when there are none.
    pub fn build(&self, retrieval: &RetrievalResult<'_>) -> String {
        if retrieval.is_empty() {
            return NO_RELEVANT_DOCUMENTS.to_string();
        }

        retrieval
            .documents
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("Document {} - {}:\n{}", i + 1, doc.title, doc.body.trim()))
            .collect::<Vec<_>>()
            .join(DOCUMENT_SEPARATOR)
    }

    /// System content for one turn.
    ///
    /// With matches: the optional base prompt, the context block and the
    /// groundedness instruction. Without matches the context block is left
    /// out and only the base prompt (if any) remains.
    pub fn system_prompt(&self, base: Option<&str>, retrieval: &RetrievalResult<'_>) -> Option<String> {
        let base = base.map(str::trim).filter(|b| !b.is_empty());

        if retrieval.is_empty() {
            tracing::debug!("No documents retrieved, omitting context block");
            return base.map(str::to_string);
        }

        let mut prompt = String::new();
        if let Some(base) = base {
            prompt.push_str(base);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Available documents:\n\n");
        prompt.push_str(&self.build(retrieval));
        prompt.push_str("\n\n");
        prompt.push_str(GROUNDEDNESS_INSTRUCTION);

        Some(prompt)
    }
}
