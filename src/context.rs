//! Renders retrieved chunks into a bounded prompt context.

use std::fmt::Write;

use crate::config::ContextConfig;
use crate::index::ScoredChunk;

/// Separator between rendered chunks, matching the retrieval display the
/// answer model is instructed to cite from.
const CHUNK_SEPARATOR: &str = "\n\n\n";

/// Builds the grounding context handed to the completion model.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Concatenates retrieved chunks with their provenance, most similar
    /// first, under the configured character budget.
    ///
    /// When the budget would be exceeded, trailing (least similar) chunks are
    /// dropped whole; a chunk is never truncated mid-text. Deterministic for
    /// identical inputs.
    pub fn assemble(&self, retrieved: &[ScoredChunk]) -> String {
        let mut context = String::new();
        for scored in retrieved {
            let rendered = render_chunk(scored);
            let needed = if context.is_empty() {
                rendered.chars().count()
            } else {
                CHUNK_SEPARATOR.len() + rendered.chars().count()
            };
            if context.chars().count() + needed > self.config.max_chars {
                break;
            }
            if !context.is_empty() {
                context.push_str(CHUNK_SEPARATOR);
            }
            context.push_str(&rendered);
        }
        context
    }

    /// Wraps the assembled context in the grounding instructions for the
    /// completion model: answer from the context, admit ignorance otherwise.
    pub fn render_system_prompt(&self, context: &str) -> String {
        format!(
            "You are a helpful assistant who answers user queries based on the \
provided context.\n\
The context is retrieved from source documents along with page numbers and \
file locations; cite them where useful.\n\
\n\
context:\n{context}\n\
\n\
rules:\n\
- answer only from the provided context.\n\
- if the context does not contain the answer, reply \"I don't know\".\n"
        )
    }
}

fn render_chunk(scored: &ScoredChunk) -> String {
    let mut out = String::new();
    let _ = write!(out, "Content: {}", scored.chunk.text);
    if let Some(page) = scored.chunk.page {
        let _ = write!(out, "\nPage: {page}");
    }
    let _ = write!(out, "\nSource: {}", scored.chunk.source);
    out
}
