//! Query-time orchestration: embed → retrieve → assemble → generate.
//!
//! The pipeline raises typed errors and never converts them into job state;
//! that policy lives in the worker loop, the single catch point.

use std::sync::Arc;

use tracing::debug;

use crate::completion::CompletionClient;
use crate::context::ContextAssembler;
use crate::embedder::EmbeddingProvider;
use crate::error::Result;
use crate::index::{ScoredChunk, VectorIndex};

/// The collaborator bundle a worker uses to process one query job.
///
/// All collaborators are injected behind trait objects so tests can swap in
/// deterministic doubles.
#[derive(Clone)]
pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    assembler: ContextAssembler,
    completion: Arc<dyn CompletionClient>,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        assembler: ContextAssembler,
        completion: Arc<dyn CompletionClient>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            assembler,
            completion,
            top_k: top_k.max(1),
        }
    }

    /// Embeds the query and retrieves the top-k most similar chunks.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedder.embed(query).await?;
        let retrieved = self.index.search(&embedding, self.top_k).await?;
        debug!(retrieved = retrieved.len(), "retrieval complete");
        Ok(retrieved)
    }

    /// Renders retrieved chunks into the system prompt for generation.
    pub fn build_prompt(&self, retrieved: &[ScoredChunk]) -> String {
        let context = self.assembler.assemble(retrieved);
        self.assembler.render_system_prompt(&context)
    }

    /// Generates the answer from an already-built prompt.
    pub async fn generate(&self, system_prompt: &str, query: &str) -> Result<String> {
        self.completion.complete(system_prompt, query).await
    }

    /// Full processing sequence for one query.
    pub async fn run(&self, query: &str) -> Result<String> {
        let retrieved = self.retrieve(query).await?;
        let prompt = self.build_prompt(&retrieved);
        self.generate(&prompt, query).await
    }
}
