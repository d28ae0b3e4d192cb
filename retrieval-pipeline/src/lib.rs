pub mod answer_retrieval;
pub mod fusion;
pub mod pipeline;
pub mod retriever;
pub mod scoring;

use common::storage::{types::text_chunk::TextChunk, vector_store::ScoredChunk};

pub use fusion::FusionRetriever;
pub use pipeline::{AnswerSource, DefaultQueryServices, QueryOutcome, QueryPipeline, QueryServices};

// A chunk handed to answer synthesis, with the score of whichever stage produced it.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

impl From<ScoredChunk> for RetrievedChunk {
    fn from(scored: ScoredChunk) -> Self {
        Self {
            chunk: scored.chunk,
            score: scored.score,
        }
    }
}
