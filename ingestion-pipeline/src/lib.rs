#![allow(clippy::missing_docs_in_private_items)]

pub mod chunker;
pub mod loader;
pub mod pipeline;

pub use chunker::ChunkingConfig;
pub use pipeline::{IngestReport, IngestionPipeline, EXTERNAL_UPDATE_SOURCE};
