pub mod config;
pub mod embedding;
pub mod ingest_limits;
pub mod llm_client;
pub mod retry;
