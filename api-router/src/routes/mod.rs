pub mod health;
pub mod ingest;
pub mod memory;
pub mod query;
pub mod update_sec;
