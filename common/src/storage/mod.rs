pub mod cache;
pub mod memory_log;
pub mod types;
pub mod vector_store;
