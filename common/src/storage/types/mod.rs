use std::collections::BTreeMap;

pub mod document;
pub mod text_chunk;

/// String metadata carried from a document onto each of its chunks.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key naming where a document came from.
pub const SOURCE_KEY: &str = "source";
