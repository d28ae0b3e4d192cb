use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Metadata, SOURCE_KEY};

/// Raw text plus provenance, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: String, metadata: Metadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            text,
            metadata,
        }
    }

    pub fn from_source(text: String, source: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        Self::new(text, metadata)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_source_sets_metadata() {
        let doc = Document::from_source("SOX 404 narrative".into(), "controls/sox.txt");
        assert_eq!(doc.source(), Some("controls/sox.txt"));
        assert_eq!(doc.metadata.len(), 1);
    }

    #[test]
    fn test_documents_get_distinct_ids() {
        let a = Document::new("a".into(), Metadata::new());
        let b = Document::new("a".into(), Metadata::new());
        assert_ne!(a.id, b.id);
        assert_eq!(a.source(), None);
    }
}
