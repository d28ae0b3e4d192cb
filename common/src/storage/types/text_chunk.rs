use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{document::Document, Metadata};

/// A window of a document's text, carrying the document's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    pub id: String,
    pub document_id: String,
    /// Position of this window within its document, starting at 0.
    pub index: usize,
    pub text: String,
    pub metadata: Metadata,
}

impl TextChunk {
    pub fn new(document: &Document, index: usize, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            index,
            text,
            metadata: document.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_inherits_document_metadata() {
        let doc = Document::from_source("Quarterly 10-Q filing".into(), "sec/10q.txt");
        let chunk = TextChunk::new(&doc, 3, "10-Q".into());

        assert_eq!(chunk.document_id, doc.id);
        assert_eq!(chunk.index, 3);
        assert_eq!(chunk.metadata, doc.metadata);
    }
}
