//! Core domain types: the section forest and the chunk records derived from it.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// One heading-delimited region of a document plus its nested subregions.
///
/// Built once per document and never mutated afterwards. Children are owned
/// by their parent; nothing points back up the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text without its markup.
    pub title: String,
    /// The heading line plus the section's own body, excluding children.
    pub content: String,
    /// `content` followed by every child's `total`, newline-joined.
    pub total: String,
    /// Sections one heading level deeper, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Section>,
}

impl Section {
    /// Create a section without children, whose total is its own content.
    pub fn leaf(title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            title: title.into(),
            total: content.clone(),
            content,
            children: Vec::new(),
        }
    }

    /// Whether this section has nested subsections.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Length of `total` in characters.
    pub fn total_len(&self) -> usize {
        char_len(&self.total)
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// The stored/embedded part of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDocument {
    /// Retrievable text, possibly widened with neighbouring sections.
    pub content: String,
}

/// A bounded-size retrievable unit carrying several index strings.
///
/// Every chunk has non-empty content and at least two indexes: the
/// un-expanded text and the title path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Independent representations to index, in insertion order.
    pub indexes: Vec<String>,
    /// The document stored for retrieval.
    pub document: ChunkDocument,
}

impl Chunk {
    /// Create a chunk whose first index is its own content and second is its title path.
    pub fn new(content: impl Into<String>, title: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            indexes: vec![content.clone(), title.into()],
            document: ChunkDocument { content },
        }
    }

    /// Length of the stored document in characters.
    pub fn content_len(&self) -> usize {
        char_len(&self.document.content)
    }
}

/// Length of a string in Unicode scalar values, the unit of every size budget.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
