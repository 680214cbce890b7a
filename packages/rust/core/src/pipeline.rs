//! End-to-end pipeline: Markdown → tokens → section forest → chunks.

use std::path::Path;
use std::time::Instant;

use tracing::{info, instrument, warn};

use mdchunk_markdown::parse_document;
use mdchunk_shared::{MdChunkError, Result, Section};

use crate::chunker::{ChunkRun, Chunker};
use crate::questions::QuestionSource;

/// Chunk a Markdown document.
#[instrument(skip_all, fields(len = source.len()))]
pub async fn chunk_document<Q: QuestionSource>(
    source: &str,
    chunker: &Chunker<'_, Q>,
) -> Result<ChunkRun> {
    let start = Instant::now();
    let forest = parse_document(source);
    let run = chunker.generate(&forest).await?;

    if !run.is_complete() {
        warn!(chunks = run.chunks.len(), "chunking cancelled, output is partial");
    }
    info!(
        chunk_size = chunker.options().chunk_size,
        sections = count_sections(&forest),
        chunks = run.chunks.len(),
        warnings = run.warnings.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "document chunked"
    );
    Ok(run)
}

/// Read a Markdown file and chunk it.
pub async fn chunk_file<Q: QuestionSource>(
    path: &Path,
    chunker: &Chunker<'_, Q>,
) -> Result<ChunkRun> {
    let source = read_document(path)?;
    chunk_document(&source, chunker).await
}

/// Read a Markdown file as UTF-8 text.
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| MdChunkError::io(path, e))
}

/// Number of sections in a forest, descendants included.
pub fn count_sections(forest: &[Section]) -> usize {
    forest
        .iter()
        .map(|section| 1 + count_sections(&section.children))
        .sum()
}

#[cfg(test)]
mod tests {
    use mdchunk_shared::{ChunkOptions, char_len};

    use super::*;

    fn fixture_path(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/markdown")
            .join(name)
    }

    #[tokio::test]
    async fn fixture_guide_chunks_in_document_order() {
        let chunker = Chunker::new(ChunkOptions {
            chunk_size: 200,
            chunk_overlap: 2,
            use_lm: false,
        });
        let run = chunk_file(&fixture_path("guide.md"), &chunker)
            .await
            .expect("chunk fixture");

        assert!(run.is_complete());
        assert!(!run.chunks.is_empty());

        let titles: Vec<&str> = run.chunks.iter().map(|c| c.indexes[1].as_str()).collect();
        let install = titles
            .iter()
            .position(|t| t.starts_with("Widget Guide Installation"))
            .expect("installation chunk");
        let usage = titles
            .iter()
            .position(|t| t.starts_with("Widget Guide Usage"))
            .expect("usage chunk");
        assert!(install < usage);

        for chunk in &run.chunks {
            assert!(!chunk.document.content.is_empty());
            assert!(chunk.indexes.len() >= 2);
            if char_len(&chunk.indexes[0]) < 200 {
                assert!(chunk.content_len() <= 200);
            }
        }

        // The long code sample is kept in one piece.
        assert!(run.chunks.iter().any(|c| {
            c.document.content.contains("```rust") && c.document.content.contains("widget.render()")
        }));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let chunker = Chunker::new(ChunkOptions::default());
        let err = chunk_file(&fixture_path("does-not-exist.md"), &chunker)
            .await
            .unwrap_err();
        assert!(matches!(err, MdChunkError::Io { .. }));
    }

    #[test]
    fn count_sections_includes_descendants() {
        let forest = parse_document("# A\n## B\n### C\n# D");
        assert_eq!(count_sections(&forest), 4);
    }
}
