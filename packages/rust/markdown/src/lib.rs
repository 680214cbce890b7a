//! Markdown tokenizing and section-tree construction.
//!
//! [`tokenize`] turns raw Markdown into a flat stream of heading, text and
//! fence tokens; [`build_forest`] folds that stream into a forest of
//! [`Section`]s whose shape mirrors heading nesting.

mod tokenizer;
mod tree;

use tracing::instrument;

use mdchunk_shared::Section;

pub use tokenizer::{Token, tokenize};
pub use tree::{build_forest, splice};

/// Tokenize and build the section forest for a Markdown document.
#[instrument(skip(source), fields(len = source.len()))]
pub fn parse_document(source: &str) -> Vec<Section> {
    let tokens = tokenize(source);
    build_forest(source, &tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_document_builds_forest() {
        let forest = parse_document("# Guide\nintro\n## Install\nrun it");
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].title, "Install");
    }
}
