//! Section tree builder.
//!
//! Turns the flat token stream into a forest of [`Section`]s mirroring heading
//! nesting. Each section's `total` is computed bottom-up as its own content
//! followed by its children's totals, so the chunker can make size decisions
//! on whole subtrees without re-walking them.

use tracing::{debug, instrument, trace};

use mdchunk_shared::Section;

use crate::tokenizer::Token;

/// Build the section forest for a document.
///
/// `source` is only used by the headingless fallback, where the whole
/// document becomes a single section titled by its first text run.
#[instrument(skip_all, fields(tokens = tokens.len()))]
pub fn build_forest(source: &str, tokens: &[Token]) -> Vec<Section> {
    if !tokens.iter().any(Token::is_heading_open) {
        return headingless(source, tokens);
    }

    let mut builder = TreeBuilder { tokens, pos: 0 };
    let (forest, _) = builder.build_level(0);
    debug!(roots = forest.len(), "section forest built");
    forest
}

/// Join `next` onto `prefix` with a newline, unless `prefix` is empty.
pub fn splice(prefix: &str, next: &str) -> String {
    if prefix.is_empty() {
        next.to_string()
    } else {
        format!("{prefix}\n{next}")
    }
}

fn headingless(source: &str, tokens: &[Token]) -> Vec<Section> {
    let first_text = tokens.iter().find_map(|token| match token {
        Token::Inline { content } => Some(content),
        _ => None,
    });

    match first_text {
        Some(title) => {
            debug!("no headings found, using the whole document as one section");
            vec![Section::leaf(title.clone(), source)]
        }
        None => {
            debug!("document has no headings and no text");
            Vec::new()
        }
    }
}

struct TreeBuilder<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl TreeBuilder<'_> {
    /// Build every consecutive section deeper than `parent_level`.
    ///
    /// Returns the sections plus the running aggregate of their totals,
    /// which becomes the tail of the parent's `total`.
    fn build_level(&mut self, parent_level: u8) -> (Vec<Section>, String) {
        let mut sections = Vec::new();
        let mut aggregate = String::new();

        while let Some(level) = self.next_heading_level() {
            if level <= parent_level {
                break;
            }

            let (title, content) = self.read_section();
            let children = match self.next_heading_level() {
                Some(next) if next > level => {
                    let (children, below) = self.build_level(level);
                    Some((children, below))
                }
                _ => None,
            };

            let section = match children {
                Some((children, below)) => Section {
                    total: splice(&content, &below),
                    title,
                    content,
                    children,
                },
                None => Section::leaf(title, content),
            };

            trace!(
                level,
                title = %section.title,
                children = section.children.len(),
                "section closed"
            );
            aggregate = splice(&aggregate, &section.total);
            sections.push(section);
        }

        (sections, aggregate)
    }

    /// Level of the next heading, skipping any tokens in front of it.
    fn next_heading_level(&mut self) -> Option<u8> {
        while let Some(token) = self.tokens.get(self.pos) {
            if let Token::HeadingOpen { level, .. } = token {
                return Some(*level);
            }
            self.pos += 1;
        }
        None
    }

    /// Consume one heading and the body up to the next heading.
    ///
    /// Content is the heading markup, a space, the title, then every text run
    /// and rebuilt fence on its own line.
    fn read_section(&mut self) -> (String, String) {
        let markup = match self.tokens.get(self.pos) {
            Some(Token::HeadingOpen { markup, .. }) => markup.as_str(),
            _ => "",
        };
        self.pos += 1;

        let mut title = String::new();
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::Inline { content } => {
                    title = content.clone();
                    self.pos += 1;
                    break;
                }
                Token::HeadingOpen { .. } => break,
                _ => self.pos += 1,
            }
        }

        let mut content = format!("{markup} {title}");
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::HeadingOpen { .. } => break,
                Token::Inline { content: text } => {
                    content.push('\n');
                    content.push_str(text);
                }
                Token::Fence {
                    markup,
                    info,
                    content: body,
                } => {
                    content.push('\n');
                    content.push_str(&Token::fence_text(markup, info, body));
                }
                Token::HeadingClose { .. } | Token::Other => {}
            }
            self.pos += 1;
        }

        (title, content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
