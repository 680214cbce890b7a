//! Markdown tokenizer.
//!
//! Flattens a CommonMark event stream into the tokens the tree builder
//! consumes: headings (open / inline title / close), inline text runs, and
//! fenced blocks. Block structure (lists, block quotes, tables) is resolved
//! by the parser and then dropped; only the text inside it survives.
//!
//! Inline runs keep their raw Markdown source (emphasis, links, code spans),
//! with the container prefixes of continuation lines removed.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// One element of the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Start of a heading. `markup` is the `#` run for its level.
    HeadingOpen { level: u8, markup: String },
    /// A run of literal text: a heading title, a paragraph or a list item.
    Inline { content: String },
    /// End of a heading.
    HeadingClose { level: u8 },
    /// A fenced code block.
    Fence {
        /// The opening fence run, e.g. ```` ``` ```` or `~~~~`.
        markup: String,
        /// Info string after the opening fence (usually a language).
        info: String,
        /// Body lines, each followed by `\n`.
        content: String,
    },
    /// Anything the tree builder ignores (thematic breaks, indented code).
    Other,
}

impl Token {
    /// Whether this token opens a heading.
    pub fn is_heading_open(&self) -> bool {
        matches!(self, Self::HeadingOpen { .. })
    }

    /// Text the fence occupied in the source, rebuilt from its parts.
    pub fn fence_text(markup: &str, info: &str, content: &str) -> String {
        format!("{markup}{info}\n{content}{markup}")
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Tokenize Markdown source into a flat token stream.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut state = State::new(source);
    for (event, range) in Parser::new_ext(source, options).into_offset_iter() {
        state.feed(event, range);
    }
    state.finish()
}

/// A code block that has been opened but not yet closed.
struct OpenCode {
    /// `None` for indented blocks, whose text is dropped.
    fence: Option<(String, String)>,
    body: String,
}

struct State<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    /// Source span of the inline run being collected.
    run: Option<Range<usize>>,
    /// Spans of the block quotes seen so far that may still enclose text.
    quotes: Vec<Range<usize>>,
    code: Option<OpenCode>,
}

impl<'s> State<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            run: None,
            quotes: Vec::new(),
            code: None,
        }
    }

    fn feed(&mut self, event: Event<'_>, range: Range<usize>) {
        if self.code.is_some() {
            match event {
                Event::Text(text) => {
                    if let Some(code) = self.code.as_mut() {
                        code.body.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => self.close_code(),
                _ => {}
            }
            return;
        }

        if is_inline(&event) {
            self.extend_run(range);
            return;
        }

        // Everything below is block structure, which ends the current run.
        match event {
            Event::End(TagEnd::Heading(level)) => {
                let level = level as u8;
                let title = self.take_run().unwrap_or_default();
                self.tokens.push(Token::Inline { content: title });
                self.tokens.push(Token::HeadingClose { level });
            }
            event => {
                self.flush_run();
                self.open_block(event, range);
            }
        }
    }

    fn open_block(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let level = level as u8;
                self.tokens.push(Token::HeadingOpen {
                    level,
                    markup: "#".repeat(usize::from(level)),
                });
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let markup = fence_markup(&self.source[range]);
                self.code = Some(OpenCode {
                    fence: Some((markup, info.trim().to_string())),
                    body: String::new(),
                });
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Indented)) => {
                self.code = Some(OpenCode {
                    fence: None,
                    body: String::new(),
                });
            }
            Event::Start(Tag::BlockQuote(_)) => {
                self.quotes.retain(|quote| quote.end > range.start);
                self.quotes.push(range);
            }
            Event::Rule => self.tokens.push(Token::Other),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Token> {
        if self.code.is_some() {
            self.close_code();
        }
        self.flush_run();
        self.tokens
    }

    fn extend_run(&mut self, range: Range<usize>) {
        self.run = Some(match self.run.take() {
            Some(run) => run.start.min(range.start)..run.end.max(range.end),
            None => range,
        });
    }

    /// Text of the current run with container prefixes removed.
    fn take_run(&mut self) -> Option<String> {
        let run = self.run.take()?;
        let depth = self
            .quotes
            .iter()
            .filter(|quote| quote.contains(&run.start))
            .count();
        Some(inline_text(&self.source[run], depth))
    }

    fn flush_run(&mut self) {
        if let Some(content) = self.take_run().filter(|text| !text.is_empty()) {
            self.tokens.push(Token::Inline { content });
        }
    }

    fn close_code(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };
        match code.fence {
            Some((markup, info)) => {
                let mut content = code.body;
                // An unterminated fence at end of input has no final newline.
                if !content.is_empty() && !content.ends_with('\n') {
                    content.push('\n');
                }
                self.tokens.push(Token::Fence {
                    markup,
                    info,
                    content,
                });
            }
            None => self.tokens.push(Token::Other),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whether an event belongs to inline content rather than block structure.
fn is_inline(event: &Event<'_>) -> bool {
    match event {
        Event::Text(_)
        | Event::Code(_)
        | Event::InlineHtml(_)
        | Event::SoftBreak
        | Event::HardBreak
        | Event::FootnoteReference(_) => true,
        Event::Start(tag) => matches!(
            tag,
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
        ),
        Event::End(tag) => matches!(
            tag,
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
        ),
        _ => false,
    }
}

/// Raw inline source with continuation-line indentation and up to `depth`
/// block-quote markers removed from each line.
fn inline_text(raw: &str, depth: usize) -> String {
    raw.split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim_end()
            } else {
                strip_quote_markers(line, depth).trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_quote_markers(line: &str, depth: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..depth {
        match rest.strip_prefix('>') {
            Some(after) => rest = after.trim_start(),
            None => break,
        }
    }
    rest
}

/// The backtick or tilde run that opens a fenced block.
fn fence_markup(block: &str) -> String {
    let line = block.lines().next().unwrap_or_default();
    let start = line.trim_start_matches([' ', '\t', '>']);
    let marker = start.chars().next().filter(|c| matches!(c, '`' | '~'));
    match marker {
        Some(marker) => start.chars().take_while(|&c| c == marker).collect(),
        None => "```".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
