//! Chunk generation.
//!
//! Walks the section forest depth-first and emits bounded-size [`Chunk`]s:
//!
//! - A section whose `total` fits the budget becomes one chunk, then borrows
//!   text from its neighbouring siblings (left first) while the result still
//!   fits and the overlap quota lasts.
//! - A section too large to fit is split by lines. If it has children, only
//!   its own content is split here and the walk descends into the children.
//!   Split pieces never get overlap.
//!
//! Text containing a code fence is never split, even when it exceeds the
//! budget.

use tracing::{debug, instrument, trace, warn};

use mdchunk_shared::{Chunk, ChunkOptions, MdChunkError, Result, Section, char_len};

use crate::abort::AbortSignal;
use crate::questions::QuestionSource;

/// Fence markers that disable line splitting.
const FENCE_MARKERS: [&str; 2] = ["```", "~~~"];

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How a generation walk ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every section was visited.
    #[default]
    Complete,
    /// The abort signal fired; `chunks` holds what was finished before it.
    Cancelled,
}

/// A question call that failed. The chunk was kept with its base indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionWarning {
    /// Position of the affected chunk in the output.
    pub chunk_index: usize,
    /// Title path of the affected chunk.
    pub title: String,
    /// Error reported by the question source.
    pub message: String,
}

/// Output of one generation walk.
#[derive(Debug, Clone, Default)]
pub struct ChunkRun {
    /// Chunks in depth-first document order.
    pub chunks: Vec<Chunk>,
    /// Soft failures from question augmentation.
    pub warnings: Vec<QuestionWarning>,
    /// Whether the walk finished.
    pub outcome: RunOutcome,
}

impl ChunkRun {
    /// Whether every section was visited.
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Complete
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for chunk generation.
pub trait ChunkProgress: Send + Sync {
    /// Called after each chunk is finalized, with the running total.
    fn chunk_emitted(&self, count: usize);
    /// Called before asking for questions about a chunk.
    fn questions_requested(&self, title: &str);
}

/// No-op chunk progress.
pub struct SilentProgress;

impl ChunkProgress for SilentProgress {
    fn chunk_emitted(&self, _count: usize) {}
    fn questions_requested(&self, _title: &str) {}
}

/// Stand-in question source for walks without one.
pub struct NoQuestions;

impl QuestionSource for NoQuestions {
    async fn ask(&self, _text: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Chunker
// ---------------------------------------------------------------------------

/// One pending step of the depth-first walk.
struct Frame<'f> {
    siblings: &'f [Section],
    index: usize,
    title_path: String,
}

/// Configured chunk generator.
pub struct Chunker<'a, Q = NoQuestions> {
    options: ChunkOptions,
    questions: Option<&'a Q>,
    abort: Option<AbortSignal>,
    progress: &'a dyn ChunkProgress,
}

impl Chunker<'_, NoQuestions> {
    /// A chunker with no question source, abort signal or progress reporting.
    pub fn new(options: ChunkOptions) -> Self {
        Self {
            options,
            questions: None,
            abort: None,
            progress: &SilentProgress,
        }
    }
}

impl<'a, Q: QuestionSource> Chunker<'a, Q> {
    /// Use `questions` for augmentation when `use_lm` is set.
    pub fn with_questions<R: QuestionSource>(self, questions: &'a R) -> Chunker<'a, R> {
        Chunker {
            options: self.options,
            questions: Some(questions),
            abort: self.abort,
            progress: self.progress,
        }
    }

    /// Stop the walk when `signal` fires.
    pub fn with_abort(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }

    /// Report progress to `progress`.
    pub fn with_progress(mut self, progress: &'a dyn ChunkProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Options this chunker runs with.
    pub fn options(&self) -> &ChunkOptions {
        &self.options
    }

    /// Generate chunks for a forest in depth-first, left-to-right order.
    ///
    /// Only invalid options are an error. Question failures become
    /// [`QuestionWarning`]s and cancellation is reported through
    /// [`ChunkRun::outcome`].
    #[instrument(skip_all, fields(roots = forest.len(), chunk_size = self.options.chunk_size))]
    pub async fn generate(&self, forest: &[Section]) -> Result<ChunkRun> {
        self.options.validate()?;
        if self.options.use_lm && self.questions.is_none() {
            warn!("question augmentation requested without a question source, skipping it");
        }

        let mut run = ChunkRun::default();
        let mut stack: Vec<Frame<'_>> = (0..forest.len())
            .rev()
            .map(|index| Frame {
                siblings: forest,
                index,
                title_path: String::new(),
            })
            .collect();

        while let Some(frame) = stack.pop() {
            if self.aborted() {
                run.outcome = RunOutcome::Cancelled;
                break;
            }

            match self.visit(&frame, &mut stack, &mut run).await {
                Ok(()) => {}
                Err(MdChunkError::Cancelled) => {
                    run.outcome = RunOutcome::Cancelled;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            chunks = run.chunks.len(),
            warnings = run.warnings.len(),
            outcome = ?run.outcome,
            "chunk generation finished"
        );
        Ok(run)
    }

    /// Handle one section: emit what it contributes and queue its children.
    async fn visit<'f>(
        &self,
        frame: &Frame<'f>,
        stack: &mut Vec<Frame<'f>>,
        run: &mut ChunkRun,
    ) -> Result<()> {
        let siblings: &'f [Section] = frame.siblings;
        let section = &siblings[frame.index];
        let title = join_title(&frame.title_path, &section.title);
        let limit = self.options.chunk_size;

        if section.total_len() < limit {
            trace!(title = %title, len = section.total_len(), "section fits in one chunk");
            let mut chunk = Chunk::new(section.total.clone(), title.clone());
            if section.total != section.content {
                chunk.indexes.push(section.content.clone());
            }
            let questions = self.questions_for(&section.total, &title, run).await?;
            chunk.indexes.extend(questions);
            self.expand_overlap(&mut chunk, siblings, frame.index);
            self.push(run, chunk);
            return Ok(());
        }

        if section.has_children() {
            trace!(
                title = %title,
                children = section.children.len(),
                "splitting section head, descending"
            );
            if !section.content.is_empty() {
                self.emit_pieces(&section.content, &title, run).await?;
            }
            stack.extend((0..section.children.len()).rev().map(|index| Frame {
                siblings: &section.children,
                index,
                title_path: title.clone(),
            }));
        } else {
            trace!(title = %title, len = section.total_len(), "splitting leaf section");
            self.emit_pieces(&section.total, &title, run).await?;
        }
        Ok(())
    }

    /// Emit one chunk per split piece of `text`.
    async fn emit_pieces(&self, text: &str, title: &str, run: &mut ChunkRun) -> Result<()> {
        for piece in split_lines(text, self.options.chunk_size) {
            if piece.is_empty() {
                continue;
            }
            let questions = self.questions_for(&piece, title, run).await?;
            let mut chunk = Chunk::new(piece, title);
            chunk.indexes.extend(questions);
            self.push(run, chunk);
        }
        Ok(())
    }

    /// Ask for questions about the chunk about to be pushed.
    ///
    /// Failures are recorded as warnings and yield no questions; only
    /// cancellation is returned as an error.
    async fn questions_for(
        &self,
        text: &str,
        title: &str,
        run: &mut ChunkRun,
    ) -> Result<Vec<String>> {
        let Some(source) = self.questions.filter(|_| self.options.use_lm) else {
            return Ok(Vec::new());
        };
        self.progress.questions_requested(title);

        let answer = match &self.abort {
            Some(signal) => {
                tokio::select! {
                    biased;
                    () = signal.cancelled() => return Err(MdChunkError::Cancelled),
                    answer = source.ask(text) => answer,
                }
            }
            None => source.ask(text).await,
        };

        match answer {
            Ok(questions) => Ok(questions),
            Err(MdChunkError::Cancelled) => Err(MdChunkError::Cancelled),
            Err(e) => {
                warn!(
                    title = %title,
                    error = %e,
                    "question generation failed, keeping chunk without questions"
                );
                run.warnings.push(QuestionWarning {
                    chunk_index: run.chunks.len(),
                    title: title.to_string(),
                    message: e.to_string(),
                });
                Ok(Vec::new())
            }
        }
    }

    /// Widen a fitting chunk with sibling totals, left before right.
    ///
    /// Any merge that would exceed the budget ends the whole expansion.
    fn expand_overlap(&self, chunk: &mut Chunk, siblings: &[Section], index: usize) {
        let limit = self.options.chunk_size;
        let quota = self.options.chunk_overlap;
        let (mut left, mut right) = (0, 0);

        while left + right < quota {
            left += 1;
            if let Some(neighbour) = index.checked_sub(left).and_then(|i| siblings.get(i)) {
                let widened = format!("{}\n{}", neighbour.total, chunk.document.content);
                if char_len(&widened) > limit {
                    break;
                }
                chunk.document.content = widened;
                if left + right == quota {
                    break;
                }
            }

            right += 1;
            if let Some(neighbour) = siblings.get(index + right) {
                let widened = format!("{}\n{}", chunk.document.content, neighbour.total);
                if char_len(&widened) > limit {
                    break;
                }
                chunk.document.content = widened;
            }

            if left > index && index + right >= siblings.len() {
                break;
            }
        }
    }

    fn push(&self, run: &mut ChunkRun, chunk: Chunk) {
        run.chunks.push(chunk);
        self.progress.chunk_emitted(run.chunks.len());
    }

    fn aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(AbortSignal::is_aborted)
    }
}

/// Generate chunks for a forest without question augmentation.
pub async fn generate_chunks(forest: &[Section], options: ChunkOptions) -> Result<ChunkRun> {
    Chunker::new(options).generate(forest).await
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split `text` into pieces of at most `size` characters along line breaks.
///
/// Lines are never broken, so a single line longer than `size` becomes its
/// own oversized piece. Text containing a code fence comes back whole.
/// Joining the pieces with `\n` reproduces `text` exactly.
pub fn split_lines(text: &str, size: usize) -> Vec<String> {
    if contains_fence(text) {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut lines = text.split('\n');
    let mut piece = lines.next().unwrap_or_default().to_string();
    let mut piece_len = char_len(&piece);

    for line in lines {
        let line_len = char_len(line);
        if !piece.is_empty() && piece_len + 1 + line_len > size {
            pieces.push(std::mem::replace(&mut piece, line.to_string()));
            piece_len = line_len;
        } else {
            piece.push('\n');
            piece.push_str(line);
            piece_len += 1 + line_len;
        }
    }
    pieces.push(piece);
    pieces
}

/// Whether `text` contains a fenced-block marker.
pub fn contains_fence(text: &str) -> bool {
    FENCE_MARKERS.iter().any(|marker| text.contains(marker))
}

fn join_title(path: &str, title: &str) -> String {
    if path.is_empty() {
        title.to_string()
    } else {
        format!("{path} {title}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
