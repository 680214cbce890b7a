//! Chunk generation and question augmentation for mdchunk.
//!
//! This crate turns the section forest built by `mdchunk-markdown` into
//! retrieval chunks, optionally indexing each one by the questions a language
//! model says it answers.

pub mod abort;
pub mod chunker;
pub mod openrouter;
pub mod pipeline;
pub mod questions;

pub use abort::{AbortHandle, AbortSignal};
pub use chunker::{
    ChunkProgress, ChunkRun, Chunker, NoQuestions, QuestionWarning, RunOutcome, SilentProgress,
    generate_chunks, split_lines,
};
pub use openrouter::OpenRouterModel;
pub use pipeline::{chunk_document, chunk_file};
pub use questions::{Prompt, QuestionGenerator, QuestionSource, TextModel};
