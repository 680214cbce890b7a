//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use mdchunk_core::pipeline::{chunk_document, read_document};
use mdchunk_core::{
    AbortHandle, ChunkProgress, ChunkRun, Chunker, OpenRouterModel, QuestionGenerator,
    QuestionSource,
};
use mdchunk_markdown::parse_document;
use mdchunk_shared::{AppConfig, ChunkOptions, init_config, load_config, validate_api_key};
use serde::Serialize;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mdchunk: split Markdown into retrieval-ready chunks.
#[derive(Parser)]
#[command(
    name = "mdchunk",
    version,
    about = "Split Markdown documents into heading-aware chunks for retrieval.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Chunk a Markdown file and print the chunks as JSON.
    Chunk {
        /// Markdown file to chunk.
        file: PathBuf,

        /// Character budget per chunk (overrides config).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Maximum neighbour merges per chunk (overrides config).
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Index each chunk by model-generated questions.
        #[arg(long)]
        use_lm: bool,

        /// Model id for question generation (overrides config).
        #[arg(long)]
        model: Option<String>,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Print the section tree of a Markdown file as JSON.
    Tree {
        /// Markdown file to parse.
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Flags of the `chunk` subcommand.
struct ChunkArgs {
    file: PathBuf,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    use_lm: bool,
    model: Option<String>,
    out: Option<PathBuf>,
    pretty: bool,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mdchunk=info",
        1 => "mdchunk=debug",
        _ => "mdchunk=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Chunk {
            file,
            chunk_size,
            chunk_overlap,
            use_lm,
            model,
            out,
            pretty,
        } => {
            cmd_chunk(ChunkArgs {
                file,
                chunk_size,
                chunk_overlap,
                use_lm,
                model,
                out,
                pretty,
            })
            .await
        }
        Command::Tree { file } => cmd_tree(&file),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_chunk(args: ChunkArgs) -> Result<()> {
    let mut config = load_config()?;
    if let Some(model) = &args.model {
        config.openrouter.default_model = model.clone();
    }
    let options = resolve_options(&config, &args);
    options.validate()?;

    let source = read_document(&args.file)?;
    info!(
        file = %args.file.display(),
        chunk_size = options.chunk_size,
        chunk_overlap = options.chunk_overlap,
        use_lm = options.use_lm,
        "chunking document"
    );

    let (abort, signal) = AbortHandle::new();
    let interrupt = {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current step");
                abort.abort();
            }
        })
    };

    let progress = CliProgress::new();
    let chunker = Chunker::new(options)
        .with_abort(signal)
        .with_progress(&progress);

    let run = if options.use_lm {
        validate_api_key(&config)?;
        let model = OpenRouterModel::from_config(&config.openrouter)?;
        let generator = QuestionGenerator::new(model, config.openrouter.max_prompt_chars);
        let run = run_chunker(&source, &chunker.with_questions(&generator)).await;
        debug!(distinct = generator.cached(), "texts answered by the question model");
        run
    } else {
        run_chunker(&source, &chunker).await
    };
    interrupt.abort();
    progress.finish();
    let run = run?;

    for warning in &run.warnings {
        warn!(
            chunk = warning.chunk_index,
            title = %warning.title,
            error = %warning.message,
            "chunk kept without questions"
        );
    }

    write_json(&run.chunks, args.out.as_deref(), args.pretty)?;

    if !run.is_complete() {
        return Err(eyre!(
            "chunking cancelled, wrote {} partial chunk(s)",
            run.chunks.len()
        ));
    }
    info!(chunks = run.chunks.len(), "done");
    Ok(())
}

async fn run_chunker<Q: QuestionSource>(
    source: &str,
    chunker: &Chunker<'_, Q>,
) -> Result<ChunkRun> {
    Ok(chunk_document(source, chunker).await?)
}

fn cmd_tree(file: &Path) -> Result<()> {
    let source = read_document(file)?;
    let forest = parse_document(&source);
    write_json(&forest, None, true)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Merge config-file chunking settings with command-line overrides.
fn resolve_options(config: &AppConfig, args: &ChunkArgs) -> ChunkOptions {
    let mut options = ChunkOptions::from(config);
    if let Some(size) = args.chunk_size {
        options.chunk_size = size;
    }
    if let Some(overlap) = args.chunk_overlap {
        options.chunk_overlap = overlap;
    }
    options.use_lm |= args.use_lm;
    options
}

fn write_json<T: Serialize + ?Sized>(value: &T, out: Option<&Path>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    match out {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .map_err(|e| eyre!("failed to write {}: {e}", path.display()))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&[
                    "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
                ]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ChunkProgress for CliProgress {
    fn chunk_emitted(&self, count: usize) {
        self.spinner.set_message(format!("{count} chunk(s)"));
    }

    fn questions_requested(&self, title: &str) {
        self.spinner.set_message(format!("Asking questions: {title}"));
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn chunk_args(argv: &[&str]) -> ChunkArgs {
        let cli = Cli::try_parse_from(argv).expect("valid arguments");
        match cli.command {
            Command::Chunk {
                file,
                chunk_size,
                chunk_overlap,
                use_lm,
                model,
                out,
                pretty,
            } => ChunkArgs {
                file,
                chunk_size,
                chunk_overlap,
                use_lm,
                model,
                out,
                pretty,
            },
            _ => panic!("expected chunk command"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let args = chunk_args(&["mdchunk", "chunk", "doc.md", "--chunk-size", "120", "--use-lm"]);
        let options = resolve_options(&AppConfig::default(), &args);
        assert_eq!(options.chunk_size, 120);
        assert_eq!(options.chunk_overlap, 2);
        assert!(options.use_lm);
    }

    #[test]
    fn config_values_apply_without_flags() {
        let args = chunk_args(&["mdchunk", "-v", "chunk", "doc.md"]);
        let mut config = AppConfig::default();
        config.chunking.chunk_overlap = 0;
        config.chunking.use_lm = true;
        let options = resolve_options(&config, &args);
        assert_eq!(options.chunk_size, 500);
        assert_eq!(options.chunk_overlap, 0);
        assert!(options.use_lm);
    }
}
