//! Project indexing orchestrator: walk → parse → chunk → build.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::chunker::{Chunk, ChunkerConfig, chunk_parsed};
use crate::embedding::Embedder;
use crate::error::{IndexError, Result};
use crate::index::CodeIndex;
use crate::languages::{Lang, detect_language};
use crate::parser::{CodeParser, ParserConfig, SourceFile};

/// Directories never descended into, on top of `.gitignore` rules.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".vscode",
    "build",
    "dist",
];

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub parser: ParserConfig,
    pub chunker: ChunkerConfig,
    /// Files parsed in parallel (default: 8).
    pub concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            chunker: ChunkerConfig::default(),
            concurrency: 8,
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Default, Clone)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub files_with_syntax_errors: usize,
    pub functions: usize,
    pub classes: usize,
    pub chunks_created: usize,
    pub languages: BTreeSet<Lang>,
    /// Languages seen in the corpus but without a usable grammar.
    pub unsupported: BTreeSet<Lang>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

struct FileOutcome {
    language: Lang,
    functions: usize,
    classes: usize,
    has_syntax_errors: bool,
    chunks: Vec<Chunk>,
}

/// Orchestrates a full index build over a project tree or a set of files.
pub struct CodeIndexer<E: Embedder + ?Sized + 'static> {
    parser: Arc<CodeParser>,
    index: Arc<CodeIndex<E>>,
    config: IndexerConfig,
    cancel: CancellationToken,
}

impl<E: Embedder + ?Sized + 'static> CodeIndexer<E> {
    #[must_use]
    pub fn new(parser: CodeParser, index: Arc<CodeIndex<E>>, config: IndexerConfig) -> Self {
        Self {
            parser: Arc::new(parser),
            index,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort parsing and skip the build when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<CodeIndex<E>> {
        &self.index
    }

    /// Walk `root`, parse every recognized source file and rebuild the index.
    ///
    /// Unreadable or unparsable files are skipped and listed in
    /// [`IndexReport::errors`].
    ///
    /// # Errors
    ///
    /// Returns an error if the run is cancelled or the index build fails.
    pub async fn index_project(&self, root: &Path) -> Result<IndexReport> {
        let start = Instant::now();
        let mut report = IndexReport::default();

        let mut paths: Vec<_> = ignore::WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .filter_entry(|e| {
                let is_dir = e.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir && e.file_name().to_str().is_some_and(|n| SKIP_DIRS.contains(&n)))
            })
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|e| detect_language(e.path()).map(|lang| (e.into_path(), lang)))
            .collect();
        paths.sort();

        tracing::info!(root = %root.display(), files = paths.len(), "indexing started");

        let mut sources = Vec::with_capacity(paths.len());
        for (path, language) in paths {
            report.files_scanned += 1;
            let rel_path = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            match read_source(&path).await {
                Ok(text) => sources.push(SourceFile::new(rel_path, language, text)),
                Err(e) if e.is_file_level() => {
                    tracing::warn!(file = %rel_path, "skipping unreadable file: {e}");
                    report.files_skipped += 1;
                    report.errors.push(format!("{rel_path}: {e}"));
                }
                Err(e) => return Err(e),
            }
        }

        self.run(sources, report, start).await
    }

    /// Parse and index an explicit set of files.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is cancelled or the index build fails.
    pub async fn index_sources(&self, sources: Vec<SourceFile>) -> Result<IndexReport> {
        let report = IndexReport {
            files_scanned: sources.len(),
            ..IndexReport::default()
        };
        self.run(sources, report, Instant::now()).await
    }

    async fn run(
        &self,
        sources: Vec<SourceFile>,
        mut report: IndexReport,
        start: Instant,
    ) -> Result<IndexReport> {
        let registry = self.parser.registry();
        let mut supported = Vec::with_capacity(sources.len());
        for source in sources {
            if registry.is_supported(source.language) {
                supported.push(source);
            } else {
                if report.unsupported.insert(source.language) {
                    tracing::warn!(language = %source.language, "no grammar, skipping files");
                }
                report.files_skipped += 1;
                report
                    .errors
                    .push(format!("{}: unsupported language: {}", source.path, source.language));
            }
        }

        let outcomes = self.parse_all(supported, &mut report).await?;

        let mut chunks = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            report.files_parsed += 1;
            report.functions += outcome.functions;
            report.classes += outcome.classes;
            report.languages.insert(outcome.language);
            if outcome.has_syntax_errors {
                report.files_with_syntax_errors += 1;
            }
            chunks.extend(outcome.chunks);
        }
        report.chunks_created = chunks.len();

        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || index.build(chunks))
            .await
            .map_err(|e| IndexError::Other(format!("index build task failed: {e}")))??;

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            parsed = report.files_parsed,
            skipped = report.files_skipped,
            chunks = report.chunks_created,
            duration_ms = report.duration_ms,
            "indexing finished"
        );
        Ok(report)
    }

    /// Parse files on the blocking pool, at most `concurrency` at a time.
    /// Outcomes come back in input order; `None` marks a skipped file.
    async fn parse_all(
        &self,
        sources: Vec<SourceFile>,
        report: &mut IndexReport,
    ) -> Result<Vec<Option<FileOutcome>>> {
        let limit = self.config.concurrency.max(1);
        let mut outcomes: Vec<Option<FileOutcome>> = Vec::new();
        outcomes.resize_with(sources.len(), || None);

        let mut pending = sources.into_iter().enumerate();
        let mut join_set = JoinSet::new();

        loop {
            while join_set.len() < limit {
                let Some((idx, source)) = pending.next() else {
                    break;
                };
                let parser = Arc::clone(&self.parser);
                let chunker = self.config.chunker.clone();
                let cancel = self.cancel.clone();
                join_set.spawn_blocking(move || {
                    let result = parse_one(&parser, &source, &chunker, &cancel);
                    (idx, source.path, result)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (idx, path, result) =
                joined.map_err(|e| IndexError::Other(format!("parse task failed: {e}")))?;

            match result {
                Ok(outcome) => outcomes[idx] = Some(outcome),
                Err(e) if e.is_file_level() => {
                    tracing::warn!(file = %path, "skipping file: {e}");
                    report.files_skipped += 1;
                    report.errors.push(format!("{path}: {e}"));
                }
                Err(e) => return Err(e),
            }
        }

        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        Ok(outcomes)
    }
}

async fn read_source(path: &Path) -> Result<String> {
    Ok(tokio::fs::read_to_string(path).await?)
}

fn parse_one(
    parser: &CodeParser,
    source: &SourceFile,
    chunker: &ChunkerConfig,
    cancel: &CancellationToken,
) -> Result<FileOutcome> {
    let parsed = parser.parse_with_cancel(&source.text, source.language, Some(cancel))?;
    if !parsed.complete {
        tracing::debug!(file = %source.path, entities = parsed.entities.len(), "walk stopped early");
    }
    let chunks = chunk_parsed(&source.path, &parsed, chunker);
    tracing::debug!(
        file = %source.path,
        functions = parsed.functions().count(),
        classes = parsed.classes().count(),
        chunks = chunks.len(),
        "parsed"
    );
    Ok(FileOutcome {
        language: parsed.language,
        functions: parsed.functions().count(),
        classes: parsed.classes().count(),
        has_syntax_errors: parsed.has_syntax_errors,
        chunks,
    })
}
