//! Pipeline runner.
//!
//! Drives ready documents through the selected steps, one document at a
//! time. Every document gets claimed (status `start` plus an open action
//! row) in its own committed transaction before any work happens, and all
//! results of a step land in a single transaction afterwards. A crash
//! therefore leaves either a claimed-but-unfinished document (visible in
//! the action table) or a fully recorded outcome, never half of one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::classify::{Classifier, RuleTable};
use crate::collab::{CollabError, Granularity};
use crate::config::Config;
use crate::db::action_repo::{self, ActionOutput};
use crate::db::document_repo::{self, DocumentCounts, DocumentRow, NewDocument};
use crate::db::{self, content_repo, run_repo, stats_repo, Database, DatabaseError};
use crate::error::Result;
use crate::inbox::{InboxScanner, InputKind};
use crate::parse;
use crate::pdf;
use crate::pipeline::{Collaborators, Step, StepContext, StepError, PIPELINE};
use crate::tokenize::{self, Tokenizer};

type StepResult<T = Outcome> = std::result::Result<T, StepError>;

/// Counters accumulated over one run, mirrored into the `run` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub run_id: i64,
    /// Documents picked up, including any skipped by a shutdown request.
    pub selected: i64,
    pub ok: i64,
    pub errors: i64,
    pub children: i64,
    /// Documents still waiting in `ready` when the run closed.
    pub ready: i64,
}

/// What a step handler hands back for persistence.
#[derive(Default)]
struct Outcome {
    /// Output file facts recorded on the action; `no_children` is filled
    /// in from `children` at finalization.
    output: ActionOutput,
    /// Derived documents, each entering its own next step as `ready`.
    children: Vec<NewDocument>,
    /// Move the processed document itself to this (step, status) instead
    /// of ending it. Used by steps that do not derive a new file.
    advance: Option<(Step, &'static str)>,
    /// Sibling documents consumed by a merge, finished alongside.
    merged_siblings: Vec<i64>,
    /// Intermediate files to delete once the transaction has committed.
    cleanup: Vec<PathBuf>,
    /// Line statistics, keyed by the document they belong to.
    counts: Option<(i64, DocumentCounts)>,
    /// Extracted page texts, keyed likewise.
    page_texts: Option<(i64, Vec<(u32, String)>)>,
    /// Token JSON per page, keyed likewise.
    tokens: Option<(i64, Vec<(u32, String)>)>,
}

/// Single-threaded pipeline runner over one database.
pub struct Runner {
    db: Database,
    config: Config,
    collaborators: Collaborators,
    classifier: Classifier,
    tokenizer: Tokenizer,
    shutdown: Arc<AtomicBool>,
}

impl Runner {
    /// Production runner: external tools resolved from the config.
    pub fn new(db: Database, config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config.collaborators);
        Self::with_collaborators(db, config, collaborators)
    }

    /// Runner with explicit collaborators, so tests can substitute fakes.
    pub fn with_collaborators(
        db: Database,
        config: Config,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let rules = match &config.rules_file {
            Some(path) => RuleTable::load(Path::new(path))?,
            None => RuleTable::default(),
        };
        let classifier = Classifier::new(&rules, config.classify.clone())?;

        Ok(Self {
            db,
            config,
            collaborators,
            classifier,
            tokenizer: Tokenizer::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that asks the runner to stop between documents. Never
    /// interrupts a document mid-step.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Executes the selected steps in pipeline order and closes the run
    /// row with the final counters. Inbox scanning happens up front when
    /// the inbox step is selected.
    pub fn run(&mut self, steps: &[Step]) -> Result<RunSummary> {
        let selection = selection_label(steps);
        let _span = info_span!("run", selection = %selection).entered();

        self.check_environment(steps)?;

        if steps.contains(&Step::Inbox) {
            let scanner =
                InboxScanner::new(&self.config.inbox_directory, self.config.language.as_str());
            let registered = scanner.scan(&self.db)?;
            if !registered.is_empty() {
                info!("Registered {} new inbox document(s)", registered.len());
            }
        }

        let run_id = self.db.with_conn(|conn| run_repo::start(conn, &selection))?;
        let mut summary = RunSummary {
            run_id,
            ..Default::default()
        };

        for step in steps {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!("Shutdown requested, stopping before step {}", step);
                break;
            }
            self.process_step(run_id, *step, &mut summary)?;
        }

        summary.ready = self.db.with_conn(document_repo::count_ready)?;
        self.db
            .with_conn(|conn| run_repo::finish(conn, run_id, summary.ready))?;

        info!(
            "Run {} finished: {} selected, {} ok, {} errors, {} children, {} still ready",
            run_id, summary.selected, summary.ok, summary.errors, summary.children, summary.ready
        );
        Ok(summary)
    }

    /// Verifies the external binaries behind the selected steps before
    /// any document is claimed.
    fn check_environment(&self, steps: &[Step]) -> Result<()> {
        for step in steps {
            match step {
                Step::Pandoc => self.collaborators.convert.check()?,
                Step::Pdf2Image => self.collaborators.rasterize.check()?,
                Step::Tesseract => self.collaborators.ocr.check()?,
                Step::Pdflib => self.collaborators.extract.check()?,
                _ => {}
            }
        }
        Ok(())
    }

    fn process_step(&mut self, run_id: i64, step: Step, summary: &mut RunSummary) -> Result<()> {
        let _span = info_span!("step", step = %step).entered();

        let documents = match step {
            Step::Reunite => self.select_reunite_leads()?,
            _ => self
                .db
                .with_conn(|conn| document_repo::select_eligible(conn, step.as_str()))?,
        };
        if documents.is_empty() {
            debug!("No documents ready");
            return Ok(());
        }

        info!("Processing {} document(s)", documents.len());
        self.db
            .with_conn(|conn| run_repo::add_selected(conn, run_id, documents.len() as i64))?;
        summary.selected += documents.len() as i64;

        let total = documents.len();
        for (done, document) in documents.into_iter().enumerate() {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!(
                    "Shutdown requested, leaving {} document(s) at {}",
                    total - done,
                    step
                );
                break;
            }
            self.process_document(run_id, step, document, summary)?;
        }
        Ok(())
    }

    /// One lead per lineage with at least two documents waiting to merge.
    /// The lead is the lowest id; the remaining siblings are re-read at
    /// processing time, after the lead has been claimed.
    fn select_reunite_leads(&self) -> Result<Vec<DocumentRow>> {
        let leads = self.db.with_conn(|conn| {
            let step = Step::Reunite.as_str();
            let mut leads = Vec::new();
            for base_id in document_repo::reunite_groups(conn, step)? {
                let mut siblings = document_repo::pending_siblings(conn, base_id, step)?;
                if !siblings.is_empty() {
                    leads.push(siblings.remove(0));
                }
            }
            Ok(leads)
        })?;
        Ok(leads)
    }

    fn process_document(
        &mut self,
        run_id: i64,
        step: Step,
        document: DocumentRow,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let _span =
            info_span!("document", id = document.id, file = %document.file_name).entered();

        // Claim first and commit. A crash mid-step leaves the claim and
        // the open action behind as evidence of what was being attempted.
        let parent_action = self
            .db
            .with_conn(|conn| action_repo::last_for_document(conn, document.id))?;
        let action_id = self.db.with_tx(|conn| {
            document_repo::set_status(conn, document.id, "start")?;
            action_repo::start(conn, run_id, document.id, step.as_str(), parent_action)
        })?;

        let ctx = StepContext::new(run_id, step, document, action_id);
        match self.dispatch(&ctx) {
            Ok(outcome) => self.finalize_ok(&ctx, outcome, summary),
            // Recording errors is pointless when the recorder itself is
            // broken, and a missing binary would fail every following
            // document the same way. Both end the run instead.
            Err(StepError::Database(e)) => Err(e.into()),
            Err(StepError::Collaborator(e @ CollabError::Unavailable { .. })) => Err(e.into()),
            Err(err) => self.finalize_error(&ctx, err, summary),
        }
    }

    fn dispatch(&mut self, ctx: &StepContext) -> StepResult {
        match ctx.step {
            Step::Inbox => self.step_inbox(ctx),
            Step::Pandoc => self.step_pandoc(ctx),
            Step::Pdf2Image => self.step_pdf2image(ctx),
            Step::Tesseract => self.step_tesseract(ctx),
            Step::Reunite => self.step_reunite(ctx),
            Step::Pdflib => self.step_pdflib(ctx),
            Step::Parser => self.step_parser(ctx),
            Step::Tokenize => self.step_tokenize(ctx),
            Step::Done => Ok(Outcome::default()),
        }
    }

    /// Persists a successful outcome in one transaction: children,
    /// merged siblings, counts, content, the document transition, the
    /// action close, run counters and the daily statistic.
    fn finalize_ok(
        &self,
        ctx: &StepContext,
        outcome: Outcome,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let duration_ms = ctx.started.elapsed().as_millis() as i64;
        let child_count = outcome.children.len() as i64;
        let mut output = outcome.output;
        output.no_children = child_count;

        self.db.with_tx(|conn| {
            for child in &outcome.children {
                document_repo::create_child(conn, child)?;
            }
            for id in &outcome.merged_siblings {
                document_repo::set_status(conn, *id, "end")?;
            }
            if let Some((id, counts)) = &outcome.counts {
                document_repo::update_counts(conn, *id, counts)?;
            }
            if let Some((id, texts)) = &outcome.page_texts {
                for (page_no, text) in texts {
                    content_repo::upsert_page_text(conn, *id, *page_no, text)?;
                }
            }
            if let Some((id, rows)) = &outcome.tokens {
                for (page_no, json) in rows {
                    content_repo::upsert_tokens(conn, *id, *page_no, json)?;
                }
            }
            match outcome.advance {
                Some((step, status)) => {
                    document_repo::advance_step(conn, ctx.document.id, step.as_str(), status)?
                }
                None => document_repo::set_status(conn, ctx.document.id, "end")?,
            }
            action_repo::finish_ok(conn, ctx.action_id, &output)?;
            run_repo::add_ok(conn, ctx.run_id, child_count)?;
            stats_repo::record_step(conn, &db::today(), ctx.step.as_str(), true, duration_ms)?;
            Ok(())
        })?;

        summary.ok += 1;
        summary.children += child_count;

        // Consumed intermediates are removed only after the commit; a
        // failure here costs disk space, not correctness.
        for path in &outcome.cleanup {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }

        debug!("Step {} finished in {} ms", ctx.step, duration_ms);
        Ok(())
    }

    fn finalize_error(
        &self,
        ctx: &StepContext,
        err: StepError,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let duration_ms = ctx.started.elapsed().as_millis() as i64;
        let code = err.code(ctx.step);
        let message = err.to_string();
        warn!(
            "Document {} failed at {}: {} ({})",
            ctx.document.id, ctx.step, message, code
        );

        self.db.with_tx(|conn| {
            action_repo::finish_error(conn, ctx.action_id, code, &message)?;
            document_repo::set_status(conn, ctx.document.id, "error")?;
            run_repo::add_error(conn, ctx.run_id)?;
            stats_repo::record_step(conn, &db::today(), ctx.step.as_str(), false, duration_ms)
        })?;

        summary.errors += 1;
        Ok(())
    }

    /// Routes a fresh intake file to its entry step: office formats to
    /// conversion, raster images to rasterization, PDFs with a text
    /// layer straight to extraction, scanned PDFs to rasterization.
    fn step_inbox(&self, ctx: &StepContext) -> StepResult {
        let input = Self::input_path(&ctx.document);
        if !input.is_file() {
            return Err(StepError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "intake file is gone"),
                path: input,
            });
        }

        let mut no_pages = 0;
        let next = match InputKind::from_path(&input) {
            Some(InputKind::Office) => Step::Pandoc,
            Some(InputKind::Image) => Step::Pdf2Image,
            Some(InputKind::Pdf) => {
                no_pages = pdf::page_count(&input)? as i64;
                if pdf::has_text_layer(&input)? {
                    Step::Pdflib
                } else {
                    Step::Pdf2Image
                }
            }
            None => {
                return Err(StepError::Io {
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "unsupported file type",
                    ),
                    path: input,
                })
            }
        };
        debug!("Routing {} to {}", ctx.document.file_name, next);

        Ok(Outcome {
            output: Self::recorded_output(&input, no_pages)?,
            advance: Some((next, "ready")),
            ..Default::default()
        })
    }

    /// Converts an office document to PDF. The PDF becomes a child at
    /// the extraction step; the original is finished.
    fn step_pandoc(&self, ctx: &StepContext) -> StepResult {
        let input = Self::input_path(&ctx.document);
        let work = self.ensure_work_dir(ctx.document.base_id)?;
        let output = work.join(format!("{}.pdf", Self::file_stem(&ctx.document.file_name)));
        Self::guard_fresh(&output)?;

        self.collaborators
            .convert
            .convert_to_pdf(&input, &output, &ctx.document.language)?;

        let no_pages = pdf::page_count(&output)? as i64;
        Ok(Outcome {
            output: Self::recorded_output(&output, no_pages)?,
            children: vec![Self::child_for(ctx, Step::Pdflib, &output)],
            ..Default::default()
        })
    }

    /// Rasterizes a scanned PDF (or normalizes a lone image) into one
    /// PNG child per page, each waiting for OCR.
    fn step_pdf2image(&self, ctx: &StepContext) -> StepResult {
        let input = Self::input_path(&ctx.document);
        let work = self.ensure_work_dir(ctx.document.base_id)?;
        let prefix = work.join(Self::file_stem(&ctx.document.file_name));

        let pattern = format!(
            "{}-*.png",
            glob::Pattern::escape(&prefix.display().to_string())
        );
        if Self::glob_matches_any(&pattern)? {
            return Err(StepError::Duplicate(pattern));
        }

        let pages = self.collaborators.rasterize.rasterize(&input, &prefix)?;

        let children = pages
            .iter()
            .map(|page| Self::child_for(ctx, Step::Tesseract, &page.path))
            .collect();
        Ok(Outcome {
            output: ActionOutput {
                directory: Some(work.display().to_string()),
                no_pages: pages.len() as i64,
                ..Default::default()
            },
            children,
            ..Default::default()
        })
    }

    /// OCRs one page image into a searchable PDF child. The child waits
    /// for the merge while sibling pages exist, otherwise goes straight
    /// to extraction. The consumed image is deleted.
    fn step_tesseract(&self, ctx: &StepContext) -> StepResult {
        let input = Self::input_path(&ctx.document);
        let work = self.ensure_work_dir(ctx.document.base_id)?;
        let output = work.join(format!(
            "{}.ocr.pdf",
            Self::file_stem(&ctx.document.file_name)
        ));
        Self::guard_fresh(&output)?;

        let pattern = glob::Pattern::escape(&input.display().to_string());
        let consumed = self
            .collaborators
            .ocr
            .ocr_to_pdf(&pattern, &output, &ctx.document.language)?;

        let siblings = self
            .db
            .with_conn(|conn| document_repo::count_children(conn, ctx.document.parent_id))?;
        let next = if siblings > 1 {
            Step::Reunite
        } else {
            Step::Pdflib
        };

        let no_pages = pdf::page_count(&output)? as i64;
        Ok(Outcome {
            output: Self::recorded_output(&output, no_pages)?,
            children: vec![Self::child_for(ctx, next, &output)],
            cleanup: consumed,
            ..Default::default()
        })
    }

    /// Merges all OCRed page PDFs of one lineage, in page order, into a
    /// single child. Siblings are finished alongside the lead and the
    /// consumed page PDFs deleted.
    fn step_reunite(&self, ctx: &StepContext) -> StepResult {
        let base_id = ctx.document.base_id;
        // The lead was claimed before dispatch, so this returns only the
        // remaining siblings. Ids ascend, which is page order.
        let siblings = self.db.with_conn(|conn| {
            document_repo::pending_siblings(conn, base_id, Step::Reunite.as_str())
        })?;

        let mut inputs = vec![Self::input_path(&ctx.document)];
        inputs.extend(siblings.iter().map(Self::input_path));

        let base = self
            .db
            .with_conn(|conn| document_repo::find_by_id(conn, base_id))?
            .ok_or_else(|| {
                StepError::Database(DatabaseError::Lineage {
                    reason: format!("lineage base {} does not exist", base_id),
                })
            })?;

        let work = self.ensure_work_dir(base_id)?;
        let output = work.join(format!(
            "{}.reunited.pdf",
            Self::file_stem(&base.file_name)
        ));
        Self::guard_fresh(&output)?;

        let page_total = pdf::merge_ordered(&inputs, &output)? as i64;

        Ok(Outcome {
            output: Self::recorded_output(&output, page_total)?,
            children: vec![Self::child_for(ctx, Step::Pdflib, &output)],
            merged_siblings: siblings.iter().map(|d| d.id).collect(),
            cleanup: inputs,
            ..Default::default()
        })
    }

    /// Extracts text and layout into a TETML child document.
    fn step_pdflib(&self, ctx: &StepContext) -> StepResult {
        let input = Self::input_path(&ctx.document);
        let work = self.ensure_work_dir(ctx.document.base_id)?;
        let output = work.join(format!("{}.tetml", Self::file_stem(&ctx.document.file_name)));
        Self::guard_fresh(&output)?;

        self.collaborators
            .extract
            .extract(&input, &output, &self.config.extract)?;

        let no_pages = pdf::page_count(&input)? as i64;
        Ok(Outcome {
            output: Self::recorded_output(&output, no_pages)?,
            children: vec![Self::child_for(ctx, Step::Parser, &output)],
            ..Default::default()
        })
    }

    /// Parses the TETML into page texts and, at line granularity, runs
    /// the line classifier. Texts and counts are recorded on the lineage
    /// base so lookups never depend on which branch produced the TETML.
    /// Counts are written only when at least one line classified.
    fn step_parser(&self, ctx: &StepContext) -> StepResult {
        let input = Self::input_path(&ctx.document);
        let xml = std::fs::read_to_string(&input).map_err(|e| StepError::Io {
            path: input.clone(),
            source: e,
        })?;

        let base_id = ctx.document.base_id;
        let (counts, texts) = if self.config.extract.granularity == Granularity::Line {
            let mut pages = parse::parse_layout(&xml)?;
            let counts = self.classifier.annotate(&mut pages);
            if counts.any_classified() {
                info!(
                    "Classified lines: {} header, {} footer, {} toc, {} list, {} table",
                    counts.lines_header,
                    counts.lines_footer,
                    counts.lines_toc,
                    counts.lists,
                    counts.tables
                );
            }
            let texts = pages.iter().map(|p| (p.number, p.text())).collect();
            (Some(counts), texts)
        } else {
            // Word and page granularity carry no line structure, so
            // there is nothing to classify.
            (
                None,
                parse::parse_page_texts(&xml, self.config.extract.granularity)?,
            )
        };

        Ok(Outcome {
            output: Self::recorded_output(&input, texts.len() as i64)?,
            advance: Some((Step::Tokenize, "ready")),
            counts: counts
                .filter(DocumentCounts::any_classified)
                .map(|c| (base_id, c)),
            page_texts: Some((base_id, texts)),
            ..Default::default()
        })
    }

    /// Tokenizes the stored page texts and persists one token set per
    /// page. Terminal step; the document ends.
    fn step_tokenize(&mut self, ctx: &StepContext) -> StepResult {
        let texts = self
            .db
            .with_conn(|conn| content_repo::page_texts(conn, ctx.document.base_id))?;
        let pipeline_name = self.config.tokenize.pipeline_for(&ctx.document.language);

        let mut rows = Vec::with_capacity(texts.len());
        let mut sentences = 0;
        for (page_no, text) in &texts {
            let records = self.tokenizer.tokenize_page(text, &pipeline_name)?;
            sentences += records.len();
            rows.push((*page_no, tokenize::to_json(&records)?));
        }
        debug!(
            "Tokenized {} sentence(s) over {} page(s)",
            sentences,
            texts.len()
        );

        Ok(Outcome {
            output: ActionOutput {
                no_pages: texts.len() as i64,
                ..Default::default()
            },
            advance: Some((Step::Done, "end")),
            tokens: Some((ctx.document.id, rows)),
            ..Default::default()
        })
    }

    fn work_dir(&self, base_id: i64) -> PathBuf {
        Path::new(&self.config.work_directory).join(base_id.to_string())
    }

    fn ensure_work_dir(&self, base_id: i64) -> StepResult<PathBuf> {
        let dir = self.work_dir(base_id);
        std::fs::create_dir_all(&dir).map_err(|e| StepError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    fn input_path(document: &DocumentRow) -> PathBuf {
        Path::new(&document.directory).join(&document.file_name)
    }

    /// A step never overwrites earlier output. An existing file means
    /// the document was already processed under another run.
    fn guard_fresh(output: &Path) -> StepResult<()> {
        if output.exists() {
            return Err(StepError::Duplicate(output.display().to_string()));
        }
        Ok(())
    }

    fn file_stem(file_name: &str) -> String {
        Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string())
    }

    fn recorded_output(path: &Path, no_pages: i64) -> StepResult<ActionOutput> {
        let size = std::fs::metadata(path)
            .map_err(|e| StepError::Io {
                path: path.to_path_buf(),
                source: e,
            })?
            .len() as i64;
        Ok(ActionOutput {
            directory: path.parent().map(|p| p.display().to_string()),
            file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            file_size: size,
            no_pages,
            no_children: 0,
        })
    }

    fn child_for(ctx: &StepContext, step: Step, path: &Path) -> NewDocument {
        NewDocument {
            parent_id: ctx.document.id,
            base_id: ctx.document.base_id,
            step: step.as_str().to_string(),
            status: "ready".to_string(),
            directory: path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            language: ctx.document.language.clone(),
        }
    }

    fn glob_matches_any(pattern: &str) -> StepResult<bool> {
        let mut paths = glob::glob(pattern).map_err(|e| {
            StepError::Collaborator(CollabError::Pattern {
                pattern: pattern.to_string(),
                source: e,
            })
        })?;
        Ok(paths.any(|entry| entry.is_ok()))
    }
}

/// Label recorded on the run row: "all" for a full-pipeline selection,
/// otherwise the step codes joined by commas.
fn selection_label(steps: &[Step]) -> String {
    if steps == PIPELINE.as_slice() {
        return "all".to_string();
    }
    steps
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
