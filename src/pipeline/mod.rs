// Incremental pipeline: journals -> atoms -> groups -> synthesis
//
// Each run rediscovers outstanding work from disk, so an interrupted run is
// resumed by running again. Model failures and malformed output skip the
// unit with a warning; only filesystem failures abort the run.

pub mod context;
pub mod parse;
pub mod prompts;
pub mod reporter;
pub mod writers;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::kb::discovery::{
    collect_all_atom_paths, collect_ungrouped_atom_paths, discover_journals, find_max_group_number,
    EntryKind, JournalEntry,
};
use crate::kb::paths::KbPaths;
use crate::kb::text::{extract_abbrev, read_lossy, read_optional, strip_code_fences, truncate_chars};
use crate::providers::ModelCaller;

use context::RunContext;
use parse::{audit_candidates, validate_atom_output, DelimitedGroupsParser, GroupsOutputParser};
use prompts::{atom_prompt, condensed_atom_summary, groups_prompt, synthesis_prompt, WriteMode};
use reporter::Reporter;
use writers::{write_atom, write_groups_output, write_synthesis, SynthesisWrite};

pub use reporter::{ConsoleReporter, RecordingReporter, ReportLine};

const PROMPT_PREVIEW_CHARS: usize = 500;
const ERROR_PREVIEW_CHARS: usize = 200;
const RAW_ATOM_PREVIEW_CHARS: usize = 1000;
const RAW_OUTPUT_PREVIEW_CHARS: usize = 2000;

/// Inputs of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub base_dir: PathBuf,
    pub config: Config,
    /// Build and measure every prompt, never call the model or write
    pub dry_run: bool,
    /// Let stages 2 and 3 write group and synthesis files
    pub auto_write: bool,
    /// 1 = atoms, 2 = + groups, 3 = + synthesis
    pub max_stage: u8,
    /// Restrict stage 1 to one journal file name
    pub only_file: Option<String>,
    pub verbose: bool,
}

impl PipelineOptions {
    pub fn new(base_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            base_dir: base_dir.into(),
            config,
            dry_run: false,
            auto_write: false,
            max_stage: 3,
            only_file: None,
            verbose: false,
        }
    }
}

/// What a run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub atoms_processed: usize,
    pub groups_written: usize,
    pub groups_updated: usize,
    pub synthesis_updated: bool,
    pub warnings: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.warnings == 0
    }
}

/// Stage boundaries of a run, each carrying the work it hands on
#[derive(Debug)]
enum PipelineState {
    DiscoverJournals,
    ExtractAtoms(Vec<JournalEntry>),
    CollectForGrouping(Vec<PathBuf>),
    AssignGroups(Vec<PathBuf>),
    CollectForSynthesis(Vec<PathBuf>),
    UpdateSynthesis(Vec<PathBuf>),
    Done,
}

/// Run the pipeline with the delimiter-framed grouping protocol.
pub async fn run_pipeline(
    options: &PipelineOptions,
    caller: &dyn ModelCaller,
    reporter: &dyn Reporter,
) -> Result<RunSummary> {
    run_pipeline_with(options, caller, reporter, &DelimitedGroupsParser).await
}

/// Run the pipeline with a custom grouping output parser.
pub async fn run_pipeline_with(
    options: &PipelineOptions,
    caller: &dyn ModelCaller,
    reporter: &dyn Reporter,
    parser: &dyn GroupsOutputParser,
) -> Result<RunSummary> {
    Pipeline::new(options, caller, reporter, parser).run().await
}

struct Pipeline<'a> {
    options: &'a PipelineOptions,
    caller: &'a dyn ModelCaller,
    reporter: &'a dyn Reporter,
    parser: &'a dyn GroupsOutputParser,
    ctx: RunContext,
    mode: WriteMode,
    today: NaiveDate,
    summary: RunSummary,
}

impl<'a> Pipeline<'a> {
    fn new(
        options: &'a PipelineOptions,
        caller: &'a dyn ModelCaller,
        reporter: &'a dyn Reporter,
        parser: &'a dyn GroupsOutputParser,
    ) -> Self {
        Self {
            options,
            caller,
            reporter,
            parser,
            ctx: RunContext::new(KbPaths::new(&options.base_dir)),
            mode: WriteMode::from_flag(options.auto_write),
            today: Local::now().date_naive(),
            summary: RunSummary::default(),
        }
    }

    fn paths(&self) -> &KbPaths {
        &self.ctx.paths
    }

    fn log(&self, message: impl AsRef<str>) {
        self.reporter.log(message.as_ref());
    }

    fn warn(&mut self, message: impl AsRef<str>) {
        self.summary.warnings += 1;
        self.reporter.warn(message.as_ref());
    }

    async fn run(mut self) -> Result<RunSummary> {
        let o = self.options;
        self.reporter.heading("Incremental pyramid processing");
        self.log(format!(
            "Options: stage={}, dry-run={}, auto-write={}",
            o.max_stage, o.dry_run, o.auto_write
        ));
        self.log(format!("Base directory: {}", o.base_dir.display()));
        info!(stage = o.max_stage, dry_run = o.dry_run, auto_write = o.auto_write, "Pipeline started");

        let mut state = PipelineState::DiscoverJournals;
        loop {
            debug!("Pipeline state: {:?}", state);
            state = match state {
                PipelineState::DiscoverJournals => self.discover()?,
                PipelineState::ExtractAtoms(entries) => self.extract_atoms(entries).await?,
                PipelineState::CollectForGrouping(new_atoms) => self.collect_for_grouping(new_atoms)?,
                PipelineState::AssignGroups(atoms) => self.assign_groups(atoms).await?,
                PipelineState::CollectForSynthesis(grouped) => self.collect_for_synthesis(grouped)?,
                PipelineState::UpdateSynthesis(atoms) => self.update_synthesis(atoms).await?,
                PipelineState::Done => break,
            };
        }

        self.reporter.heading("Done");
        info!(summary = ?self.summary, "Pipeline finished");
        Ok(self.summary)
    }

    // Stage 1: discovery

    fn discover(&mut self) -> Result<PipelineState> {
        self.reporter.heading("Stage 1: discover unprocessed journals");
        let discovery = discover_journals(self.paths(), self.options.only_file.as_deref())?;
        self.ctx = RunContext::new(self.ctx.paths.clone()).with_used_abbrevs(discovery.used_abbrevs);

        let entries = discovery.entries;
        if entries.is_empty() {
            self.log("All journals are processed; nothing to extract.");
            if self.options.max_stage < 2 {
                return Ok(PipelineState::Done);
            }
            return Ok(PipelineState::CollectForGrouping(Vec::new()));
        }

        self.log(format!("Found {} pending entries:\n", entries.len()));
        self.log("  Kind | Date       | File");
        self.log("  ---- | ---------- | ----");
        for e in &entries {
            self.log(format!("  {:<4} | {} | {}", e.kind.label(), e.date_dir, e.file_name));
        }
        self.log("");
        Ok(PipelineState::ExtractAtoms(entries))
    }

    // Stage 1: atom extraction

    async fn extract_atoms(&mut self, entries: Vec<JournalEntry>) -> Result<PipelineState> {
        self.reporter.heading("Stage 1: extract atoms");
        let total = entries.len();
        let mut written = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            self.log(format!("\n[{}/{}] {}: {}", i + 1, total, entry.kind.label(), entry.file_name));
            if let Some(path) = self.process_atom(entry).await? {
                written.push(path);
            }
        }

        self.summary.atoms_processed = written.len();
        self.log(format!(
            "\nStage 1 complete: {}/{} atom files processed",
            written.len(),
            total
        ));

        if self.options.max_stage < 2 {
            return Ok(PipelineState::Done);
        }
        Ok(PipelineState::CollectForGrouping(written))
    }

    async fn process_atom(&mut self, entry: &JournalEntry) -> Result<Option<PathBuf>> {
        let journal = match read_lossy(&entry.journal_path) {
            Ok(journal) => journal,
            Err(e) => {
                self.warn(format!("Failed to read {}: {e}", entry.journal_path.display()));
                return Ok(None);
            }
        };
        let prompt = atom_prompt(entry, &journal, self.ctx.used_abbrevs());
        let prompt_len = prompt.chars().count();

        if self.options.verbose {
            self.log(format!("--- Prompt preview ({prompt_len} chars) ---"));
            self.log(truncate_chars(&prompt, PROMPT_PREVIEW_CHARS));
            self.log("...");
        }

        if self.options.dry_run {
            self.log(format!("[dry-run] Would call the model for {}", entry.stem));
            self.log(format!("[dry-run] Prompt length: {prompt_len} chars"));
            return Ok(None);
        }

        self.log("Calling model...");
        let raw = match self.caller.call(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                self.warn(format!(
                    "Model call failed: {}",
                    truncate_chars(&e.to_string(), ERROR_PREVIEW_CHARS)
                ));
                return Ok(None);
            }
        };
        let output = strip_code_fences(raw.trim()).trim();

        let issues = validate_atom_output(output);
        if !issues.is_empty() {
            let listed = issues.iter().map(|i| i.to_string()).collect::<Vec<_>>();
            self.warn(format!("Output failed validation:\n    {}", listed.join("\n    ")));
            self.log("Skipping write; raw output:");
            self.log(truncate_chars(output, RAW_ATOM_PREVIEW_CHARS));
            return Ok(None);
        }

        let register = match (&entry.abbrev, entry.kind) {
            (Some(_), EntryKind::Fill) => None,
            _ => {
                let Some(abbrev) = extract_abbrev(output) else {
                    self.warn("No abbreviation found in model output; skipping");
                    return Ok(None);
                };
                if self.ctx.is_used(&abbrev) {
                    self.warn(format!(
                        "Model proposed abbreviation {abbrev}, which is already taken; skipping"
                    ));
                    return Ok(None);
                }
                Some(abbrev)
            }
        };

        let path = write_atom(&mut self.ctx, entry, output, register.as_deref())?;
        self.log(format!("✓ Wrote {}", self.paths().display_relative(&path)));
        if let Some(abbrev) = register {
            self.log(format!(
                "Registered abbreviation {abbrev} -> {} in atoms/README.md",
                entry.stem
            ));
        }
        Ok(Some(path))
    }

    // Stage 2: grouping

    fn collect_for_grouping(&mut self, new_atoms: Vec<PathBuf>) -> Result<PipelineState> {
        let atoms = if new_atoms.is_empty() {
            let ungrouped = collect_ungrouped_atom_paths(self.paths())?;
            if !ungrouped.is_empty() {
                self.log(format!(
                    "\nNo new atoms; using {} ungrouped atom files for stages 2/3",
                    ungrouped.len()
                ));
            }
            ungrouped
        } else {
            new_atoms
        };

        if atoms.is_empty() {
            self.log("\nNo atom files; skipping stage 2");
            return Ok(PipelineState::CollectForSynthesis(atoms));
        }
        Ok(PipelineState::AssignGroups(atoms))
    }

    async fn assign_groups(&mut self, atoms: Vec<PathBuf>) -> Result<PipelineState> {
        self.reporter.heading(match self.mode {
            WriteMode::AutoWrite => "Stage 2: update groups",
            WriteMode::Advisory => "Stage 2: grouping suggestions",
        });

        let batch_size = self.options.config.process.batch_size.max(1);
        let batches: Vec<&[PathBuf]> = atoms.chunks(batch_size).collect();
        self.log(format!(
            "{} atom files in {} batches (batch size {})",
            atoms.len(),
            batches.len(),
            batch_size
        ));

        for (bi, batch) in batches.iter().enumerate() {
            let stems = batch.iter().map(|p| file_stem(p)).collect::<Vec<_>>().join(", ");
            self.log(format!("\n--- Batch {}/{} ({stems}) ---", bi + 1, batches.len()));

            let summaries = self.summarize(batch)?;
            let index = read_optional(&self.paths().groups_index)
                .with_context(|| format!("Failed to read {}", self.paths().groups_index.display()))?;
            let max_group = find_max_group_number(self.paths());
            let prompt = groups_prompt(&index, &summaries, max_group, self.today, self.mode);
            let prompt_len = prompt.chars().count();

            if self.options.verbose {
                self.log(format!("Prompt length: {prompt_len} chars"));
            }
            if self.options.dry_run {
                self.log(format!("[dry-run] Prompt length: {prompt_len} chars"));
                continue;
            }

            self.log("Calling model...");
            let output = match self.caller.call(&prompt).await {
                Ok(output) => output,
                Err(e) => {
                    self.warn(format!(
                        "Batch {} call failed: {}",
                        bi + 1,
                        truncate_chars(&e.to_string(), ERROR_PREVIEW_CHARS)
                    ));
                    continue;
                }
            };

            match self.mode {
                WriteMode::AutoWrite => self.apply_groups_output(&output)?,
                WriteMode::Advisory => {
                    self.log("\n--- Grouping suggestions ---\n");
                    self.log(&output);
                }
            }
        }

        match (self.mode, self.options.dry_run) {
            (WriteMode::AutoWrite, _) => self.log(format!(
                "\nStage 2 complete: {} new groups, {} updated",
                self.summary.groups_written, self.summary.groups_updated
            )),
            (WriteMode::Advisory, false) => self.log(
                "\n--- End of suggestions (review them and update the group files by hand) ---",
            ),
            (WriteMode::Advisory, true) => {}
        }
        Ok(PipelineState::CollectForSynthesis(atoms))
    }

    fn apply_groups_output(&mut self, output: &str) -> Result<()> {
        let cleaned = strip_code_fences(output.trim());
        let parsed = self.parser.parse(cleaned);

        for name in &parsed.rejected {
            self.warn(format!("Refusing group file name {name:?}: not a G{{NN}}-slug.md name"));
        }
        if parsed.is_empty() {
            self.warn("Model produced no group blocks; raw output follows:");
            self.log(truncate_chars(cleaned, RAW_OUTPUT_PREVIEW_CHARS));
            return Ok(());
        }

        let report = write_groups_output(self.paths(), &parsed)?;
        for name in &report.created {
            self.log(format!("✓ Created {name}"));
        }
        for name in &report.updated {
            self.log(format!("✓ Updated {name}"));
        }
        for name in &report.unchanged {
            self.log(format!("= Unchanged {name}"));
        }
        if report.index_written {
            self.log(format!(
                "✓ Updated INDEX.md ({} rows added, {} replaced, {} changelog rows)",
                report.index_inserted, report.index_replaced, report.changelog_appended
            ));
        }
        if report.index_ignored > 0 {
            self.warn(format!(
                "{} index rows could not be placed in INDEX.md",
                report.index_ignored
            ));
        }

        self.summary.groups_written += report.created.len();
        self.summary.groups_updated += report.updated.len();
        Ok(())
    }

    // Stage 3: synthesis

    fn collect_for_synthesis(&mut self, grouped: Vec<PathBuf>) -> Result<PipelineState> {
        if self.options.max_stage < 3 {
            return Ok(PipelineState::Done);
        }
        let all = collect_all_atom_paths(self.paths())?;
        let atoms = if all.is_empty() { grouped } else { all };
        if atoms.is_empty() {
            self.log("\nNo atom files; skipping stage 3");
            return Ok(PipelineState::Done);
        }
        Ok(PipelineState::UpdateSynthesis(atoms))
    }

    async fn update_synthesis(&mut self, atoms: Vec<PathBuf>) -> Result<PipelineState> {
        self.reporter.heading(match self.mode {
            WriteMode::AutoWrite => "Stage 3: update synthesis",
            WriteMode::Advisory => "Stage 3: synthesis review",
        });

        let synthesis = read_optional(&self.paths().synthesis)
            .with_context(|| format!("Failed to read {}", self.paths().synthesis.display()))?;
        let index = read_optional(&self.paths().groups_index)
            .with_context(|| format!("Failed to read {}", self.paths().groups_index.display()))?;
        let summaries = self.summarize(&atoms)?;
        let prompt = synthesis_prompt(&synthesis, &index, &summaries, self.today, self.mode);

        if self.options.dry_run {
            let action = match self.mode {
                WriteMode::AutoWrite => "update",
                WriteMode::Advisory => "review",
            };
            self.log(format!("[dry-run] Would call the model to {action} the synthesis"));
            self.log(format!("[dry-run] Prompt length: {} chars", prompt.chars().count()));
            return Ok(PipelineState::Done);
        }

        self.log("Calling model...");
        let output = match self.caller.call(&prompt).await {
            Ok(output) => output,
            Err(e) => {
                self.warn(format!(
                    "Model call failed: {}",
                    truncate_chars(&e.to_string(), ERROR_PREVIEW_CHARS)
                ));
                return Ok(PipelineState::Done);
            }
        };

        match self.mode {
            WriteMode::Advisory => {
                self.log("\n--- Synthesis review ---\n");
                self.log(&output);
                self.log("\n--- End of suggestions (review them and update synthesis.md by hand) ---");
            }
            WriteMode::AutoWrite => {
                let cleaned = strip_code_fences(output.trim());
                match write_synthesis(self.paths(), cleaned)? {
                    SynthesisWrite::Written => {
                        let rel = self.paths().display_relative(&self.paths().synthesis);
                        self.log(format!("✓ Updated {rel}"));
                        self.summary.synthesis_updated = true;
                        for finding in audit_candidates(cleaned) {
                            self.warn(format!("Candidate audit: {finding}"));
                        }
                    }
                    SynthesisWrite::Unchanged => self.log("= synthesis.md unchanged"),
                    SynthesisWrite::Rejected(issues) => {
                        let listed = issues.iter().map(|i| i.to_string()).collect::<Vec<_>>();
                        self.warn(format!(
                            "Model output is not a valid synthesis.md ({}); raw output follows:",
                            listed.join("; ")
                        ));
                        self.log(truncate_chars(cleaned, RAW_OUTPUT_PREVIEW_CHARS));
                    }
                }
            }
        }
        Ok(PipelineState::Done)
    }

    fn summarize(&self, atoms: &[PathBuf]) -> Result<String> {
        let mut parts = Vec::with_capacity(atoms.len());
        for path in atoms {
            let content =
                read_lossy(path).with_context(|| format!("Failed to read {}", path.display()))?;
            parts.push(condensed_atom_summary(path, &content));
        }
        Ok(parts.join("\n\n"))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
