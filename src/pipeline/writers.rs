// Incremental writers
//
// Every write is one whole-file `fs::write` of fully formed content. Index
// and registry edits go through `TableDoc` so bytes outside the touched rows
// stay as they were.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::context::RunContext;
use super::parse::{validate_synthesis, GroupsOutput, SynthesisIssue};
use crate::kb::discovery::JournalEntry;
use crate::kb::markdown::{append_rows_at_end, contains_row, row_key, RowChange, TableDoc};
use crate::kb::paths::KbPaths;
use crate::kb::text::{read_lossy, read_optional};

/// Anchor heading that closes the summary table of every index file.
pub const CHANGELOG_ANCHOR: &str = "## Changelog";

static GROUP_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^G\d+$").unwrap());

const FALLBACK_GROUPS_INDEX: &str = "# Groups Index

| Group | Thesis | Atoms | Months |
| ----- | ------ | ----- | ------ |

## Changelog

| Date       | Change | Reason |
| ---------- | ------ | ------ |
";

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write an atom file; when `register` is set, record the abbreviation.
pub fn write_atom(
    ctx: &mut RunContext,
    entry: &JournalEntry,
    content: &str,
    register: Option<&str>,
) -> Result<PathBuf> {
    write_file(&entry.atom_path, &format!("{}\n", content.trim_end()))?;
    if let Some(abbrev) = register {
        ctx.register_abbrev(&entry.stem, abbrev, &entry.month)?;
    }
    Ok(entry.atom_path.clone())
}

/// What [`write_groups_output`] changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupsWriteReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub index_inserted: usize,
    pub index_replaced: usize,
    /// Index rows dropped because their first cell is not a `G{NN}` id
    pub index_ignored: usize,
    pub changelog_appended: usize,
    pub index_written: bool,
}

/// Merge parsed grouping output into group files and the groups index.
///
/// Group files are written whole. Index rows replace the row with the same
/// group id or are added at the end of the summary table above the
/// changelog heading. Changelog rows already present are not repeated, so
/// applying the same payload twice leaves the files as they were.
pub fn write_groups_output(paths: &KbPaths, parsed: &GroupsOutput) -> Result<GroupsWriteReport> {
    let mut report = GroupsWriteReport::default();

    for group in &parsed.groups {
        let path = paths.groups_dir.join(&group.filename);
        let content = format!("{}\n", group.content.trim());
        match read_lossy(&path) {
            Ok(existing) if existing == content => {
                report.unchanged.push(group.filename.clone());
                continue;
            }
            Ok(_) => report.updated.push(group.filename.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.created.push(group.filename.clone())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        }
        write_file(&path, &content)?;
    }

    if parsed.index_rows.is_empty() && parsed.changelog.is_empty() {
        return Ok(report);
    }

    let original = read_optional(&paths.groups_index)
        .with_context(|| format!("Failed to read {}", paths.groups_index.display()))?;
    let mut index = if original.trim().is_empty() {
        FALLBACK_GROUPS_INDEX.to_string()
    } else {
        original.clone()
    };

    let keyed: Vec<&String> = parsed
        .index_rows
        .iter()
        .filter(|row| row_key(row).is_some_and(|k| GROUP_KEY_RE.is_match(k)))
        .collect();
    report.index_ignored = parsed.index_rows.len() - keyed.len();

    if !keyed.is_empty() {
        match TableDoc::parse(&index, Some(CHANGELOG_ANCHOR)) {
            Some(mut doc) => {
                for row in keyed {
                    match doc.upsert_row(row) {
                        RowChange::Inserted => report.index_inserted += 1,
                        RowChange::Replaced => report.index_replaced += 1,
                        RowChange::Unchanged => {}
                    }
                }
                index = doc.render();
            }
            None => report.index_ignored += keyed.len(),
        }
    }

    let fresh: Vec<String> = parsed
        .changelog
        .iter()
        .filter(|row| !contains_row(&index, row))
        .cloned()
        .collect();
    report.changelog_appended = fresh.len();
    index = append_rows_at_end(&index, &fresh);

    if index != original {
        write_file(&paths.groups_index, &index)?;
        report.index_written = true;
    }
    Ok(report)
}

/// Outcome of [`write_synthesis`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisWrite {
    Written,
    /// Valid, and identical to what is already on disk
    Unchanged,
    /// Not a synthesis document; nothing written
    Rejected(Vec<SynthesisIssue>),
}

/// Replace the synthesis document, but only with a valid one.
pub fn write_synthesis(paths: &KbPaths, content: &str) -> Result<SynthesisWrite> {
    let issues = validate_synthesis(content);
    if !issues.is_empty() {
        return Ok(SynthesisWrite::Rejected(issues));
    }

    let content = format!("{}\n", content.trim());
    let existing = read_optional(&paths.synthesis)
        .with_context(|| format!("Failed to read {}", paths.synthesis.display()))?;
    if existing == content {
        return Ok(SynthesisWrite::Unchanged);
    }
    write_file(&paths.synthesis, &content)?;
    Ok(SynthesisWrite::Written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::discovery::EntryKind;
    use crate::pipeline::parse::GroupBlock;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const INDEX: &str = "# Groups Index

| Group | Thesis | Atoms | Months |
| ----- | ------ | ----- | ------ |
| G01   | Old thesis | 2 | 2026-02 |

## Changelog

| Date       | Change | Reason |
| ---------- | ------ | ------ |
| 2026-02-01 | created | init |
";

    fn setup() -> (TempDir, KbPaths) {
        let tmp = TempDir::new().unwrap();
        let paths = KbPaths::new(tmp.path());
        fs::create_dir_all(&paths.groups_dir).unwrap();
        fs::write(&paths.groups_index, INDEX).unwrap();
        (tmp, paths)
    }

    fn payload() -> GroupsOutput {
        GroupsOutput {
            groups: vec![
                GroupBlock {
                    filename: "G01-old.md".into(),
                    content: "# G01: Sharper thesis\n\n| ID | Source | Summary |\n| -- | -- | -- |\n| AA-01 | a | x |".into(),
                },
                GroupBlock {
                    filename: "G02-new.md".into(),
                    content: "# G02: New thesis\n".into(),
                },
            ],
            index_rows: vec![
                "| Group | Thesis | Atoms | Months |".into(),
                "| G01 | Sharper thesis | 3 | 2026-02~03 |".into(),
                "| G02 | New thesis | 1 | 2026-03 |".into(),
            ],
            changelog: vec!["| 2026-03-07 | G01 updated, G02 created | new atoms |".into()],
            rejected: vec![],
        }
    }

    #[test]
    fn test_write_groups_output() {
        let (_tmp, paths) = setup();
        fs::write(paths.groups_dir.join("G01-old.md"), "# G01: Old thesis\n").unwrap();

        let report = write_groups_output(&paths, &payload()).unwrap();
        assert_eq!(report.created, vec!["G02-new.md".to_string()]);
        assert_eq!(report.updated, vec!["G01-old.md".to_string()]);
        assert_eq!(report.index_inserted, 1);
        assert_eq!(report.index_replaced, 1);
        assert_eq!(report.index_ignored, 1);
        assert_eq!(report.changelog_appended, 1);

        let index = fs::read_to_string(&paths.groups_index).unwrap();
        assert_eq!(
            index,
            "# Groups Index

| Group | Thesis | Atoms | Months |
| ----- | ------ | ----- | ------ |
| G01 | Sharper thesis | 3 | 2026-02~03 |
| G02 | New thesis | 1 | 2026-03 |

## Changelog

| Date       | Change | Reason |
| ---------- | ------ | ------ |
| 2026-02-01 | created | init |
| 2026-03-07 | G01 updated, G02 created | new atoms |
"
        );
        assert_eq!(
            fs::read_to_string(paths.groups_dir.join("G02-new.md")).unwrap(),
            "# G02: New thesis\n"
        );
    }

    #[test]
    fn test_write_groups_output_is_idempotent() {
        let (_tmp, paths) = setup();
        write_groups_output(&paths, &payload()).unwrap();
        let index_once = fs::read_to_string(&paths.groups_index).unwrap();
        let g01_once = fs::read_to_string(paths.groups_dir.join("G01-old.md")).unwrap();

        let report = write_groups_output(&paths, &payload()).unwrap();
        assert!(report.created.is_empty() && report.updated.is_empty());
        assert_eq!(report.unchanged.len(), 2);
        assert_eq!(report.index_inserted + report.index_replaced, 0);
        assert_eq!(report.changelog_appended, 0);
        assert!(!report.index_written);

        assert_eq!(fs::read_to_string(&paths.groups_index).unwrap(), index_once);
        assert_eq!(
            fs::read_to_string(paths.groups_dir.join("G01-old.md")).unwrap(),
            g01_once
        );
    }

    #[test]
    fn test_unreadable_group_file_is_an_error() {
        let (_tmp, paths) = setup();
        fs::create_dir_all(paths.groups_dir.join("G02-new.md")).unwrap();
        let err = write_groups_output(&paths, &payload()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read"));
        assert_eq!(fs::read_to_string(&paths.groups_index).unwrap(), INDEX);
    }

    #[test]
    fn test_non_utf8_group_file_counts_as_updated() {
        let (_tmp, paths) = setup();
        fs::write(paths.groups_dir.join("G02-new.md"), [0x23, 0x20, 0xff, 0x0a]).unwrap();
        let report = write_groups_output(&paths, &payload()).unwrap();
        assert_eq!(report.created, vec!["G01-old.md".to_string()]);
        assert_eq!(report.updated, vec!["G02-new.md".to_string()]);
    }

    #[test]
    fn test_g1_does_not_match_g10() {
        let (_tmp, paths) = setup();
        fs::write(
            &paths.groups_index,
            INDEX.replace("| G01   | Old thesis | 2 | 2026-02 |", "| G10 | Ten | 1 | 2026-01 |"),
        )
        .unwrap();
        let parsed = GroupsOutput {
            index_rows: vec!["| G1 | One | 1 | 2026-03 |".into()],
            ..Default::default()
        };
        let report = write_groups_output(&paths, &parsed).unwrap();
        assert_eq!(report.index_inserted, 1);
        let index = fs::read_to_string(&paths.groups_index).unwrap();
        assert!(index.contains("| G10 | Ten | 1 | 2026-01 |"));
        assert!(index.contains("| G1 | One | 1 | 2026-03 |"));
    }

    #[test]
    fn test_missing_index_gets_fallback() {
        let tmp = TempDir::new().unwrap();
        let paths = KbPaths::new(tmp.path());
        let parsed = GroupsOutput {
            index_rows: vec!["| G01 | First | 1 | 2026-03 |".into()],
            changelog: vec!["| 2026-03-07 | created G01 | first run |".into()],
            ..Default::default()
        };
        write_groups_output(&paths, &parsed).unwrap();
        let index = fs::read_to_string(&paths.groups_index).unwrap();
        let row = index.find("| G01 | First").unwrap();
        assert!(row < index.find(CHANGELOG_ANCHOR).unwrap());
        assert!(index.ends_with("| 2026-03-07 | created G01 | first run |\n"));
    }

    #[test]
    fn test_write_atom_registers_new_abbrev() {
        let tmp = TempDir::new().unwrap();
        let paths = KbPaths::new(tmp.path());
        let entry = JournalEntry {
            kind: EntryKind::New,
            stem: "notes".into(),
            file_name: "notes.md".into(),
            date_dir: "2026-03-05".into(),
            month: "2026-03".into(),
            journal_path: paths.journal_dir.join("2026-03-05/notes.md"),
            atom_path: paths.atoms_dir.join("2026-03/notes.md"),
            atom_month_dir: paths.atoms_dir.join("2026-03"),
            abbrev: None,
        };
        let mut ctx = RunContext::new(paths.clone());
        let path = write_atom(&mut ctx, &entry, "# Notes\n\n\n", Some("NT")).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "# Notes\n");
        assert!(ctx.is_used("NT"));
        let registry = fs::read_to_string(&paths.atoms_readme).unwrap();
        assert!(registry.contains("| NT     | notes"));
    }

    #[test]
    fn test_write_synthesis() {
        let tmp = TempDir::new().unwrap();
        let paths = KbPaths::new(tmp.path());
        let doc = "# Synthesis\n\n## Top-level candidates\n\n| ID | Thesis | Groups |\n";

        assert_eq!(write_synthesis(&paths, doc).unwrap(), SynthesisWrite::Written);
        assert_eq!(fs::read_to_string(&paths.synthesis).unwrap(), doc);
        assert_eq!(write_synthesis(&paths, doc).unwrap(), SynthesisWrite::Unchanged);

        assert_eq!(
            write_synthesis(&paths, "Sorry, I cannot help.").unwrap(),
            SynthesisWrite::Rejected(vec![
                SynthesisIssue::MissingTitle,
                SynthesisIssue::MissingCandidates
            ])
        );
        assert_eq!(fs::read_to_string(&paths.synthesis).unwrap(), doc);
    }
}
