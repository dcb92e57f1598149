// Read-only status snapshot of a knowledge base

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::discovery::{collect_ungrouped_atom_paths, count_atom_files, discover_journals, list_group_files};
use super::paths::KbPaths;
use super::text::{list_date_dirs, list_md_files};

static PERSPECTIVE_DIR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^P\d+").unwrap());

/// A journal with no atom file, or whose atom file is still a placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnprocessedJournal {
    pub date_dir: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub total_journals: usize,
    pub total_dates: usize,
    /// Atom files, placeholders included
    pub total_atoms: usize,
    pub total_groups: usize,
    pub total_perspectives: usize,
    pub ungrouped_count: usize,
    /// Local date of the synthesis document's last modification
    pub synthesis_modified: Option<NaiveDate>,
    pub unprocessed: Vec<UnprocessedJournal>,
}

/// Collect counts and outstanding work without touching any file.
pub fn get_status(base_dir: &Path) -> Result<Status> {
    let paths = KbPaths::new(base_dir);

    let date_dirs = list_date_dirs(&paths.journal_dir);
    let total_journals = date_dirs
        .iter()
        .map(|d| list_md_files(&paths.journal_dir.join(d)).len())
        .sum();

    let unprocessed = discover_journals(&paths, None)?
        .entries
        .into_iter()
        .map(|e| UnprocessedJournal {
            date_dir: e.date_dir,
            file: e.file_name,
        })
        .collect();

    let total_perspectives = match fs::read_dir(&paths.structure_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter(|e| PERSPECTIVE_DIR_RE.is_match(&e.file_name().to_string_lossy()))
            .count(),
        Err(_) => 0,
    };

    let synthesis_modified = if paths.synthesis.exists() {
        let modified = fs::metadata(&paths.synthesis)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", paths.synthesis.display()))?;
        Some(DateTime::<Local>::from(modified).date_naive())
    } else {
        None
    };

    Ok(Status {
        total_journals,
        total_dates: date_dirs.len(),
        total_atoms: count_atom_files(&paths),
        total_groups: list_group_files(&paths).len(),
        total_perspectives,
        ungrouped_count: collect_ungrouped_atom_paths(&paths)?.len(),
        synthesis_modified,
        unprocessed,
    })
}
