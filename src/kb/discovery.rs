// Discovery: what work is outstanding in a knowledge base
//
// Journals are classified against atom files (new / fill / done) and atoms
// against group files (grouped / ungrouped). All state lives on disk, so a
// run interrupted at any point is resumed by discovering again.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::paths::KbPaths;
use super::text::{
    atom_id_prefixes, contains_placeholder, extract_abbrev, list_date_dirs, list_md_files,
    list_month_dirs, parse_abbrev_table, read_lossy, read_optional, AbbrevTable,
};

static GROUP_FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^G(\d+)").unwrap());

/// Why a journal needs atom extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// No atom file yet; a new abbreviation must be allocated
    New,
    /// Atom file exists but still holds the placeholder
    Fill,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::New => "new",
            EntryKind::Fill => "fill",
        }
    }
}

/// One journal that needs atom extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub kind: EntryKind,
    pub stem: String,
    pub file_name: String,
    /// `YYYY-MM-DD`
    pub date_dir: String,
    /// `YYYY-MM`
    pub month: String,
    pub journal_path: PathBuf,
    pub atom_path: PathBuf,
    pub atom_month_dir: PathBuf,
    /// Registered abbreviation (fill entries only)
    pub abbrev: Option<String>,
}

/// Result of scanning the journal tree
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub entries: Vec<JournalEntry>,
    /// Abbreviations already taken (registry rows plus atom file declarations)
    pub used_abbrevs: BTreeSet<String>,
    pub registry: AbbrevTable,
}

/// Classify every journal against its would-be atom file.
///
/// `only_file` restricts the scan to one journal file name (e.g. `notes.md`).
pub fn discover_journals(paths: &KbPaths, only_file: Option<&str>) -> Result<Discovery> {
    let registry = read_optional(&paths.atoms_readme)
        .with_context(|| format!("Failed to read {}", paths.atoms_readme.display()))?;
    let table = parse_abbrev_table(&registry);

    let mut used_abbrevs = table.used.clone();
    used_abbrevs.extend(declared_abbrevs(paths)?);

    let mut entries = Vec::new();
    for date_dir in list_date_dirs(&paths.journal_dir) {
        let month = date_dir[..7].to_string();
        let atom_month_dir = paths.atoms_dir.join(&month);

        for file_name in list_md_files(&paths.journal_dir.join(&date_dir)) {
            if only_file.is_some_and(|only| only != file_name) {
                continue;
            }
            let stem = file_name.trim_end_matches(".md").to_string();
            let atom_path = atom_month_dir.join(&file_name);

            let (kind, abbrev) = if !atom_path.exists() {
                (EntryKind::New, None)
            } else {
                let content = read_lossy(&atom_path)
                    .with_context(|| format!("Failed to read {}", atom_path.display()))?;
                if !contains_placeholder(&content) {
                    continue;
                }
                let abbrev = table
                    .abbrev_for(&stem)
                    .map(str::to_string)
                    .or_else(|| extract_abbrev(&content));
                (EntryKind::Fill, abbrev)
            };

            entries.push(JournalEntry {
                kind,
                journal_path: paths.journal_dir.join(&date_dir).join(&file_name),
                stem,
                file_name,
                date_dir: date_dir.clone(),
                month: month.clone(),
                atom_path,
                atom_month_dir: atom_month_dir.clone(),
                abbrev,
            });
        }
    }

    Ok(Discovery {
        entries,
        used_abbrevs,
        registry: table,
    })
}

/// Every atom file under a `YYYY-MM` dir, placeholders included, sorted.
fn atom_file_paths(paths: &KbPaths) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for month in list_month_dirs(&paths.atoms_dir) {
        let dir = paths.atoms_dir.join(&month);
        out.extend(list_md_files(&dir).into_iter().map(|f| dir.join(f)));
    }
    out.sort();
    out
}

/// Abbreviations declared inside existing atom files.
fn declared_abbrevs(paths: &KbPaths) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for path in atom_file_paths(paths) {
        let content = read_lossy(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        out.extend(extract_abbrev(&content));
    }
    Ok(out)
}

/// Number of atom files (placeholders included).
pub fn count_atom_files(paths: &KbPaths) -> usize {
    atom_file_paths(paths).len()
}

/// All fully extracted atom files, sorted lexicographically.
pub fn collect_all_atom_paths(paths: &KbPaths) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in atom_file_paths(paths) {
        let content = read_lossy(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if !contains_placeholder(&content) {
            out.push(path);
        }
    }
    Ok(out)
}

/// Group file names (`G{NN}-*.md`), sorted.
pub fn list_group_files(paths: &KbPaths) -> Vec<String> {
    list_md_files(&paths.groups_dir)
        .into_iter()
        .filter(|f| GROUP_FILE_RE.is_match(f))
        .collect()
}

/// Two-letter atom prefixes that appear as rows in any group file.
pub fn collect_grouped_prefixes(paths: &KbPaths) -> Result<BTreeSet<String>> {
    let mut prefixes = BTreeSet::new();
    for file in list_group_files(paths) {
        let path = paths.groups_dir.join(&file);
        let content = read_lossy(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        prefixes.extend(atom_id_prefixes(&content));
    }
    Ok(prefixes)
}

/// Extracted atoms whose abbreviation is not referenced by any group.
///
/// An atom file without an abbreviation line counts as ungrouped.
pub fn collect_ungrouped_atom_paths(paths: &KbPaths) -> Result<Vec<PathBuf>> {
    let grouped = collect_grouped_prefixes(paths)?;
    let mut out = Vec::new();
    for path in collect_all_atom_paths(paths)? {
        let content = read_lossy(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match extract_abbrev(&content) {
            Some(abbrev) if grouped.contains(&abbrev) => {}
            _ => out.push(path),
        }
    }
    Ok(out)
}

/// Highest `G{NN}` number among group file names (0 when none).
pub fn find_max_group_number(paths: &KbPaths) -> u32 {
    list_group_files(paths)
        .iter()
        .filter_map(|f| GROUP_FILE_RE.captures(f))
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}
