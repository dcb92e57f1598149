// Key Line expansion into `tree/KLnn-*.md`

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;

use super::fill::extract_answer;
use super::{read_or_empty, write_text, FillOutcome, PerspectiveError};
use crate::kb::markdown::{is_separator_row, row_cells};
use crate::kb::paths::KbPaths;
use crate::kb::text::{list_md_files, strip_code_fences};
use crate::providers::ModelCaller;

const EXPAND_INSTRUCTIONS: &str = "You are an expert in the pyramid principle. From the Key Line thesis, the apex (the parent thesis) and the referenced groups, write the body of the Key Line file.

Output complete Markdown with this structure:

# KLnn: [thesis sentence, same as the input]

> Perspective: [perspective name]
> Parent: apex

## Supporting arguments

### n.1: [thesis sentence]
- Order: time/structure/degree
- Atoms: XX-01, XX-02
- Groups: Gxx

[1-2 sentences of explanation]

### n.2: [thesis sentence]
...

## How the arguments relate

[1-3 sentences on the ordering between the sub-arguments: structure/time/degree]";

static KL_FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"KL\d+[-\w]*\.md").unwrap());
static KL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:KL)?0*(\d+)").unwrap());

/// One row of the Key Line table in `tree/README.md`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLine {
    pub id: String,
    pub thesis: String,
    pub groups: Vec<String>,
    /// Expansion file name inside `tree/`
    pub filename: String,
}

/// Rows whose first cell starts with `KL` and that have a thesis.
pub fn parse_key_line_table(tree: &str) -> Vec<KeyLine> {
    tree.lines()
        .filter(|l| l.trim_start().starts_with('|') && !is_separator_row(l))
        .filter_map(|line| {
            let cells = row_cells(line);
            if cells.len() < 5 || !cells[0].starts_with("KL") || cells[1].is_empty() {
                return None;
            }
            let id = cells[0].to_string();
            let filename = match KL_FILE_RE.find(cells[4]) {
                Some(m) => m.as_str().to_string(),
                None if cells[4].ends_with(".md") && !cells[4].contains('/') => cells[4].to_string(),
                None => format!("{id}-expand.md"),
            };
            Some(KeyLine {
                thesis: cells[1].to_string(),
                groups: cells[3]
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect(),
                filename,
                id,
            })
        })
        .collect()
}

/// Group file for a reference like `G03` or `3`: `G03.md`, else the first `G03-*.md`.
pub fn find_group_file(groups_dir: &Path, group: &str) -> Option<PathBuf> {
    let prefix = if group.starts_with('G') {
        group.to_string()
    } else {
        format!("G{group:0>2}")
    };
    let exact = groups_dir.join(format!("{prefix}.md"));
    if exact.is_file() {
        return Some(exact);
    }
    let dashed = format!("{prefix}-");
    list_md_files(groups_dir)
        .into_iter()
        .find(|f| f.starts_with(&dashed))
        .map(|f| groups_dir.join(f))
}

/// `kl1`, `01`, `KL01-slug` -> `KL01`
fn normalize_kl_id(input: &str) -> String {
    match KL_ID_RE
        .captures(input.trim())
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        Some(n) => format!("KL{n:02}"),
        None => input.trim().to_ascii_uppercase(),
    }
}

/// Generate the expansion file of one Key Line.
pub async fn expand_key_line(
    base_dir: &Path,
    perspective: &str,
    kl_id: &str,
    write: bool,
    caller: &dyn ModelCaller,
) -> Result<FillOutcome, PerspectiveError> {
    let paths = KbPaths::new(base_dir);
    let dir = paths.structure_dir.join(perspective);
    let tree_path = dir.join("tree").join("README.md");
    if !tree_path.is_file() {
        return Err(PerspectiveError::TreeMissing(tree_path));
    }

    let key_lines = parse_key_line_table(&read_or_empty(&tree_path)?);
    let wanted = normalize_kl_id(kl_id);
    let Some(kl) = key_lines
        .iter()
        .find(|k| normalize_kl_id(&k.id) == wanted)
    else {
        return Err(PerspectiveError::KeyLineNotFound {
            id: kl_id.to_string(),
            available: key_lines.iter().map(|k| k.id.as_str()).collect::<Vec<_>>().join(", "),
        });
    };

    let apex = extract_answer(&read_or_empty(&dir.join("scqa.md"))?)
        .unwrap_or_else(|| "(apex not found)".to_string());

    let mut group_sections = Vec::new();
    for group in &kl.groups {
        if let Some(path) = find_group_file(&paths.groups_dir, group) {
            group_sections.push(format!("### {group}\n{}", read_or_empty(&path)?));
        }
    }

    let prompt = format!(
        "{EXPAND_INSTRUCTIONS}\n\n---\n\n## Key Line thesis\n{}\n\n## Apex (parent thesis)\n{apex}\n\n\
         ## Referenced groups\n{}\n\nWrite the Key Line file. Perspective: {perspective}",
        kl.thesis,
        group_sections.join("\n\n")
    );
    let raw = caller.call(&prompt).await?;
    let body = strip_code_fences(raw.trim()).trim();
    if body.is_empty() {
        return Err(PerspectiveError::InvalidOutput("empty Key Line expansion".to_string()));
    }

    let content = if body.lines().any(|l| l.starts_with("# ")) {
        format!("{body}\n")
    } else {
        format!(
            "# {}: {}\n\n> Perspective: {perspective}\n> Parent: apex\n\n{body}\n",
            kl.id, kl.thesis
        )
    };

    let path = dir.join("tree").join(&kl.filename);
    if write {
        write_text(&path, &content)?;
        info!("Expanded {} of {} -> {}", kl.id, perspective, path.display());
    }
    Ok(FillOutcome {
        path,
        content,
        written: write,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TREE: &str = "# Pyramid tree

## Key Lines

| ID   | Thesis | Order | Groups | Expansion |
| ---- | ------ | ----- | ------ | --------- |
| KL01 | Structure first | structure | G01, G03 | KL01-structure-first.md |
| KL02 | Review often | time | 2 | (todo) |
| Note | not a key line | - | - | - |
";

    #[test]
    fn test_parse_key_line_table() {
        let kls = parse_key_line_table(TREE);
        assert_eq!(kls.len(), 2);
        assert_eq!(kls[0].id, "KL01");
        assert_eq!(kls[0].groups, vec!["G01", "G03"]);
        assert_eq!(kls[0].filename, "KL01-structure-first.md");
        assert_eq!(kls[1].filename, "KL02-expand.md");
        assert_eq!(kls[1].groups, vec!["2"]);
    }

    #[test]
    fn test_find_group_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("G02-habits.md"), "x").unwrap();
        fs::write(tmp.path().join("G03.md"), "x").unwrap();
        assert_eq!(find_group_file(tmp.path(), "2"), Some(tmp.path().join("G02-habits.md")));
        assert_eq!(find_group_file(tmp.path(), "G03"), Some(tmp.path().join("G03.md")));
        assert_eq!(find_group_file(tmp.path(), "G09"), None);
    }

    #[test]
    fn test_normalize_kl_id() {
        assert_eq!(normalize_kl_id("KL01-structure"), "KL01");
        assert_eq!(normalize_kl_id("02"), "KL02");
        assert_eq!(normalize_kl_id("kl3"), "KL03");
        assert_eq!(normalize_kl_id("intro"), "INTRO");
    }
}
