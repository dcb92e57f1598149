// New perspective from `_template`

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use super::{read_or_empty, write_text, PerspectiveError};
use crate::kb::markdown::{append_rows_at_end, TableDoc};
use crate::kb::paths::KbPaths;
use crate::pipeline::writers::CHANGELOG_ANCHOR;

static PERSPECTIVE_NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^P(\d+)").unwrap());
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());

/// A freshly created perspective directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerspective {
    pub number: u32,
    /// `P{NN}-{slug}`
    pub dir_name: String,
    pub path: PathBuf,
    /// Copied files, relative to `path`, sorted
    pub files: Vec<String>,
    pub index_updated: bool,
}

fn max_perspective_number(structure_dir: &Path) -> Result<u32, PerspectiveError> {
    let entries = fs::read_dir(structure_dir).map_err(PerspectiveError::io(structure_dir))?;
    Ok(entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            PERSPECTIVE_NUM_RE
                .captures(&name)
                .and_then(|c| c[1].parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0))
}

fn copy_template(from: &Path, to: &Path) -> Result<Vec<String>, PerspectiveError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| PerspectiveError::Io {
            path: from.to_path_buf(),
            source: e.into(),
        })?;
        let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(PerspectiveError::io(&dest))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(PerspectiveError::io(&dest))?;
            files.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    files.sort();
    Ok(files)
}

/// Create `P{NN}-{slug}` from the template and register it in the structure index.
pub fn new_perspective(
    base_dir: &Path,
    slug: &str,
    name: Option<&str>,
    today: NaiveDate,
) -> Result<NewPerspective, PerspectiveError> {
    let paths = KbPaths::new(base_dir);
    if !SLUG_RE.is_match(slug) {
        return Err(PerspectiveError::InvalidSlug(slug.to_string()));
    }
    if !paths.structure_dir.is_dir() {
        return Err(PerspectiveError::StructureMissing(paths.structure_dir));
    }

    let number = max_perspective_number(&paths.structure_dir)? + 1;
    let dir_name = format!("P{number:02}-{slug}");
    let path = paths.structure_dir.join(&dir_name);
    if path.exists() {
        return Err(PerspectiveError::AlreadyExists(dir_name));
    }
    if !paths.template_dir.is_dir() {
        return Err(PerspectiveError::TemplateMissing(paths.template_dir));
    }

    let files = copy_template(&paths.template_dir, &path)?;
    let display_name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(slug);
    let index_updated = update_perspective_index(&paths, number, &dir_name, display_name, today)?;

    info!("Created perspective {} ({} files)", dir_name, files.len());
    Ok(NewPerspective {
        number,
        dir_name,
        path,
        files,
        index_updated,
    })
}

/// Add the perspective row above `## Changelog` and a changelog row at the end.
///
/// Returns false when there is no structure index to update.
pub fn update_perspective_index(
    paths: &KbPaths,
    number: u32,
    dir_name: &str,
    display_name: &str,
    today: NaiveDate,
) -> Result<bool, PerspectiveError> {
    if !paths.structure_index.is_file() {
        return Ok(false);
    }
    let mut index = read_or_empty(&paths.structure_index)?;

    if let Some(mut doc) = TableDoc::parse(&index, Some(CHANGELOG_ANCHOR)) {
        doc.upsert_row(&format!(
            "| P{number:02} | [{display_name}]({dir_name}/) | (to be filled) | (to be filled) | initialised |"
        ));
        index = doc.render();
    }

    let changelog = format!(
        "| {} | Created {dir_name} | new perspective from template |",
        today.format("%Y-%m-%d")
    );
    index = append_rows_at_end(&index, &[changelog]);

    write_text(&paths.structure_index, &index)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::init_knowledge_base;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn test_new_perspective_numbers_and_registers() {
        let tmp = TempDir::new().unwrap();
        let report = init_knowledge_base(tmp.path(), Some("KB"), today()).unwrap();
        let base = report.base_dir;

        let first = new_perspective(&base, "blog-post", Some("Blog post"), today()).unwrap();
        assert_eq!(first.dir_name, "P01-blog-post");
        assert_eq!(
            first.files,
            vec!["scqa.md", "tree/README.md", "validation.md"]
        );
        assert!(first.index_updated);

        fs::create_dir_all(base.join("pyramid/structure/P07-old")).unwrap();
        let next = new_perspective(&base, "talk", None, today()).unwrap();
        assert_eq!(next.dir_name, "P08-talk");

        let index = fs::read_to_string(base.join("pyramid/structure/INDEX.md")).unwrap();
        let p01 = index.find("| P01 | [Blog post](P01-blog-post/)").unwrap();
        let p08 = index.find("| P08 | [talk](P08-talk/)").unwrap();
        let changelog = index.find("## Changelog").unwrap();
        assert!(p01 < p08 && p08 < changelog);
        assert!(index.trim_end().ends_with("| 2026-03-07 | Created P08-talk | new perspective from template |"));
    }

    #[test]
    fn test_new_perspective_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            new_perspective(tmp.path(), "x", None, today()),
            Err(PerspectiveError::StructureMissing(_))
        ));

        fs::create_dir_all(tmp.path().join("pyramid/structure")).unwrap();
        assert!(matches!(
            new_perspective(tmp.path(), "x", None, today()),
            Err(PerspectiveError::TemplateMissing(_))
        ));
        assert!(matches!(
            new_perspective(tmp.path(), "../evil", None, today()),
            Err(PerspectiveError::InvalidSlug(_))
        ));
    }
}
