// Text and file helpers shared by discovery, prompts and writers
//
// Naming conventions: journal date dirs are `YYYY-MM-DD`, atom month dirs are
// `YYYY-MM`, and `README.md` / `INDEX.md` are never treated as content files.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

/// Sentinel inside an atom file that has been created but not yet extracted.
pub const PLACEHOLDER_MARKER: &str = "(pending extraction)";

/// Returned by [`extract_title`] when a document has no `# ` heading.
pub const UNTITLED: &str = "(untitled)";

static DATE_DIR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static MONTH_DIR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#[ \t]+(.+)$").unwrap());
static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^```(?:markdown|md)?[ \t]*\r?\n((?s:.*?))\r?\n```[ \t]*$").unwrap()
});
static ABBREV_ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|\s*([A-Z]{2})\s*\|\s*(\S+)\s*\|").unwrap());
static ABBREV_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^>\s*Abbrev\s*[:：]\s*([A-Z]{2})\b").unwrap());
static ATOM_ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|\s*([A-Z]{2}-\d{2})\s*\|[^|]*\|\s*([^|]+?)\s*\|").unwrap());
static ATOM_ID_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\s*([A-Z]{2})-\d{2}\s*\|").unwrap());

/// List `YYYY-MM-DD` sub-directories, sorted ascending. Missing dir = empty.
pub fn list_date_dirs(dir: &Path) -> Vec<String> {
    list_dirs_matching(dir, &DATE_DIR_RE)
}

/// List `YYYY-MM` sub-directories, sorted ascending. Missing dir = empty.
pub fn list_month_dirs(dir: &Path) -> Vec<String> {
    list_dirs_matching(dir, &MONTH_DIR_RE)
}

fn list_dirs_matching(dir: &Path, pattern: &Regex) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| pattern.is_match(name))
        .collect();
    names.sort();
    names
}

/// List `.md` files (non-recursive, sorted), excluding `README.md` and `INDEX.md`.
pub fn list_md_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.ends_with(".md") && name != "README.md" && name != "INDEX.md")
        .collect();
    names.sort();
    names
}

/// Read a file as text, replacing invalid UTF-8 sequences with U+FFFD.
pub fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Read a file, treating "not found" as empty content.
pub fn read_optional(path: &Path) -> io::Result<String> {
    match read_lossy(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

/// Title from the first `# ` heading.
pub fn extract_title(content: &str) -> String {
    TITLE_RE
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| UNTITLED.to_string())
}

pub fn contains_placeholder(content: &str) -> bool {
    content.contains(PLACEHOLDER_MARKER)
}

/// True when `path` exists and still carries the placeholder marker.
pub fn is_placeholder(path: &Path) -> bool {
    read_lossy(path)
        .map(|content| contains_placeholder(&content))
        .unwrap_or(false)
}

/// Strip a ```markdown / ```md / ``` fence when the model wrapped its output in one.
pub fn strip_code_fences(text: &str) -> &str {
    match FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text,
    }
}

/// Abbreviation registry parsed from `atoms/README.md`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbrevTable {
    /// Journal column (stem or file name) -> abbreviation
    pub by_journal: BTreeMap<String, String>,
    pub used: BTreeSet<String>,
}

impl AbbrevTable {
    /// Registered abbreviation for a journal stem; accepts rows keyed by `stem` or `stem.md`.
    pub fn abbrev_for(&self, stem: &str) -> Option<&str> {
        self.by_journal
            .get(stem)
            .or_else(|| self.by_journal.get(&format!("{stem}.md")))
            .map(String::as_str)
    }
}

pub fn parse_abbrev_table(content: &str) -> AbbrevTable {
    let mut table = AbbrevTable::default();
    for line in content.lines() {
        if let Some(caps) = ABBREV_ROW_RE.captures(line) {
            table.by_journal.insert(caps[2].to_string(), caps[1].to_string());
            table.used.insert(caps[1].to_string());
        }
    }
    table
}

/// Abbreviation declared by a `> Abbrev: XX` line.
pub fn extract_abbrev(content: &str) -> Option<String> {
    ABBREV_LINE_RE.captures(content).map(|c| c[1].to_string())
}

/// `(id, content)` pairs for every atom row of an atom file.
pub fn atom_rows(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| ATOM_ROW_RE.captures(line))
        .map(|c| (c[1].to_string(), c[2].trim().to_string()))
        .collect()
}

/// Two-letter prefixes of every `| XX-NN |` cell in a document.
pub fn atom_id_prefixes(content: &str) -> impl Iterator<Item = String> + '_ {
    ATOM_ID_CELL_RE
        .captures_iter(content)
        .map(|c| c[1].to_string())
}

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_lossy_replaces_invalid_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.md");
        fs::write(&path, [0x23, 0x20, 0xff, 0xfe, 0x0a]).unwrap();
        assert_eq!(read_lossy(&path).unwrap(), "# \u{fffd}\u{fffd}\n");
        assert_eq!(read_optional(&tmp.path().join("missing.md")).unwrap(), "");
    }

    #[test]
    fn test_list_date_dirs_missing_dir() {
        assert!(list_date_dirs(Path::new("/nonexistent/journal")).is_empty());
    }

    #[test]
    fn test_list_date_dirs_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("2026-01-15")).unwrap();
        fs::create_dir(tmp.path().join("2026-01-01")).unwrap();
        fs::create_dir(tmp.path().join("not-a-date")).unwrap();
        fs::write(tmp.path().join("2026-02-01"), "file, not dir").unwrap();

        assert_eq!(list_date_dirs(tmp.path()), vec!["2026-01-01", "2026-01-15"]);
    }

    #[test]
    fn test_list_month_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("2026-03")).unwrap();
        fs::create_dir(tmp.path().join("2026-03-01")).unwrap();
        assert_eq!(list_month_dirs(tmp.path()), vec!["2026-03"]);
    }

    #[test]
    fn test_list_md_files_excludes_index_files() {
        let tmp = TempDir::new().unwrap();
        for name in ["note.md", "README.md", "INDEX.md", "other.md", "data.txt"] {
            fs::write(tmp.path().join(name), "x").unwrap();
        }
        assert_eq!(list_md_files(tmp.path()), vec!["note.md", "other.md"]);
    }

    #[test]
    fn test_read_optional_missing_is_empty() {
        assert_eq!(read_optional(Path::new("/nonexistent/file.md")).unwrap(), "");
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title("# Hello World\nsome content"), "Hello World");
        assert_eq!(extract_title("intro\n## Sub\n# Real\n"), "Real");
        assert_eq!(extract_title("no heading here"), UNTITLED);
    }

    #[test]
    fn test_is_placeholder() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("atom.md");
        assert!(!is_placeholder(&p));

        fs::write(&p, format!("# Atom\n\n{PLACEHOLDER_MARKER}\n")).unwrap();
        assert!(is_placeholder(&p));

        fs::write(&p, "# Atom\n\nReal content here").unwrap();
        assert!(!is_placeholder(&p));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```markdown\n# Title\ncontent\n```"), "# Title\ncontent");
        assert_eq!(strip_code_fences("```md\n# Title\n```"), "# Title");
        assert_eq!(strip_code_fences("```\n# Title\n```\n"), "# Title");
        assert_eq!(strip_code_fences("plain text"), "plain text");
    }

    #[test]
    fn test_strip_code_fences_round_trip() {
        let inner = "# Title\n\n> Source: x\n\n| ID | Kind |\n| -- | ---- |\n| AB-01 | fact |";
        let fenced = format!("```markdown\n{inner}\n```");
        let once = strip_code_fences(&fenced);
        assert_eq!(once, inner);

        let refenced = format!("```md\n{once}\n```");
        assert_eq!(strip_code_fences(&refenced), inner);
        assert_eq!(strip_code_fences(inner), inner);
    }

    #[test]
    fn test_parse_abbrev_table() {
        let content = [
            "| Abbrev | Journal | Month |",
            "| ------ | ------- | ----- |",
            "| AB | note1 | 2026-03 |",
            "| CD | note2.md | 2026-03 |",
        ]
        .join("\n");
        let table = parse_abbrev_table(&content);
        assert_eq!(table.abbrev_for("note1"), Some("AB"));
        assert_eq!(table.abbrev_for("note2"), Some("CD"));
        assert!(table.used.contains("AB"));
        assert!(table.used.contains("CD"));
        assert_eq!(table.used.len(), 2);
    }

    #[test]
    fn test_parse_abbrev_table_no_rows() {
        assert!(parse_abbrev_table("no table here").by_journal.is_empty());
    }

    #[test]
    fn test_extract_abbrev() {
        assert_eq!(extract_abbrev("# T\n\n> Abbrev: KA\n"), Some("KA".to_string()));
        assert_eq!(extract_abbrev("> Abbrev：ZZ"), Some("ZZ".to_string()));
        assert_eq!(extract_abbrev("> Abbrev: k1"), None);
    }

    #[test]
    fn test_atom_rows() {
        let content = "| ID | Kind | Content | Locator |\n\
                       | -- | ---- | ------- | ------- |\n\
                       | KA-01 | fact | Twenty notes by date | Background |\n\
                       | KA-02 | judgment | Timelines scatter topics | Problems |\n";
        let rows = atom_rows(content);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("KA-01".to_string(), "Twenty notes by date".to_string()));
    }

    #[test]
    fn test_atom_id_prefixes() {
        let prefixes: Vec<String> = atom_id_prefixes("| AB-01 | x |\n| CD-12 | y |").collect();
        assert_eq!(prefixes, vec!["AB", "CD"]);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("短い文字列", 3), "短い文");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
