// Model output parsers and validators
//
// Nothing the model returns is written before it passes through here.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::kb::markdown::{is_separator_row, row_cells};

static TITLE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#[ \t]+\S").unwrap());
static SOURCE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s*Source\s*[:：]").unwrap());
static ID_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\|\s*ID\s*\|").unwrap());
static ATOM_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|\s*[A-Z]{2}-\d{2}\s*\|").unwrap());

static GROUP_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=== GROUP: (\S+\.md) ===((?s:.*?))=== END ===").unwrap());
static GROUP_FILE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^G\d+-[^/\\]+\.md$").unwrap());
static INDEX_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=== INDEX_ROWS ===((?s:.*?))=== END ===").unwrap());
static CHANGELOG_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=== CHANGELOG ===((?s:.*?))=== END ===").unwrap());

static SYNTHESIS_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#[ \t]+Synthesis\b").unwrap());
static CANDIDATES_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^##[ \t]+Top-level candidates\b").unwrap());
static CANDIDATE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S\d+(\*)?$").unwrap());
static GROUP_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bG\d+\b").unwrap());

/// A structural problem in an atom extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AtomIssue {
    #[error("missing title line (# ...)")]
    MissingTitle,
    #[error("missing source line (> Source: ...)")]
    MissingSource,
    #[error("missing ## Atoms heading")]
    MissingAtomsHeading,
    #[error("missing atom table (| ID | ...)")]
    MissingTable,
    #[error("no atom rows found (e.g. XX-01)")]
    NoAtomRows,
}

/// Every structural problem in `output`; empty means valid.
pub fn validate_atom_output(output: &str) -> Vec<AtomIssue> {
    let mut issues = Vec::new();
    if !TITLE_LINE_RE.is_match(output) {
        issues.push(AtomIssue::MissingTitle);
    }
    if !SOURCE_LINE_RE.is_match(output) {
        issues.push(AtomIssue::MissingSource);
    }
    if !output.lines().any(|l| l.trim_end() == "## Atoms") {
        issues.push(AtomIssue::MissingAtomsHeading);
    }
    if !ID_HEADER_RE.is_match(output) {
        issues.push(AtomIssue::MissingTable);
    }
    if !ATOM_ID_RE.is_match(output) {
        issues.push(AtomIssue::NoAtomRows);
    }
    issues
}

/// One `=== GROUP: <file> ===` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBlock {
    pub filename: String,
    pub content: String,
}

/// Parsed auto-write grouping output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupsOutput {
    pub groups: Vec<GroupBlock>,
    pub index_rows: Vec<String>,
    pub changelog: Vec<String>,
    /// Group file names refused because they are not `G{NN}-{slug}.md`
    pub rejected: Vec<String>,
}

impl GroupsOutput {
    /// Nothing to write: no group blocks and no index rows.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.index_rows.is_empty()
    }
}

/// Turns raw grouping output into a [`GroupsOutput`]
pub trait GroupsOutputParser: Send + Sync {
    fn parse(&self, raw: &str) -> GroupsOutput;
}

/// The `=== GROUP / INDEX_ROWS / CHANGELOG === ... === END ===` protocol
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedGroupsParser;

impl GroupsOutputParser for DelimitedGroupsParser {
    fn parse(&self, raw: &str) -> GroupsOutput {
        let mut out = GroupsOutput::default();

        for caps in GROUP_BLOCK_RE.captures_iter(raw) {
            let filename = caps[1].trim().to_string();
            if is_group_file_name(&filename) {
                out.groups.push(GroupBlock {
                    filename,
                    content: caps[2].trim().to_string(),
                });
            } else {
                out.rejected.push(filename);
            }
        }

        if let Some(caps) = INDEX_BLOCK_RE.captures(raw) {
            out.index_rows = table_rows(&caps[1]);
        }
        if let Some(caps) = CHANGELOG_BLOCK_RE.captures(raw) {
            out.changelog = table_rows(&caps[1]);
        }

        out
    }
}

fn is_group_file_name(name: &str) -> bool {
    GROUP_FILE_NAME_RE.is_match(name)
}

/// Body rows of a table block; a header row (one followed by a separator) is dropped.
fn table_rows(block: &str) -> Vec<String> {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('|'))
        .collect();
    lines
        .iter()
        .enumerate()
        .filter(|(i, l)| {
            !is_separator_row(l) && !lines.get(i + 1).is_some_and(|next| is_separator_row(next))
        })
        .map(|(_, l)| l.to_string())
        .collect()
}

/// A structural problem in a synthesis document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SynthesisIssue {
    #[error("missing # Synthesis heading")]
    MissingTitle,
    #[error("missing ## Top-level candidates heading")]
    MissingCandidates,
}

pub fn validate_synthesis(output: &str) -> Vec<SynthesisIssue> {
    let mut issues = Vec::new();
    if !SYNTHESIS_TITLE_RE.is_match(output) {
        issues.push(SynthesisIssue::MissingTitle);
    }
    if !CANDIDATES_HEADING_RE.is_match(output) {
        issues.push(SynthesisIssue::MissingCandidates);
    }
    issues
}

/// A candidate whose status disagrees with the number of groups it cites
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateFinding {
    /// Confirmed candidate citing fewer than two groups
    UnderSupported { id: String, groups: usize },
    /// Tentative candidate already citing two or more groups
    ReadyForPromotion { id: String, groups: usize },
}

impl fmt::Display for CandidateFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateFinding::UnderSupported { id, groups } => write!(
                f,
                "candidate {id} cites {groups} group(s); confirmed candidates need at least 2"
            ),
            CandidateFinding::ReadyForPromotion { id, groups } => write!(
                f,
                "tentative candidate {id} cites {groups} groups and could be promoted"
            ),
        }
    }
}

/// Compare each `S{n}` / `S{n}*` row against the distinct `G{NN}` ids it cites.
pub fn audit_candidates(synthesis: &str) -> Vec<CandidateFinding> {
    let mut findings = Vec::new();
    for line in synthesis.lines().filter(|l| l.trim_start().starts_with('|')) {
        let cells = row_cells(line);
        let Some(caps) = cells.first().and_then(|id| CANDIDATE_ID_RE.captures(id)) else {
            continue;
        };
        let id = cells[0].to_string();
        let tentative = caps.get(1).is_some();
        let groups = cells[1..]
            .iter()
            .flat_map(|c| GROUP_REF_RE.find_iter(c).map(|m| m.as_str()))
            .collect::<BTreeSet<_>>()
            .len();

        if tentative && groups >= 2 {
            findings.push(CandidateFinding::ReadyForPromotion { id, groups });
        } else if !tentative && groups < 2 {
            findings.push(CandidateFinding::UnderSupported { id, groups });
        }
    }
    findings
}
