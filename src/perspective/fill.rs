// SCQA and Key Line filling

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use super::{read_or_empty, write_text, FillOutcome, PerspectiveError};
use crate::kb::markdown::{is_separator_row, row_key};
use crate::kb::paths::KbPaths;
use crate::kb::text::strip_code_fences;
use crate::providers::ModelCaller;

const PERSPECTIVE_NAME_PLACEHOLDER: &str = "(perspective name)";

const SCQA_HEADINGS: [&str; 4] = [
    "## S - Situation",
    "## C - Complication",
    "## Q - Question",
    "## A - Answer",
];

const SCQA_INSTRUCTIONS: &str = "You are an expert in structured thinking. From the synthesis (top-level theses) and the groups (clustered atoms), write the complete SCQA for one perspective.
Output the complete scqa.md using the structure below. Fill in every section. Add no extra explanation.

# SCQA

> Perspective: (perspective name)

## Target reader

| Dimension  | Description |
| ---------- | ----------- |
| Role       | ...         |
| Background | ...         |
| Need       | ...         |

## S - Situation

(2-4 sentences of background the reader already accepts)

## C - Complication

(what changed, conflicts or hurts in that situation)

## Q - Question

(the one question the complication raises)

## A - Answer

(one sentence: your central claim, the apex of the pyramid, consistent with a synthesis candidate)

## Checks

- [ ] Is S already shared by the reader?
- [ ] Does C arise naturally from S?
- [ ] Is Q the inevitable follow-up to C?
- [ ] Does A answer Q directly?
- [ ] Is A consistent with a synthesis candidate, or deliberately adjusted?

---

## Changelog

| Date | Change |
| ---- | ------ |";

const KEYLINE_INSTRUCTIONS: &str = "You are an expert in the pyramid principle. From the synthesis, the groups INDEX and the apex (the SCQA answer), write the Key Line table rows.
Output Markdown table rows only (no header row). Each row:
| KLnn | <thesis sentence> | time/structure/degree | Gxx, Gyy | KLnn-slug.md |
Use 2-5 Key Lines. Pick the synthesis theses that support the apex and cite the matching groups. Slugs are hyphenated English.";

const KEYLINE_TABLE_HEADER: &str = "| ID  | Thesis | Order | Groups | Expansion |\n| --- | ------ | ----- | ------ | --------- |";

const TREE_END_MARKER: &str = "Each Key Line has its own file in this directory with its full expansion.";

static ANSWER_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^## A - Answer[^\n]*$").unwrap());
static TREE_SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)## Apex.*?Each Key Line has its own file in this directory[^\n]*").unwrap()
});

/// Which part of a perspective to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStage {
    Scqa,
    KeyLine,
}

impl FromStr for FillStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scqa" => Ok(FillStage::Scqa),
            "keyline" | "key-line" | "kl" => Ok(FillStage::KeyLine),
            other => Err(format!("unknown stage {other:?} (expected scqa or keyline)")),
        }
    }
}

impl fmt::Display for FillStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FillStage::Scqa => "scqa",
            FillStage::KeyLine => "keyline",
        })
    }
}

/// Body of the `## A - Answer` section of an SCQA document, if non-empty.
pub fn extract_answer(scqa: &str) -> Option<String> {
    let heading = ANSWER_HEADING_RE.find(scqa)?;
    let body: Vec<&str> = scqa[heading.end()..]
        .lines()
        .skip(1)
        .take_while(|l| !l.starts_with("## "))
        .collect();
    let answer = body.join("\n").trim().to_string();
    (!answer.is_empty()).then_some(answer)
}

/// Generate the SCQA or the Key Line table of `perspective` (a `P{NN}-slug` dir name).
pub async fn fill_perspective(
    base_dir: &Path,
    perspective: &str,
    stage: FillStage,
    write: bool,
    caller: &dyn ModelCaller,
) -> Result<FillOutcome, PerspectiveError> {
    let paths = KbPaths::new(base_dir);
    let dir = paths.structure_dir.join(perspective);
    if !dir.is_dir() {
        return Err(PerspectiveError::NotFound(dir));
    }
    if !paths.synthesis.is_file() {
        return Err(PerspectiveError::SynthesisMissing(paths.synthesis));
    }

    let synthesis = read_or_empty(&paths.synthesis)?;
    let groups_index = read_or_empty(&paths.groups_index)?;

    let (path, content) = match stage {
        FillStage::Scqa => {
            let prompt = format!(
                "{SCQA_INSTRUCTIONS}\n\n---\n\n## Synthesis\n{synthesis}\n\n## Groups INDEX\n{groups_index}\n\n\
                 Write the complete scqa.md. Replace \"{PERSPECTIVE_NAME_PLACEHOLDER}\" with: {perspective}"
            );
            let raw = caller.call(&prompt).await?;
            let content = strip_code_fences(raw.trim())
                .trim()
                .replace(PERSPECTIVE_NAME_PLACEHOLDER, perspective);

            let missing: Vec<&str> = SCQA_HEADINGS
                .iter()
                .copied()
                .filter(|h| !content.lines().any(|l| l.trim_end().starts_with(h)))
                .collect();
            if !missing.is_empty() {
                return Err(PerspectiveError::InvalidOutput(format!(
                    "SCQA output is missing {}",
                    missing.join(", ")
                )));
            }
            (dir.join("scqa.md"), format!("{content}\n"))
        }
        FillStage::KeyLine => {
            let scqa = read_or_empty(&dir.join("scqa.md"))?;
            let answer = extract_answer(&scqa).unwrap_or_else(|| "(answer not found)".to_string());
            let prompt = format!(
                "{KEYLINE_INSTRUCTIONS}\n\n---\n\n## Apex (SCQA answer)\n{answer}\n\n## Synthesis\n{synthesis}\n\n\
                 ## Groups INDEX\n{groups_index}\n\nWrite the Key Line table rows, one per line, rows only."
            );
            let raw = caller.call(&prompt).await?;
            let rows: Vec<&str> = strip_code_fences(raw.trim())
                .lines()
                .map(str::trim)
                .filter(|l| l.starts_with('|') && !is_separator_row(l))
                .filter(|l| row_key(l).is_some_and(|k| k.starts_with("KL")))
                .collect();
            if rows.is_empty() {
                return Err(PerspectiveError::InvalidOutput(
                    "no Key Line rows (| KLnn | ... |) in model output".to_string(),
                ));
            }

            let tree_path = dir.join("tree").join("README.md");
            let existing = read_or_empty(&tree_path)?;
            (tree_path, merge_tree_section(&existing, &answer, &rows))
        }
    };

    if write {
        write_text(&path, &content)?;
        info!("Filled {} of {} -> {}", stage, perspective, path.display());
    }
    Ok(FillOutcome {
        path,
        content,
        written: write,
    })
}

/// Replace everything from `## Apex` to the end marker sentence with a fresh section.
fn merge_tree_section(existing: &str, answer: &str, rows: &[&str]) -> String {
    let section = format!(
        "## Apex\n\n> {answer}\n\n## Key Lines\n\n\
         First-level arguments under the apex. Each one answers the reader's next question after reading the apex.\n\n\
         {KEYLINE_TABLE_HEADER}\n{}\n\n{TREE_END_MARKER}",
        rows.join("\n")
    );

    if TREE_SECTION_RE.is_match(existing) {
        TREE_SECTION_RE
            .replace(existing, regex::NoExpand(&section))
            .into_owned()
    } else if existing.trim().is_empty() {
        format!("# Pyramid tree\n\n{section}\n")
    } else {
        format!("{}\n\n{section}\n", existing.trim_end())
    }
}
