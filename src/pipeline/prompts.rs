// Prompt builders
//
// Pure functions of persisted state plus the new units. Today's date is a
// parameter so the same inputs always give the same prompt.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::kb::discovery::JournalEntry;
use crate::kb::text::{atom_rows, extract_abbrev, extract_title};

/// Whether stages 2 and 3 may write files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Ask for free-text suggestions, print them, write nothing
    Advisory,
    /// Ask for machine-readable output and merge it into the files
    AutoWrite,
}

impl WriteMode {
    pub fn from_flag(auto_write: bool) -> Self {
        if auto_write {
            WriteMode::AutoWrite
        } else {
            WriteMode::Advisory
        }
    }
}

const ATOM_EXAMPLE: &str = "# Designing a personal knowledge base

> Source: [../../../../journal/2026-02-22/knowledge-base-architecture-design.md](../../../../journal/2026-02-22/knowledge-base-architecture-design.md)
> Abbrev: KA

## Atoms

| ID    | Kind     | Content                                                                                     | Locator                     |
| ----- | -------- | ------------------------------------------------------------------------------------------- | --------------------------- |
| KA-01 | fact     | Twenty raw study notes organised by date record the process but do not support reuse         | Background                  |
| KA-02 | judgment | Date-ordered notes lack a reading order, scatter topics and have no central thesis           | Problem analysis            |
| KA-03 | fact     | Top-down method: start from the conclusion, check it with SCQA, expand layer by layer (MECE) | Pyramid principle > Top-down |";

/// Relative link from an atom file back to its journal.
pub fn journal_link(entry: &JournalEntry) -> String {
    format!("../../../../journal/{}/{}", entry.date_dir, entry.file_name)
}

/// Extraction prompt for one journal.
///
/// Entries without a known abbreviation (new journals, or placeholders that
/// were never registered) are asked to pick an unused code.
pub fn atom_prompt(entry: &JournalEntry, journal: &str, used: &BTreeSet<String>) -> String {
    let abbrev_section = match &entry.abbrev {
        Some(abbrev) => format!(
            "## Abbreviation\n\n\
             This journal's abbreviation is **{abbrev}**. Number atoms {abbrev}-01, {abbrev}-02, ...\n"
        ),
        None => {
            let taken = used.iter().cloned().collect::<Vec<_>>().join(", ");
            format!(
                "## Abbreviation allocation\n\n\
                 Assign this journal a two-letter uppercase abbreviation (used as the atom id prefix).\n\
                 Abbreviations already in use (must not be repeated): {taken}\n\
                 Choose a meaningful, unused code and put it on the \"> Abbrev: XX\" line of the output.\n"
            )
        }
    };

    let link = journal_link(entry);
    format!(
        "You are a knowledge base assistant. Your task is to extract information units (atoms) from the journal below.

## Output requirements

Output the complete atom Markdown file directly (do not wrap it in a code block). Follow this layout exactly:

1. First line: # [journal title]
2. After a blank line: > Source: [relative link](relative link)
3. Immediately after: > Abbrev: XX
4. After a blank line: ## Atoms
5. Then the atom table

## Atom extraction rules

- Each atom is the smallest indivisible unit of information
- Kind must be one of: fact, step, lesson, judgment
  - fact: concepts, definitions, architecture descriptions that objectively exist
  - step: concrete operations, commands, configuration procedures
  - lesson: pitfalls, best practices, non-obvious findings
  - judgment: subjective assessments, feasibility conclusions, trade-off decisions
- The Content column states the point in one concise sentence
- The Locator column names the journal section it came from
- Ids start at 01 and increase

{abbrev_section}
## Reference example (first rows only)

{ATOM_EXAMPLE}

## Journal details

- Title: {title}
- Source path: {link}
- Date directory: {date}

## Journal text

{journal}
",
        title = extract_title(journal),
        date = entry.date_dir,
    )
}

/// One header line plus one line per atom row.
pub fn condensed_atom_summary(atom_path: &Path, content: &str) -> String {
    let abbrev = extract_abbrev(content).unwrap_or_else(|| "??".to_string());
    let stem = atom_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut out = format!("**{abbrev}** ({stem}) - {}", extract_title(content));
    for (id, text) in atom_rows(content) {
        let _ = write!(out, "\n- {id}: {text}");
    }
    out
}

/// Grouping prompt for one batch of atom summaries.
pub fn groups_prompt(
    groups_index: &str,
    summaries: &str,
    max_group: u32,
    today: NaiveDate,
    mode: WriteMode,
) -> String {
    match mode {
        WriteMode::Advisory => format!(
            "You are a knowledge base assistant. Below are newly extracted atom files and the existing group structure.

## Task

Analyse the new atoms and suggest how to group them:
1. Which new atoms belong in which existing groups? (list atom id -> group id)
2. Is a new group needed? If so give its number (continuing after G{max_group:02}), its thesis sentence and its atoms.
3. Should any existing group be split or merged?

Answer with a clear table or list of suggestions.

## Existing groups

{groups_index}

## Newly extracted atoms

{summaries}
"
        ),
        WriteMode::AutoWrite => format!(
            "You are a knowledge base assistant. Below are atoms waiting to be grouped and the existing group index.

## Task

Analyse the new atoms and update the groups. The output must use the delimiter format below; it is parsed and written to files automatically.

### Operations

1. **New group**: when new atoms form a theme that matches no existing group, create one. Numbering starts at G{next:02}.
2. **Update an existing group**: when new atoms belong in an existing group, output that group's complete updated content (old atoms plus new atoms).
3. **Atoms left ungrouped**: when some atoms cannot be grouped yet, say so in the CHANGELOG block.

### Output format (follow exactly, add no other text)

For each new or updated group, output one block:

```
=== GROUP: G{next:02}-topic-slug.md ===
(complete group file content, following the template below)
=== END ===
```

After all group blocks, output the index block:

```
=== INDEX_ROWS ===
(only new or changed rows, in the same format as the INDEX.md table)
| G{next:02} | thesis sentence | atom count | source month span |
=== END ===
```

Finally output the changelog block:

```
=== CHANGELOG ===
| {today} | what changed | why |
=== END ===
```

### Group file template

```markdown
# GXX: [one opinionated thesis sentence]

> One opinionated judgment summarising what this set of atoms shows.

## Atoms

| ID    | Source                   | Summary |
| ----- | ------------------------ | ------- |
| XX-01 | source-file-stem         | ...     |

## Ordering

Explain how the atoms are ordered (chronological / structural / by degree).
```

### Rules

- Every group's thesis must be an opinionated judgment
- The Source column holds the journal file name without .md
- When updating a group, keep all of its existing atoms and append the new ones at the end of the table
- Atom counts must be exact
- The month span covers the source months of every atom
- Group file names are plain names like G{next:02}-topic-slug.md, never paths

## Existing group INDEX

{groups_index}

## Atoms to group

{summaries}
",
            next = max_group + 1,
        ),
    }
}

/// Synthesis prompt over the current synthesis document and group index.
pub fn synthesis_prompt(
    synthesis: &str,
    groups_index: &str,
    summaries: &str,
    today: NaiveDate,
    mode: WriteMode,
) -> String {
    match mode {
        WriteMode::Advisory => format!(
            "You are a knowledge base assistant. Below are the current synthesis (top-level thesis candidates) and the extracted atoms.

## Task

Assess:
1. Are the existing top-level candidates still accurate?
2. Do the atoms support existing candidates, or suggest adding or changing candidates?
3. Do the relationships between candidates need updating?

Give concrete suggestions. If nothing needs to change, say so briefly.

## Current synthesis

{synthesis}

## Current group INDEX (latest groups included)

{groups_index}

## Extracted atoms

{summaries}
"
        ),
        WriteMode::AutoWrite => format!(
            "You are a knowledge base assistant. Update synthesis.md from the atoms and the current groups.

## Task

1. Assess whether the existing top-level candidates are still accurate
2. Decide whether the atoms support existing candidates, or call for adding, changing or promoting candidates
3. Update the relationships between candidates
4. Append a row for today ({today}) to the changelog table

## Output requirements

Output the complete, updated synthesis.md directly (no code block).

Keep the existing structure of the file:
- the # Synthesis heading and its introduction
- the ## Top-level candidates table
- the ### Tentative candidates table (when present)
- ## Relationships between candidates
- the perspectives link
- the ## Changelog table

### Rules

- Only add, promote or change candidates when the evidence is sufficient
- Keep S1, S2, ... numbering contiguous
- Mark tentative candidates S* (e.g. S7*)
- Promote a tentative candidate to a full candidate once a second group supports it
- List every supporting group id (G01, G02, ...) in the candidate's row
- If nothing needs to change, output the original text (still append a changelog row saying \"no change\")
- Changelog dates use YYYY-MM-DD

## Current synthesis.md

{synthesis}

## Current group INDEX (latest groups included)

{groups_index}

## Extracted atoms

{summaries}
"
        ),
    }
}
