// Structured view of a Markdown file around one pipe table
//
// Registry, groups index and structure index edits all follow the same idiom:
// find a stable anchor heading, place rows at the end of the table directly
// above it, and leave every other byte of the file untouched. `TableDoc`
// splits a file into {before, header, rows, after} so writers mutate a row
// list instead of doing substring surgery.

/// A Markdown document split around a single pipe table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDoc {
    before: Vec<String>,
    header: Vec<String>,
    rows: Vec<String>,
    after: Vec<String>,
}

/// What [`TableDoc::upsert_row`] did with a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Inserted,
    Replaced,
    Unchanged,
}

impl TableDoc {
    /// Split `content` around the last table that ends above the first line
    /// starting with `anchor`. Without an anchor (or when the anchor heading is
    /// absent) the last table of the whole document is used.
    ///
    /// Returns `None` when no table line exists in the searched region.
    pub fn parse(content: &str, anchor: Option<&str>) -> Option<Self> {
        let lines: Vec<&str> = content.split('\n').collect();
        let limit = anchor
            .and_then(|a| lines.iter().position(|l| l.trim_start().starts_with(a)))
            .unwrap_or(lines.len());

        let end = lines[..limit].iter().rposition(|l| is_table_line(l))?;
        let mut start = end;
        while start > 0 && is_table_line(lines[start - 1]) {
            start -= 1;
        }

        let table = &lines[start..=end];
        let header_len = table
            .iter()
            .take(2)
            .position(|l| is_separator_row(l))
            .map(|idx| idx + 1)
            .unwrap_or(0);

        let owned = |s: &[&str]| s.iter().map(|l| l.to_string()).collect::<Vec<_>>();
        Some(Self {
            before: owned(&lines[..start]),
            header: owned(&table[..header_len]),
            rows: owned(&table[header_len..]),
            after: owned(&lines[end + 1..]),
        })
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Index of the row whose first cell equals `key`.
    pub fn find_row(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|r| row_key(r) == Some(key))
    }

    pub fn push_row(&mut self, row: &str) {
        self.rows.push(row.trim().to_string());
    }

    /// Replace the row sharing `row`'s first cell, or append it to the table.
    pub fn upsert_row(&mut self, row: &str) -> RowChange {
        let row = row.trim();
        let Some(key) = row_key(row) else {
            self.rows.push(row.to_string());
            return RowChange::Inserted;
        };
        match self.find_row(key) {
            Some(idx) if self.rows[idx] == row => RowChange::Unchanged,
            Some(idx) => {
                self.rows[idx] = row.to_string();
                RowChange::Replaced
            }
            None => {
                self.rows.push(row.to_string());
                RowChange::Inserted
            }
        }
    }

    pub fn render(&self) -> String {
        self.before
            .iter()
            .chain(&self.header)
            .chain(&self.rows)
            .chain(&self.after)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// `| --- | :---: |` style header separator.
pub fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// Trimmed first cell of a table row, if non-empty.
pub fn row_key(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix('|')?;
    let cell = rest.split('|').next()?.trim();
    (!cell.is_empty()).then_some(cell)
}

/// All cells of a table row, trimmed.
pub fn row_cells(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(str::trim).collect()
}

/// Append rows at the very end of the document, ending with one newline.
pub fn append_rows_at_end(content: &str, rows: &[String]) -> String {
    if rows.is_empty() {
        return content.to_string();
    }
    let mut out = content.trim_end().to_string();
    for row in rows {
        out.push('\n');
        out.push_str(row.trim());
    }
    out.push('\n');
    out
}

/// True when some line of `content` equals `row` once both are trimmed.
pub fn contains_row(content: &str, row: &str) -> bool {
    let row = row.trim();
    content.lines().any(|l| l.trim() == row)
}
