// Status box rendering

use std::fmt::Write;
use std::path::Path;

use crate::kb::Status;

const BOX_WIDTH: usize = 41;

fn box_row(out: &mut String, label: &str, value: &str) {
    let inner = format!("  {label:<22}{value:>10}");
    let _ = writeln!(out, "  │{inner:<BOX_WIDTH$}│");
}

/// Human-readable status: header, counts box and the unprocessed journal list.
pub fn render_status(name: &str, base_dir: &Path, status: &Status) -> String {
    let rule = "─".repeat(BOX_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "\nKnowledge prism: {name}");
    let _ = writeln!(out, "Root: {}\n", base_dir.display());

    let _ = writeln!(out, "  ┌{rule}┐");
    let _ = writeln!(out, "  │{:^BOX_WIDTH$}│", "Knowledge prism status");
    let _ = writeln!(out, "  ├{rule}┤");
    box_row(&mut out, "Journals", &status.total_journals.to_string());
    box_row(&mut out, "Journal date dirs", &status.total_dates.to_string());
    box_row(&mut out, "Atom files", &status.total_atoms.to_string());
    box_row(&mut out, "Groups", &status.total_groups.to_string());
    box_row(&mut out, "Perspectives", &status.total_perspectives.to_string());
    let _ = writeln!(out, "  ├{rule}┤");
    box_row(&mut out, "Unprocessed journals", &status.unprocessed.len().to_string());
    box_row(&mut out, "Ungrouped atom files", &status.ungrouped_count.to_string());
    let modified = status
        .synthesis_modified
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "never".to_string());
    box_row(&mut out, "Synthesis modified", &modified);
    let _ = writeln!(out, "  └{rule}┘");

    if status.unprocessed.is_empty() {
        let _ = writeln!(out, "\n  All journals are processed.\n");
    } else {
        let _ = writeln!(out, "\n  Unprocessed journals:\n");
        let _ = writeln!(out, "  Date       | File");
        let _ = writeln!(out, "  ---------- | ----");
        for u in &status.unprocessed {
            let _ = writeln!(out, "  {} | {}", u.date_dir, u.file);
        }
        let _ = writeln!(out, "\n  Run `prism process` to extract them.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::UnprocessedJournal;
    use chrono::NaiveDate;

    fn status() -> Status {
        Status {
            total_journals: 3,
            total_dates: 2,
            total_atoms: 2,
            total_groups: 1,
            total_perspectives: 0,
            ungrouped_count: 1,
            synthesis_modified: NaiveDate::from_ymd_opt(2026, 3, 7),
            unprocessed: vec![UnprocessedJournal {
                date_dir: "2026-03-02".to_string(),
                file: "notes.md".to_string(),
            }],
        }
    }

    #[test]
    fn test_rows_are_aligned() {
        let text = render_status("KB", Path::new("/kb"), &status());
        let widths: Vec<usize> = text
            .lines()
            .filter(|l| l.trim_start().starts_with('│'))
            .map(|l| l.chars().count())
            .collect();
        assert!(!widths.is_empty());
        assert!(widths.iter().all(|w| *w == widths[0]));
        assert!(text.contains("2026-03-07"));
        assert!(text.contains("  2026-03-02 | notes.md"));
    }

    #[test]
    fn test_converged_message() {
        let mut s = status();
        s.unprocessed.clear();
        s.synthesis_modified = None;
        let text = render_status("KB", Path::new("/kb"), &s);
        assert!(text.contains("All journals are processed."));
        assert!(text.contains("never"));
    }
}
