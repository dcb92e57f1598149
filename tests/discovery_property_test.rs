// Property tests for journal classification and fence stripping

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

use knowledge_prism::kb::discovery::{collect_all_atom_paths, collect_ungrouped_atom_paths};
use knowledge_prism::kb::text::strip_code_fences;
use knowledge_prism::kb::{discover_journals, EntryKind, KbPaths};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomState {
    Missing,
    Placeholder,
    Extracted,
}

fn atom_state_strategy() -> impl Strategy<Value = AtomState> {
    prop_oneof![
        Just(AtomState::Missing),
        Just(AtomState::Placeholder),
        Just(AtomState::Extracted),
    ]
}

/// (month, day, stem) -> state; stems are unique per month since atoms are keyed by month + file name
fn journal_tree_strategy() -> impl Strategy<Value = BTreeMap<(u32, String), (u32, AtomState)>> {
    prop::collection::vec(
        (1u32..=3, 1u32..=28, "[a-z]{3,8}", atom_state_strategy()),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(month, day, stem, state)| ((month, stem), (day, state)))
            .collect()
    })
}

fn markdown_body_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9 #|.-]{1,40}", 1..6).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn discovery_classifies_every_journal(tree in journal_tree_strategy()) {
        let tmp = TempDir::new().unwrap();
        let paths = KbPaths::new(tmp.path());

        let mut expected = Vec::new();
        for ((month, stem), (day, state)) in &tree {
            let date_dir = format!("2026-{month:02}-{day:02}");
            let journal_dir = paths.journal_dir.join(&date_dir);
            fs::create_dir_all(&journal_dir).unwrap();
            fs::write(journal_dir.join(format!("{stem}.md")), "# journal\n").unwrap();

            let atom_dir = paths.atoms_dir.join(format!("2026-{month:02}"));
            let atom_path = atom_dir.join(format!("{stem}.md"));
            match state {
                AtomState::Missing => expected.push((date_dir, stem.clone(), EntryKind::New.label())),
                AtomState::Placeholder => {
                    fs::create_dir_all(&atom_dir).unwrap();
                    fs::write(&atom_path, "# t\n\n(pending extraction)\n").unwrap();
                    expected.push((date_dir, stem.clone(), EntryKind::Fill.label()));
                }
                AtomState::Extracted => {
                    fs::create_dir_all(&atom_dir).unwrap();
                    fs::write(&atom_path, "# t\n\n## Atoms\n").unwrap();
                }
            }
        }
        expected.sort();

        let discovery = discover_journals(&paths, None).unwrap();
        let mut actual: Vec<_> = discovery
            .entries
            .iter()
            .map(|e| (e.date_dir.clone(), e.stem.clone(), e.kind.label()))
            .collect();

        // Entries come out in date-dir then file-name order
        let ordered = actual.clone();
        actual.sort();
        prop_assert_eq!(&ordered, &actual);
        prop_assert_eq!(actual, expected);

        for entry in &discovery.entries {
            prop_assert!(entry.atom_path.starts_with(&entry.atom_month_dir));
            prop_assert_eq!(&entry.month, &entry.date_dir[..7]);
        }

        let extracted = tree.values().filter(|(_, s)| *s == AtomState::Extracted).count();
        prop_assert_eq!(collect_all_atom_paths(&paths).unwrap().len(), extracted);
        // No group files: every extracted atom is ungrouped
        prop_assert_eq!(collect_ungrouped_atom_paths(&paths).unwrap().len(), extracted);
    }

    #[test]
    fn fence_strip_round_trip(body in markdown_body_strategy(), lang in prop_oneof![Just(""), Just("markdown"), Just("md")]) {
        let fenced = format!("```{lang}\n{body}\n```");
        let stripped = strip_code_fences(&fenced);
        prop_assert_eq!(stripped, body.as_str());
        prop_assert_eq!(strip_code_fences(stripped), body.as_str());
    }
}
