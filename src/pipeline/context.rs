// Mutable state threaded through one pipeline run

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;

use crate::init::ATOMS_README_TEMPLATE;
use crate::kb::markdown::TableDoc;
use crate::kb::paths::KbPaths;
use crate::kb::text::read_optional;

const REGISTRY_TABLE_HEADER: &str =
    "| Abbrev | Journal                               | Month   |\n| ------ | ------------------------------------- | ------- |\n";

/// Paths, abbreviation registry and the set of taken abbreviations
///
/// The registry document is loaded on first registration and rewritten
/// wholesale after each one, so a crash between two atom writes never
/// leaves an atom file whose abbreviation is unregistered.
#[derive(Debug)]
pub struct RunContext {
    pub paths: KbPaths,
    registry: Option<String>,
    used_abbrevs: BTreeSet<String>,
}

impl RunContext {
    pub fn new(paths: KbPaths) -> Self {
        Self {
            paths,
            registry: None,
            used_abbrevs: BTreeSet::new(),
        }
    }

    pub fn with_used_abbrevs(mut self, used: BTreeSet<String>) -> Self {
        self.used_abbrevs = used;
        self
    }

    pub fn used_abbrevs(&self) -> &BTreeSet<String> {
        &self.used_abbrevs
    }

    pub fn is_used(&self, abbrev: &str) -> bool {
        self.used_abbrevs.contains(abbrev)
    }

    /// Add a registry row for `stem` and mark `abbrev` as taken.
    pub fn register_abbrev(&mut self, stem: &str, abbrev: &str, month: &str) -> Result<()> {
        let current = match self.registry.take() {
            Some(doc) => doc,
            None => {
                let on_disk = read_optional(&self.paths.atoms_readme).with_context(|| {
                    format!("Failed to read {}", self.paths.atoms_readme.display())
                })?;
                if on_disk.trim().is_empty() {
                    ATOMS_README_TEMPLATE.to_string()
                } else {
                    on_disk
                }
            }
        };

        let mut doc = match TableDoc::parse(&current, None) {
            Some(doc) => doc,
            None => {
                let with_table = format!("{}\n\n{REGISTRY_TABLE_HEADER}", current.trim_end());
                TableDoc::parse(&with_table, None)
                    .context("Failed to build abbreviation registry table")?
            }
        };
        doc.push_row(&format!("| {abbrev:<6} | {stem:<37} | {month} |"));
        let rendered = doc.render();

        if let Some(parent) = self.paths.atoms_readme.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.paths.atoms_readme, &rendered)
            .with_context(|| format!("Failed to write {}", self.paths.atoms_readme.display()))?;

        self.registry = Some(rendered);
        self.used_abbrevs.insert(abbrev.to_string());
        Ok(())
    }
}
