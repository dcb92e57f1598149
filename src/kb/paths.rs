// Fixed layout of a knowledge base directory

use std::path::{Path, PathBuf};

/// Every well-known location inside a knowledge base, resolved from its root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KbPaths {
    pub base_dir: PathBuf,
    pub journal_dir: PathBuf,
    pub atoms_dir: PathBuf,
    /// Abbreviation registry (`atoms/README.md`)
    pub atoms_readme: PathBuf,
    pub groups_dir: PathBuf,
    pub groups_index: PathBuf,
    pub synthesis: PathBuf,
    pub structure_dir: PathBuf,
    pub template_dir: PathBuf,
    pub structure_index: PathBuf,
    pub outputs_dir: PathBuf,
}

impl KbPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let analysis = base_dir.join("pyramid").join("analysis");
        let structure_dir = base_dir.join("pyramid").join("structure");
        Self {
            journal_dir: base_dir.join("journal"),
            atoms_dir: analysis.join("atoms"),
            atoms_readme: analysis.join("atoms").join("README.md"),
            groups_dir: analysis.join("groups"),
            groups_index: analysis.join("groups").join("INDEX.md"),
            synthesis: analysis.join("synthesis.md"),
            template_dir: structure_dir.join("_template"),
            structure_index: structure_dir.join("INDEX.md"),
            structure_dir,
            outputs_dir: base_dir.join("outputs"),
            base_dir,
        }
    }

    /// `path` relative to the base directory, for log lines
    pub fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
