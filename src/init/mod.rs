// Knowledge base scaffolding
//
// Templates are compiled into the binary. `{{name}}` and `{{date}}` are the
// only placeholders; unknown placeholders are left as they are.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::constants::CONFIG_FILENAME;
use crate::config::Config;

pub(crate) const ATOMS_README_TEMPLATE: &str =
    include_str!("../../templates/pyramid/analysis/atoms/README.md");

const TEMPLATES: &[(&str, &str)] = &[
    ("pyramid/analysis/atoms/README.md", ATOMS_README_TEMPLATE),
    (
        "pyramid/analysis/groups/INDEX.md",
        include_str!("../../templates/pyramid/analysis/groups/INDEX.md"),
    ),
    (
        "pyramid/analysis/synthesis.md",
        include_str!("../../templates/pyramid/analysis/synthesis.md"),
    ),
    (
        "pyramid/structure/INDEX.md",
        include_str!("../../templates/pyramid/structure/INDEX.md"),
    ),
    (
        "pyramid/structure/_template/scqa.md",
        include_str!("../../templates/pyramid/structure/_template/scqa.md"),
    ),
    (
        "pyramid/structure/_template/validation.md",
        include_str!("../../templates/pyramid/structure/_template/validation.md"),
    ),
    (
        "pyramid/structure/_template/tree/README.md",
        include_str!("../../templates/pyramid/structure/_template/tree/README.md"),
    ),
];

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Result of a successful `init`
#[derive(Debug, Clone)]
pub struct InitReport {
    pub base_dir: PathBuf,
    pub name: String,
    pub config_path: PathBuf,
    /// Files written, relative to `base_dir`
    pub files: Vec<String>,
}

fn render(template: &str, name: &str, date: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| match &caps[1] {
            "name" => name.to_string(),
            "date" => date.to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Scaffold a knowledge base in `target`. Refuses to touch an existing one.
pub fn init_knowledge_base(target: &Path, name: Option<&str>, today: NaiveDate) -> Result<InitReport> {
    let config_path = target.join(CONFIG_FILENAME);
    if config_path.exists() {
        bail!(
            "{} already contains {}; refusing to initialise again",
            target.display(),
            CONFIG_FILENAME
        );
    }

    fs::create_dir_all(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    let base_dir = fs::canonicalize(target)
        .with_context(|| format!("Failed to resolve {}", target.display()))?;

    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => n.to_string(),
        None => base_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "knowledge-prism".to_string()),
    };
    let date = today.format("%Y-%m-%d").to_string();

    for dir in ["journal", "outputs"] {
        let path = base_dir.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }

    let mut files = Vec::with_capacity(TEMPLATES.len() + 1);
    for (rel, template) in TEMPLATES {
        let path = base_dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, render(template, &name, &date))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        files.push(rel.to_string());
    }

    let config = Config::named(&name);
    let json = serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
    let config_path = base_dir.join(CONFIG_FILENAME);
    fs::write(&config_path, format!("{json}\n"))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    files.push(CONFIG_FILENAME.to_string());

    info!("Initialised knowledge base {:?} at {}", name, base_dir.display());
    Ok(InitReport {
        base_dir,
        name,
        config_path,
        files,
    })
}
