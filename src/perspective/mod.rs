// Perspectives: SCQA framing and Key Line trees built on top of synthesis
//
// A perspective lives in `pyramid/structure/P{NN}-{slug}/`. It is created
// from `_template`, then filled stage by stage with the model: SCQA first,
// then the Key Line table, then one expansion file per Key Line.

mod expand;
mod fill;
mod scaffold;

pub use expand::{expand_key_line, find_group_file, parse_key_line_table, KeyLine};
pub use fill::{extract_answer, fill_perspective, FillStage};
pub use scaffold::{new_perspective, update_perspective_index, NewPerspective};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::providers::ModelError;

#[derive(Debug, Error)]
pub enum PerspectiveError {
    #[error("{} does not exist; run `prism init` first", .0.display())]
    StructureMissing(PathBuf),

    #[error("template directory {} not found; is the knowledge base initialised?", .0.display())]
    TemplateMissing(PathBuf),

    #[error("invalid perspective slug {0:?}")]
    InvalidSlug(String),

    #[error("perspective {0} already exists")]
    AlreadyExists(String),

    #[error("perspective directory {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{} does not exist; run `prism process` first", .0.display())]
    SynthesisMissing(PathBuf),

    #[error("{} does not exist", .0.display())]
    TreeMissing(PathBuf),

    #[error("Key Line {id} not found in tree/README.md (available: {available})")]
    KeyLineNotFound { id: String, available: String },

    #[error("model call failed: {0}")]
    ModelCall(#[from] ModelError),

    #[error("model output rejected: {0}")]
    InvalidOutput(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PerspectiveError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| PerspectiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Generated perspective content and where it belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOutcome {
    pub path: PathBuf,
    pub content: String,
    /// False when generated with writing disabled
    pub written: bool,
}

pub(crate) fn read_or_empty(path: &Path) -> Result<String, PerspectiveError> {
    crate::kb::text::read_optional(path).map_err(PerspectiveError::io(path))
}

pub(crate) fn write_text(path: &Path, content: &str) -> Result<(), PerspectiveError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(PerspectiveError::io(parent))?;
    }
    std::fs::write(path, content).map_err(PerspectiveError::io(path))
}
