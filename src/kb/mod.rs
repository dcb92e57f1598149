// Knowledge base layout, discovery and Markdown helpers

pub mod discovery;
pub mod markdown;
pub mod paths;
pub mod status;
pub mod text;

pub use discovery::{discover_journals, Discovery, EntryKind, JournalEntry};
pub use paths::KbPaths;
pub use status::{get_status, Status, UnprocessedJournal};
