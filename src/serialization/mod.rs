// ABOUTME: Database serialization: paged dumps, replaying loads and the facade tying them to files
// ABOUTME: Re-exports the engines and their summaries for the CLI and library users

pub mod base;
pub mod dump;
pub mod helpers;
pub mod load;

pub use base::{table_file_path, Serializer};
pub use dump::{DumpSummary, Dumper, DEFAULT_PAGE_SIZE, IGNORED_TABLES};
pub use load::{LoadSummary, Loader};
