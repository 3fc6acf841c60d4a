// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports dump, dump_dir, load, load_dir, and tables commands

pub mod dump;
pub mod load;
pub mod tables;

pub use dump::{dump, dump_dir};
pub use load::{load, load_dir};
pub use tables::tables;
