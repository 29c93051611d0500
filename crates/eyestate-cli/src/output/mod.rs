//! Output formatting for CLI.

mod json;

pub use json::{BatchReport, EntryReport, JsonOutput};
