//! Output: canonical message files and the CSV manifest.

pub mod csv;
pub mod message;
