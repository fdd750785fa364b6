//! `olmshell`: convert Outlook for Mac (`.olm`) archives into plain message files.
//!
//! An OLM container is a ZIP archive holding one XML record per message. This
//! crate extracts the container, locates the records, parses each one (with
//! a header-scanning fallback for records that are not well-formed XML) and
//! writes one canonical `.eml`-style file per message.

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod locate;
pub mod model;
pub mod parser;
