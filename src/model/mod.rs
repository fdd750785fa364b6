//! Core data model types: extracted message records, addresses, and run results.

pub mod address;
pub mod record;
pub mod result;
