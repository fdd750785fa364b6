//! Record parsing: structured XML scan, heuristic header recovery, and the
//! text normalizers they share.

pub mod date;
pub mod heuristic;
pub mod html;
pub mod message_file;
pub mod record;

pub use record::{parse_record, read_record, ParseOutcome};
