//! Background work driven by the document service

pub mod parse;

pub use parse::{wait_for_parsing, DocumentParseReport, ParseOutcome, ParseWaitOptions};
