//! Upload staging

pub mod staging;

pub use staging::{StagedFile, StagingArea};
