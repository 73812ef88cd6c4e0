//! Data discovery over raw CSV exports.
//!
//! Discovery is a diagnostic pass used to sanity-check exports before
//! training. It needs no configuration and no target column:
//!
//! - zero-byte files are listed as empty and skipped
//! - files that fail to parse are listed with the parser's message and skipped
//! - statistics cover the union of every parsed file
//!
//! The resulting [`DiscoveryReport`] serializes to JSON and implements
//! `Display` for the console.
//!
//! # Example
//!
//! ```rust,ignore
//! use power_processing::DiscoveryReporter;
//!
//! let report = DiscoveryReporter::discover(Path::new("exports"))?;
//! println!("{report}");
//! ```

mod report;
mod reporter;

pub use report::{
    ColumnDetail, DiscoveryReport, FileSummary, LabelCount, NumericSummary, UniqueValues,
    UnparsableFile,
};
pub use reporter::{DiscoveryReporter, LABEL_COLUMN, MAX_LISTED_UNIQUE_VALUES};
