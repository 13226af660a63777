//! Persistence of integrated race records.
//!
//! Every write goes through [`merge_records`], so re-running a race merges
//! into the existing file instead of replacing it.

pub mod integrated;
pub mod merge;

pub use integrated::{collect_integrated_files, IntegratedStore};
pub use merge::merge_records;
