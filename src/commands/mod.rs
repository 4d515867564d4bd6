//! CLI command implementations for regsort.
//!
//! - [`sort`] - Sort a record file of any size with an external merge sort
//! - [`check`] - Report whether a file is already sorted
//! - [`query`] - Extract the records overlapping one or more regions from a sorted file

#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod check;
pub mod command;
pub mod common;
pub mod query;
pub mod sort;
