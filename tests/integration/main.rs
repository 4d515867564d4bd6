//! Integration tests for the regsort library and binary.
//!
//! These tests run whole workflows: sorting files through spill and merge, checking the
//! result, and answering region queries over the sorted output on both the in-memory and
//! disk-backed paths.

mod helpers;
mod test_commands;
mod test_fallback;
mod test_region_query;
mod test_sort;
