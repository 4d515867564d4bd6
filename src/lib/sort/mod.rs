//! External sorting of record files.
//!
//! # Architecture
//!
//! The sorting process follows this pipeline:
//!
//! 1. **Read phase**: stream lines, skip headers, key records by the comparator
//! 2. **Accumulate phase**: buffer records until the chunk memory limit is reached
//! 3. **Sort phase**: a bounded worker pool stable-sorts each batch
//! 4. **Spill phase**: write each sorted batch to a temporary chunk file
//! 5. **Merge phase**: k-way merge of the chunks using a min-heap
//!
//! [`check_sorted`] verifies an existing file against a comparator in one pass.

pub mod chunk;
pub mod external;
pub mod memory;
pub mod merge;
pub mod verify;

pub use chunk::Chunk;
pub use external::{DEFAULT_MEMORY_LIMIT, ExternalSorter, SortStats};
pub use memory::{MemoryMonitor, MemoryPressure};
pub use merge::KWayMerger;
pub use verify::{Applicability, check_reader, check_sorted};
