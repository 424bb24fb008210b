//! In-memory index structures used by the worker store
//!
//! - [`MembershipFilter`] - bit-array bloom filter, mergeable across processes
//! - [`OrderedIndex`] - arena-backed skip list with randomized levels
//! - [`ChainedTable`] - fixed-bucket chained hash table

pub mod filter;
pub mod skiplist;
pub mod table;

pub use filter::{MembershipFilter, DEFAULT_HASH_FUNCTIONS};
pub use skiplist::{OrderedIndex, DEFAULT_MAX_LEVEL};
pub use table::{ChainedTable, CITIZEN_BUCKETS, STAT_BUCKETS};
