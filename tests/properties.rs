//! Property tests for Shutter.
//!
//! Properties use randomized input generation to protect the archive-merge
//! invariants: existing entries survive byte-identically and the merged
//! entry set is exactly the union of base entries and on-disk libraries.
//!
//! Run with: `cargo test --test properties`

#[path = "properties/merge_entries.rs"]
mod merge_entries;
