//! Desired state: the allocation registry feed.

pub mod allocation;
pub mod client;

pub use allocation::AllocationRecord;
pub use client::{decode_feed, AllocationSource, FeedBatch, FeedClient};
