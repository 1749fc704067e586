//! Query keys, predicate matching and the response cache for the triage console
//!
//! This crate provides:
//! - Opaque cache keys built from `(url, method, body)` (`QueryKey`)
//! - Predicate matching over reconstructed requests (`matches`)
//! - The API response envelope (`ApiResponse`, `ApiOutcome`)
//! - An LRU response cache with delayed invalidation (`ResponseCache`)

#![forbid(unsafe_code)]

pub mod cache;
pub mod envelope;
pub mod key;

pub use cache::{
    CacheConfig, CacheEntry, CacheMetrics, CacheStore, InvalidationEvent, InvalidationTrigger,
    Predicate, ResponseCache,
};
pub use envelope::{ApiOutcome, ApiResponse, is_api_data, parse_api_data};
pub use key::{QueryKey, RequestDescriptor, describe, matches};
