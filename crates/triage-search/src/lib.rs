//! Search-parameter formats and query-string deltas for the triage console
//!
//! This crate provides:
//! - Declared search formats (`SearchFormat`, `FieldSpec`)
//! - Query-string multimaps (`ParamsState`)
//! - Typed ⇄ encoded conversion with array deltas (`SearchFormatter`)
//! - Delta normalization, merging and persistence (`SearchParser`)
//! - Parameter stores (`ParamStore`, `MemoryStore`, `FileStore`)

#![forbid(unsafe_code)]

pub mod field;
pub mod format;
pub mod formatter;
pub mod params;
pub mod parser;
pub mod result;
pub mod store;

pub use field::{FieldKind, FieldSpec, FieldValue};
pub use format::SearchFormat;
pub use formatter::{Prefixes, SearchFormatter, Token, TypedParams, merge_array};
pub use params::ParamsState;
pub use parser::{MergeSide, SearchParser};
pub use result::SearchParams;
pub use store::{FileStore, MemoryStore, ParamStore};
