//! Data models for the folklore archive.
//!
//! Field names serialize in camelCase to match the public JSON contract.

mod item;
mod query;

pub use item::*;
pub use query::*;
