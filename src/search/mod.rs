//! Search support: text normalization and prefix-token matching.
//!
//! There is no ranking here; items either match a query or they don't.

mod normalize;
mod tokens;

pub use normalize::normalize;
pub use tokens::{generate_tokens, matches, TokenSeeds};
