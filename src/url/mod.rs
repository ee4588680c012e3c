//! URL handling module for Review-Cascade
//!
//! Discovered links are compared through a canonical form so the frontier
//! never fetches the same page twice under cosmetically different URLs.

mod normalize;

pub use normalize::{normalize_url, visit_key};
