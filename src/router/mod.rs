//! Request routing.
//!
//! A [`RouteTable`] binds (method, pattern) pairs to handlers and resolves an
//! incoming (method, path) pair to the handler plus the variables captured
//! from the path. Patterns are `/`-separated; a segment written as `{name}`
//! matches any non-empty segment.

mod error;
mod pattern;
mod table;
mod tests;

pub use error::Error;
pub use pattern::{Pattern, Segment};
pub use table::{MatchResult, Route, RouteTable};
