//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, query, headers)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (evaluate match conditions, capture variables)
//!     → Return: matched Route + RouteMatch, or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteSpec (declaration.rs)
//!     → Compile templates (pattern.rs)
//!     → Build matchers
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Regexes are compiled once per template, never per request
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

pub mod declaration;
pub mod matcher;
pub mod pattern;
pub mod router;

pub use declaration::RouteSpec;
pub use matcher::{Matcher, MatcherFn, RouteMatch};
pub use pattern::{PatternError, Template};
pub use router::{Route, RouteBuilder, RouteError, Router};
