//! HTTP middleware.

pub mod concurrency;

pub use concurrency::limit_concurrency;
