//! Scanning
//!
//! Package traversal, block binding and the collector tying them together.
//!
//! @module scan

pub mod binder;
pub mod collector;
pub mod walker;

pub use binder::Binder;
pub use collector::{collect, Collector};
pub use walker::{ConcurrentVisited, PackageFilter, PackageWalker, Visited};
