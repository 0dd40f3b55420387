//! Annoscan - annotation indexing for Go source trees
//!
//! Walks the packages reachable from a set of roots, lifts annotations out of
//! documentation comments, binds them to the types, functions and methods
//! they decorate, and hands back a queryable index.

pub mod annotation;
pub mod core;
pub mod index;
pub mod provider;
pub mod scan;

pub use annotation::{Annotation, AnnotationParser, Grammar};
pub use core::config::Config;
pub use core::error::{Error, Result};
pub use index::{Entry, QueryIndex, Target};
pub use provider::{GoProvider, MemoryProvider, SourceProvider};
pub use scan::{collect, Collector};
