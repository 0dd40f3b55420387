pub mod entry;
pub mod query;

pub use entry::{Entry, Function, Header, Target};
pub use query::{IndexStats, QueryIndex};
