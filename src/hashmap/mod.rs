//! Chained paged hash map (C2, spec.md section 4.2).

mod chained;
mod provider;

pub use chained::{ChainedHashMap, EntryHandle, HashMapStats, VarSizedSpan};
pub use provider::BufferProvider;
