//! The ByteStore abstraction (spec.md §6.4): an ordered key→value byte map
//! that the Operator layers its typed DataFrame records on top of. Two
//! implementations are provided — [`memory::MemoryStore`] for an in-process,
//! non-persistent engine, and [`disk`] for the on-disk LSM-backed one.

pub mod disk;
pub mod memory;

use crate::error::Result;

/// Returned from a `range_prefix` visitor to decide whether scanning
/// should continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Stop,
}

/// An ordered byte-string key-value store. Every Operator op reduces to a
/// handful of calls on this trait, which is what lets the Operator stay
/// agnostic to whether it's backed by memory or disk.
pub trait ByteStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Visits every key with a given `prefix` in ascending lexicographic
    /// order, calling `visit(key, value)` for each. Stops early if the
    /// visitor returns `ControlFlow::Stop`.
    fn range_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow,
    ) -> Result<()>;

    /// Flushes and releases any resources held open by the store. Called
    /// once from `Operator::close`; further use of the store after this is
    /// a logic error in the caller, not something the trait guards against.
    fn close(&self) -> Result<()>;
}
