//! Garbage collection
//!
//! The collector itself is a set of cycle methods on
//! [`crate::memory::MemoryManager`]; this module holds the root set it traces
//! from and the statistics it reports.

mod collector;
mod roots;

pub use collector::{CycleKind, FullCycleStats, GcStats, YoungCycleStats};
pub use roots::{RootId, RootSet};
