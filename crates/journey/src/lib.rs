//! Funnel sequencing — step ordering with a persisted custom order,
//! conditional skipping, back-navigation history and quiz progress.

pub mod ordering;
pub mod sequencer;
pub mod store;

pub use ordering::{reorder, resolve_order};
pub use sequencer::{Advance, FunnelSequencer, SequencerState};
pub use store::{FileStore, LocalStore, MemoryStore};
