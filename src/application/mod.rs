//! Application layer: orchestration across domain logic and infrastructure I/O.

pub mod head_tracker;
pub mod logpoller;

pub use head_tracker::{ChainHeadTracker, FinalityMode, HeadTracker};
pub use logpoller::{LogPoller, LogPollerOptions, LogPollerTask};
