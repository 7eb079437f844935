//! Chain data model tracked by the log poller.

mod phase;
mod types;

pub use phase::{validate_transition, PollPhase};
pub use types::*;
