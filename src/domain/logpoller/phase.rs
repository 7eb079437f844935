use crate::foundation::{NodeError, Result};
use std::fmt;

/// Phase of a single poll cycle or replay.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PollPhase {
    #[default]
    Idle,
    /// Fetching heads and comparing the chain against stored blocks.
    Reconciling,
    /// Writing blocks and logs.
    Persisting,
}

const VALID_TRANSITIONS: &[(PollPhase, PollPhase)] = &[
    (PollPhase::Idle, PollPhase::Reconciling),
    (PollPhase::Reconciling, PollPhase::Persisting),
    (PollPhase::Reconciling, PollPhase::Idle),
    (PollPhase::Persisting, PollPhase::Idle),
];

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollPhase::Idle => "idle",
            PollPhase::Reconciling => "reconciling",
            PollPhase::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

pub fn validate_transition(from: PollPhase, to: PollPhase) -> Result<()> {
    if VALID_TRANSITIONS.contains(&(from, to)) {
        return Ok(());
    }
    Err(NodeError::InvalidStateTransition { from: from.to_string(), to: to.to_string() })
}
