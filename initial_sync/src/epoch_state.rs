use std::time::Instant;

use types::phase0::primitives::Epoch;

use crate::state_machine::StateId;

/// Sync progress of a single epoch in the lookahead window.
///
/// Only [`StateMachine::trigger`](crate::StateMachine::trigger) changes the state ID.
/// Handlers may modify `data`.
#[derive(Debug)]
pub struct EpochState<D> {
    epoch: Epoch,
    state: StateId,
    updated_at: Instant,
    pub data: D,
}

impl<D: Default> EpochState<D> {
    #[must_use]
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            state: StateId::New,
            updated_at: Instant::now(),
            data: D::default(),
        }
    }
}

impl<D> EpochState<D> {
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[must_use]
    pub const fn state(&self) -> StateId {
        self.state
    }

    /// Time of the last state change, or of creation if there has been none.
    ///
    /// Handlers that keep the current state do not refresh it.
    #[must_use]
    pub const fn updated_at(&self) -> Instant {
        self.updated_at
    }

    pub(crate) fn transition_to(&mut self, state: StateId) {
        if self.state != state {
            self.state = state;
            self.updated_at = Instant::now();
        }
    }
}
