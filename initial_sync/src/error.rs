use thiserror::Error;
use types::phase0::primitives::{Epoch, Slot};

use crate::state_machine::{EventId, StateId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no handler registered for event {event} in state {state}")]
    HandlerNotFound { state: StateId, event: EventId },
    #[error("epoch {epoch} is not in the lookahead window")]
    EpochNotTracked { epoch: Epoch },
    #[error("epoch {epoch} received event {event} in state {state} without an active request")]
    UnexpectedEvent {
        epoch: Epoch,
        state: StateId,
        event: EventId,
    },
    #[error(
        "block at slot {slot} is outside the requested range \
         (start: {start}, count: {count})"
    )]
    BlocksOutsideRequest { slot: Slot, start: Slot, count: u64 },
    #[error("window for epoch {epoch} cannot be extended more than {max_window_extensions} times")]
    WindowExtensionLimit {
        epoch: Epoch,
        max_window_extensions: u64,
    },
    #[error("blocks for epoch {epoch} could not be sent because the receiver was dropped")]
    BlocksNotSent { epoch: Epoch },
}
