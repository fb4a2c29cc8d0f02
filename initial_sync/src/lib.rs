pub use crate::{
    epoch_scheduler::{sync_state_machine, EpochData, FetchRequestParams, SyncEvent},
    epoch_state::EpochState,
    error::Error,
    messages::ReadyBlocks,
    state_machine::{Event, EventId, Handler, StateId, StateMachine},
    sync_config::SyncConfig,
};

mod epoch_scheduler;
mod epoch_state;
mod error;
mod messages;
mod state_machine;
mod sync_config;
