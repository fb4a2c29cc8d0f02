use std::{sync::Arc, time::Instant};

use anyhow::{ensure, Result};
use futures::channel::mpsc::UnboundedSender;
use helper_functions::misc;
use prometheus_metrics::Metrics;
use typenum::Unsigned as _;
use types::{
    phase0::{containers::BeaconBlock, primitives::Slot},
    preset::Preset,
};

use crate::{
    epoch_state::EpochState,
    error::Error,
    messages::ReadyBlocks,
    state_machine::{Event, EventId, StateId, StateMachine},
    sync_config::SyncConfig,
};

pub enum SyncEvent {
    Schedule,
    DataReceived(Vec<Arc<BeaconBlock>>),
    ReadyToSend(UnboundedSender<ReadyBlocks>),
    ExtendWindow,
    CheckStale { now: Instant },
}

impl Event for SyncEvent {
    fn id(&self) -> EventId {
        match self {
            Self::Schedule => EventId::Schedule,
            Self::DataReceived(_) => EventId::DataReceived,
            Self::ReadyToSend(_) => EventId::ReadyToSend,
            Self::ExtendWindow => EventId::ExtendWindow,
            Self::CheckStale { .. } => EventId::CheckStale,
        }
    }
}

/// Range of slots requested from peers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FetchRequestParams {
    pub start: Slot,
    pub count: u64,
}

impl FetchRequestParams {
    #[must_use]
    pub const fn contains(self, slot: Slot) -> bool {
        self.start <= slot && slot - self.start < self.count
    }
}

#[derive(Default, Debug)]
pub struct EpochData {
    pub request: Option<FetchRequestParams>,
    pub blocks: Vec<Arc<BeaconBlock>>,
    pub window_extensions: u64,
}

/// Builds the state machine driving initial sync.
///
/// ```text
/// New --Schedule--> Scheduled --DataReceived--> DataParsed --ReadyToSend--> Sent
///                             \--DataReceived (no blocks)--> Skipped --ExtendWindow--> New
/// Sent --CheckStale--> New
/// ```
#[must_use]
pub fn sync_state_machine<P: Preset>(
    config: SyncConfig,
    metrics: Option<Arc<Metrics>>,
) -> StateMachine<SyncEvent, EpochData> {
    let mut machine = StateMachine::<SyncEvent, EpochData>::new(config.lookahead_epochs, metrics);

    machine.add_handler(StateId::New, EventId::Schedule, |epoch_state, _| {
        schedule::<P>(epoch_state)
    });

    machine.add_handler(StateId::Scheduled, EventId::DataReceived, |epoch_state, event| {
        receive_data(epoch_state, event)
    });

    machine.add_handler(StateId::DataParsed, EventId::ReadyToSend, |epoch_state, event| {
        send_blocks(epoch_state, event)
    });

    machine.add_handler(StateId::Sent, EventId::CheckStale, move |epoch_state, event| {
        check_stale(&config, epoch_state, event)
    });

    machine.add_handler(StateId::Skipped, EventId::ExtendWindow, move |epoch_state, _| {
        extend_window(&config, epoch_state)
    });

    machine
}

fn schedule<P: Preset>(epoch_state: &mut EpochState<EpochData>) -> Result<StateId> {
    let epoch = epoch_state.epoch();
    let data = &mut epoch_state.data;
    let epochs = 2_u64.saturating_pow(u32::try_from(data.window_extensions)?);

    data.request = Some(FetchRequestParams {
        start: misc::compute_start_slot_at_epoch::<P>(epoch),
        count: P::SlotsPerEpoch::U64.saturating_mul(epochs),
    });

    data.blocks.clear();

    Ok(StateId::Scheduled)
}

fn receive_data(epoch_state: &mut EpochState<EpochData>, event: &SyncEvent) -> Result<StateId> {
    let SyncEvent::DataReceived(blocks) = event else {
        return Err(unexpected_event(epoch_state, event));
    };

    let request = epoch_state
        .data
        .request
        .ok_or_else(|| unexpected_event(epoch_state, event))?;

    for block in blocks {
        ensure!(
            request.contains(block.slot),
            Error::BlocksOutsideRequest {
                slot: block.slot,
                start: request.start,
                count: request.count,
            },
        );
    }

    if blocks.is_empty() {
        return Ok(StateId::Skipped);
    }

    epoch_state.data.blocks.clone_from(blocks);

    Ok(StateId::DataParsed)
}

fn send_blocks(epoch_state: &mut EpochState<EpochData>, event: &SyncEvent) -> Result<StateId> {
    let SyncEvent::ReadyToSend(tx) = event else {
        return Err(unexpected_event(epoch_state, event));
    };

    ReadyBlocks {
        epoch: epoch_state.epoch(),
        blocks: epoch_state.data.blocks.clone(),
    }
    .send(tx)?;

    epoch_state.data.blocks.clear();

    Ok(StateId::Sent)
}

fn check_stale(
    config: &SyncConfig,
    epoch_state: &mut EpochState<EpochData>,
    event: &SyncEvent,
) -> Result<StateId> {
    let SyncEvent::CheckStale { now } = event else {
        return Err(unexpected_event(epoch_state, event));
    };

    if now.saturating_duration_since(epoch_state.updated_at()) < config.stale_epoch_timeout {
        return Ok(StateId::Sent);
    }

    epoch_state.data = EpochData::default();

    Ok(StateId::New)
}

fn extend_window(config: &SyncConfig, epoch_state: &mut EpochState<EpochData>) -> Result<StateId> {
    let max_window_extensions = config.max_window_extensions;

    ensure!(
        epoch_state.data.window_extensions < max_window_extensions,
        Error::WindowExtensionLimit {
            epoch: epoch_state.epoch(),
            max_window_extensions,
        },
    );

    epoch_state.data.window_extensions += 1;
    epoch_state.data.request = None;

    Ok(StateId::New)
}

fn unexpected_event(epoch_state: &EpochState<EpochData>, event: &SyncEvent) -> anyhow::Error {
    Error::UnexpectedEvent {
        epoch: epoch_state.epoch(),
        state: epoch_state.state(),
        event: event.id(),
    }
    .into()
}
