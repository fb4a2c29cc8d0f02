use core::num::NonZeroUsize;
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use log::debug;
use parking_lot::Mutex;
use prometheus_metrics::Metrics;
use strum::{Display, IntoStaticStr};
use types::phase0::primitives::Epoch;

use crate::{epoch_state::EpochState, error::Error};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, IntoStaticStr)]
pub enum StateId {
    New,
    Scheduled,
    DataParsed,
    Sent,
    Skipped,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, IntoStaticStr)]
pub enum EventId {
    Schedule,
    DataReceived,
    ReadyToSend,
    ExtendWindow,
    CheckStale,
}

/// Input to [`StateMachine::trigger`]. Each event carries its own payload.
pub trait Event {
    fn id(&self) -> EventId;
}

/// Computes the next state of an epoch. An error leaves the state ID unchanged.
pub type Handler<E, D> = Box<dyn Fn(&mut EpochState<D>, &E) -> Result<StateId> + Send + Sync>;

/// Table-driven state machine over a ring buffer of epochs.
///
/// Epoch `n` occupies position `n mod lookahead_epochs`.
/// Each position has its own lock, so triggers on different epochs do not block each other.
pub struct StateMachine<E, D> {
    handlers: HashMap<(StateId, EventId), Handler<E, D>>,
    epochs: Box<[Mutex<Option<EpochState<D>>>]>,
    metrics: Option<Arc<Metrics>>,
}

impl<E: Event, D: Default> StateMachine<E, D> {
    #[must_use]
    pub fn new(lookahead_epochs: NonZeroUsize, metrics: Option<Arc<Metrics>>) -> Self {
        let epochs = (0..lookahead_epochs.get())
            .map(|_| Mutex::new(None))
            .collect();

        Self {
            handlers: HashMap::new(),
            epochs,
            metrics,
        }
    }

    /// Registers `handler` for `event` in `state`, replacing any earlier registration.
    pub fn add_handler(
        &mut self,
        state: StateId,
        event: EventId,
        handler: impl Fn(&mut EpochState<D>, &E) -> Result<StateId> + Send + Sync + 'static,
    ) {
        self.handlers.insert((state, event), Box::new(handler));
    }

    /// Starts tracking `epoch` in state [`StateId::New`].
    ///
    /// Replaces the epoch that occupied the same position in the window, if any.
    pub fn add_epoch_state(&self, epoch: Epoch) -> Result<()> {
        let replaced = self
            .epoch_position(epoch)?
            .lock()
            .replace(EpochState::new(epoch));

        if let Some(replaced) = replaced {
            debug!(
                "epoch {epoch} replaced epoch {} in state {} in lookahead window",
                replaced.epoch(),
                replaced.state(),
            );
        }

        Ok(())
    }

    pub fn trigger(&self, epoch: Epoch, event: &E) -> Result<()> {
        let mut position = self.epoch_position(epoch)?.lock();

        let epoch_state = position
            .as_mut()
            .filter(|epoch_state| epoch_state.epoch() == epoch)
            .ok_or(Error::EpochNotTracked { epoch })?;

        let state = epoch_state.state();
        let event_id = event.id();

        let handler = self
            .handlers
            .get(&(state, event_id))
            .ok_or(Error::HandlerNotFound {
                state,
                event: event_id,
            })?;

        match handler(epoch_state, event) {
            Ok(next_state) => {
                debug!("epoch {epoch} transitioned from {state} to {next_state} on {event_id}");

                epoch_state.transition_to(next_state);

                if let Some(metrics) = self.metrics.as_ref() {
                    metrics.register_sync_state_transition(event_id.into());
                }

                Ok(())
            }
            Err(error) => {
                debug!("epoch {epoch} failed to handle {event_id} in state {state}: {error:?}");

                if let Some(metrics) = self.metrics.as_ref() {
                    metrics.register_sync_handler_error(event_id.into());
                }

                Err(error)
            }
        }
    }

    #[must_use]
    pub fn state_of(&self, epoch: Epoch) -> Option<StateId> {
        self.epochs.iter().find_map(|position| {
            position
                .lock()
                .as_ref()
                .filter(|epoch_state| epoch_state.epoch() == epoch)
                .map(EpochState::state)
        })
    }

    /// Epochs currently in `state`, in ascending order.
    #[must_use]
    pub fn epochs_in_state(&self, state: StateId) -> Vec<Epoch> {
        let mut epochs = self
            .epochs
            .iter()
            .filter_map(|position| {
                position
                    .lock()
                    .as_ref()
                    .filter(|epoch_state| epoch_state.state() == state)
                    .map(EpochState::epoch)
            })
            .collect::<Vec<_>>();

        epochs.sort_unstable();

        epochs
    }

    pub fn with_epoch_state<T>(
        &self,
        epoch: Epoch,
        function: impl FnOnce(&EpochState<D>) -> T,
    ) -> Result<T> {
        let position = self.epoch_position(epoch)?.lock();

        let epoch_state = position
            .as_ref()
            .filter(|epoch_state| epoch_state.epoch() == epoch)
            .ok_or(Error::EpochNotTracked { epoch })?;

        Ok(function(epoch_state))
    }

    #[must_use]
    pub fn lookahead_epochs(&self) -> usize {
        self.epochs.len()
    }

    fn epoch_position(&self, epoch: Epoch) -> Result<&Mutex<Option<EpochState<D>>>> {
        let length = u64::try_from(self.epochs.len())?;
        let index = usize::try_from(epoch % length)?;

        self.epochs
            .get(index)
            .ok_or_else(|| Error::EpochNotTracked { epoch }.into())
    }
}
