use anyhow::Result;
use log::warn;
use prometheus::{histogram_opts, opts, Histogram, IntCounter, IntCounterVec};

#[derive(Debug)]
pub struct Metrics {
    // Hot state storage
    pub hot_state_saved: IntCounter,
    pub state_summary_saved: IntCounter,
    hot_state_cache_lookups: IntCounterVec,

    // Block replay
    pub block_replay_times: Histogram,
    pub replayed_blocks: IntCounter,

    // Initial sync state machine
    sync_state_transitions: IntCounterVec,
    sync_handler_errors: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Hot state storage
            hot_state_saved: IntCounter::new(
                "HOT_STATE_SAVED",
                "Number of full states saved on epoch boundaries",
            )?,

            state_summary_saved: IntCounter::new(
                "STATE_SUMMARY_SAVED",
                "Number of state summaries saved",
            )?,

            hot_state_cache_lookups: IntCounterVec::new(
                opts!(
                    "HOT_STATE_CACHE_LOOKUPS",
                    "Number of hot state cache lookups by result"
                ),
                &["result"],
            )?,

            // Block replay
            block_replay_times: Histogram::with_opts(histogram_opts!(
                "BLOCK_REPLAY_TIMES",
                "Time taken to replay blocks on top of a base state"
            ))?,

            replayed_blocks: IntCounter::new("REPLAYED_BLOCKS", "Number of blocks replayed")?,

            // Initial sync state machine
            sync_state_transitions: IntCounterVec::new(
                opts!(
                    "SYNC_STATE_TRANSITIONS",
                    "Number of successful epoch state transitions by event"
                ),
                &["event"],
            )?,

            sync_handler_errors: IntCounterVec::new(
                opts!(
                    "SYNC_HANDLER_ERRORS",
                    "Number of failed epoch state transitions by event"
                ),
                &["event"],
            )?,
        })
    }

    pub fn register_with_default_metrics(&self) -> Result<()> {
        let default_registry = prometheus::default_registry();

        default_registry.register(Box::new(self.hot_state_saved.clone()))?;
        default_registry.register(Box::new(self.state_summary_saved.clone()))?;
        default_registry.register(Box::new(self.hot_state_cache_lookups.clone()))?;
        default_registry.register(Box::new(self.block_replay_times.clone()))?;
        default_registry.register(Box::new(self.replayed_blocks.clone()))?;
        default_registry.register(Box::new(self.sync_state_transitions.clone()))?;
        default_registry.register(Box::new(self.sync_handler_errors.clone()))?;

        Ok(())
    }

    // Hot state storage
    pub fn register_hot_state_cache_hit(&self) {
        self.register_hot_state_cache_lookup("hit");
    }

    pub fn register_hot_state_cache_miss(&self) {
        self.register_hot_state_cache_lookup("miss");
    }

    fn register_hot_state_cache_lookup(&self, result: &str) {
        match self
            .hot_state_cache_lookups
            .get_metric_with_label_values(&[result])
        {
            Ok(counter) => counter.inc(),
            Err(error) => {
                warn!("unable to register hot state cache lookup for {result}: {error:?}")
            }
        }
    }

    // Initial sync state machine
    pub fn register_sync_state_transition(&self, event: &str) {
        match self
            .sync_state_transitions
            .get_metric_with_label_values(&[event])
        {
            Ok(counter) => counter.inc(),
            Err(error) => {
                warn!("unable to register sync state transition for {event}: {error:?}")
            }
        }
    }

    pub fn register_sync_handler_error(&self, event: &str) {
        match self.sync_handler_errors.get_metric_with_label_values(&[event]) {
            Ok(counter) => counter.inc(),
            Err(error) => warn!("unable to register sync handler error for {event}: {error:?}"),
        }
    }

    #[must_use]
    pub fn hot_state_cache_lookups(&self, result: &str) -> u64 {
        self.hot_state_cache_lookups
            .get_metric_with_label_values(&[result])
            .map(|counter| counter.get())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn sync_state_transitions(&self, event: &str) -> u64 {
        self.sync_state_transitions
            .get_metric_with_label_values(&[event])
            .map(|counter| counter.get())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn sync_handler_errors(&self, event: &str) -> u64 {
        self.sync_handler_errors
            .get_metric_with_label_values(&[event])
            .map(|counter| counter.get())
            .unwrap_or_default()
    }
}
