pub use crate::{
    error::Error,
    hot::{HotStateManager, StateCaches},
    replay::BlockReplayer,
    state_gen_config::StateGenConfig,
    storage::{BlockByRoot, BlockRootBySlot, StateByBlockRoot, Storage, SummaryByBlockRoot},
    traits::{BlockSource, StateStorage, StateTransition},
    transition::TrustedTransition,
};

mod error;
mod hot;
mod replay;
mod state_gen_config;
mod storage;
mod traits;
mod transition;
