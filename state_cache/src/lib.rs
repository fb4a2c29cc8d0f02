pub use crate::{
    boundary_root_cache::BoundaryRootCache, error::Error, hot_state_cache::HotStateCache,
};

mod boundary_root_cache;
mod error;
mod hot_state_cache;
