use core::{num::NonZeroUsize, time::Duration};

use derivative::Derivative;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Derivative, Deserialize, Serialize)]
#[derivative(Default)]
#[serde(default, deny_unknown_fields)]
pub struct StateGenConfig {
    /// Number of states kept in [`state_cache::HotStateCache`].
    #[derivative(Default(value = "nonzero!(16_usize)"))]
    pub hot_state_cache_size: NonZeroUsize,
    #[derivative(Default(value = "Duration::from_secs(10)"))]
    pub try_lock_timeout: Duration,
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn missing_fields_take_default_values() -> Result<()> {
        let config = serde_json::from_str::<StateGenConfig>(r#"{"hot_state_cache_size": 4}"#)?;

        assert_eq!(
            config,
            StateGenConfig {
                hot_state_cache_size: nonzero!(4_usize),
                ..StateGenConfig::default()
            },
        );

        assert_eq!(config.try_lock_timeout, Duration::from_secs(10));

        Ok(())
    }

    #[test]
    fn zero_cache_size_is_rejected() {
        assert!(serde_json::from_str::<StateGenConfig>(r#"{"hot_state_cache_size": 0}"#).is_err());
    }
}
