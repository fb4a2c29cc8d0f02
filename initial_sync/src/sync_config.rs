use core::{num::NonZeroUsize, time::Duration};

use derivative::Derivative;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Derivative, Deserialize, Serialize)]
#[derivative(Default)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Number of epochs tracked at the same time.
    #[derivative(Default(value = "nonzero!(8_usize)"))]
    pub lookahead_epochs: NonZeroUsize,
    /// How long an epoch may stay sent before it is scheduled again.
    #[derivative(Default(value = "Duration::from_secs(60)"))]
    pub stale_epoch_timeout: Duration,
    #[derivative(Default(value = "4"))]
    pub max_window_extensions: u64,
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn default_config_round_trips_through_json() -> Result<()> {
        let config = SyncConfig::default();
        let json = serde_json::to_string(&config)?;

        assert_eq!(serde_json::from_str::<SyncConfig>(&json)?, config);
        assert_eq!(config.lookahead_epochs, nonzero!(8_usize));
        assert_eq!(config.max_window_extensions, 4);

        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<SyncConfig>(r#"{"lookahead": 4}"#).is_err());
    }
}
