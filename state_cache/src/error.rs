use core::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not obtain {cache} lock in {} ms", timeout.as_millis())]
    CacheLockTimeout {
        cache: &'static str,
        timeout: Duration,
    },
}
