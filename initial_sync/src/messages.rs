use std::sync::Arc;

use anyhow::Result;
use futures::channel::mpsc::UnboundedSender;
use log::debug;
use types::phase0::{containers::BeaconBlock, primitives::Epoch};

use crate::error::Error;

#[derive(Debug)]
pub struct ReadyBlocks {
    pub epoch: Epoch,
    pub blocks: Vec<Arc<BeaconBlock>>,
}

impl ReadyBlocks {
    pub fn send(self, tx: &UnboundedSender<Self>) -> Result<()> {
        let epoch = self.epoch;

        if let Err(error) = tx.unbounded_send(self) {
            debug!("send to block importer failed because the receiver was dropped: {error:?}");
            return Err(Error::BlocksNotSent { epoch }.into());
        }

        Ok(())
    }
}
