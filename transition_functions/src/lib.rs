pub mod combined;

pub mod unphased {
    pub use block_processing::{apply_deposits, process_block, process_block_header};
    pub use error::Error;
    pub use slot_processing::{process_slot, ProcessSlots};

    mod block_processing;
    mod error;
    mod slot_processing;
}
