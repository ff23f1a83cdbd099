//! SPI NOR flash: low-level driver and the flat filesystem on top

mod bus;
mod driver;
mod flatfs;
pub mod opcodes;

pub use bus::{SpiBus, SpiCommand};
pub use driver::{JedecId, NorFlash};
pub use flatfs::{DirEntry, FlatFs, ENTRY_LEN, STATUS_ACTIVE, STATUS_DELETED, STATUS_EMPTY};
