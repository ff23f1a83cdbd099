//! scopebridge-sim - In-memory hardware doubles
//!
//! Emulations of every hardware seam the core defines: a W25Q128-class
//! flash chip behind [`flash::MemFlash`], the parallel port peer
//! behind [`port::SimPort`], a scriptable serial link, an SD card with
//! ejectable media, and a controllable clock. They make the whole
//! bridge testable on a workstation without a single wire.
//!
//! All doubles are cheap cloneable handles over shared state, so a
//! test can keep a handle while the component under test owns another.

pub mod card;
pub mod clock;
pub mod flash;
pub mod link;
pub mod mem;
pub mod observer;
pub mod port;

pub use card::SimCard;
pub use clock::SimClock;
pub use flash::MemFlash;
pub use link::SimLink;
pub use mem::FixedMemGauge;
pub use observer::{Event, RecordingObserver};
pub use port::SimPort;
