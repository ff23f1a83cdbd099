//! scopebridge-core - Capture bridge core library
//!
//! This crate implements the core of an embedded bridge that captures
//! byte-parallel print data from an IEEE-1284 SPP peripheral (a
//! Tektronix TDS2024 in the original deployment) and persists it to
//! an SD card, a 16 MiB SPI NOR flat filesystem, or a hex-framed
//! serial stream. It is `no_std`, allocation-free, and every piece of
//! hardware sits behind a trait so the whole stack runs unmodified on
//! the simulator.
//!
//! # Architecture
//!
//! - [`queue::ByteQueue`] carries bytes from the strobe interrupt to
//!   the task.
//! - [`port::ParallelReceiver`] owns the SPP handshake and statistics.
//! - [`nor::NorFlash`] and [`nor::FlatFs`] implement the on-chip
//!   storage.
//! - [`storage::StorageRouter`] dispatches uniform file operations
//!   over the three backends and handles fail-over.
//! - [`runloop::RunLoop`] is the single cooperative task driving it
//!   all.
//!
//! # Example
//!
//! ```ignore
//! use scopebridge_core::runloop::{RunLoop, RunLoopConfig};
//!
//! let receiver = ParallelReceiver::new(pins, clock);
//! let router = StorageRouter::new(sd, nor, hex);
//! let mut runloop = RunLoop::new(receiver, router, observer, mem,
//!                                clock, RunLoopConfig::default());
//! runloop.run();
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod clock;
pub mod config;
pub mod error;
pub mod nor;
pub mod port;
pub mod queue;
pub mod runloop;
pub mod storage;

pub use error::{ErrorKind, Result};
