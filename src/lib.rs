#![cfg_attr(docsrs, feature(doc_cfg))]
//! # lcus_relay_lib
//!
//! This crate provides a library for controlling LCUS USB relay boards (LCUS-1, LCUS-2,
//! LCUS-4, LCUS-8) which expose their relays through a CH340 USB serial bridge.
//!
//! The board speaks a tiny protocol: a 6 byte frame switches one relay, a 3 byte frame
//! asks for a status dump which the board answers with one text line per relay.
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `lcus-relay` command-line tool and pulls in `serialport` and `serde`.
//!
//! ### Client Features
//! - `serialport`: Enables the synchronous [`Transport`] implementation using the `serialport` crate.
//!
//! ### Utility Features
//! - `serde`: Enables `serde` support for serializing/deserializing data structures.
//! - `bin-dependencies`: Enables all features required by the `lcus-relay` binary executable.
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "serialport")]
//! # fn main() -> lcus_relay_lib::Result<()> {
//! use lcus_relay_lib::{serialport::SerialTransport, Device};
//! use std::time::Duration;
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", Duration::from_secs(2))?;
//! let mut device = Device::new(transport)?;
//! device.set_relay(0, true)?;
//! for line in device.query_relay_status()? {
//!     println!("{}", String::from_utf8_lossy(&line));
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serialport"))]
//! # fn main() {}
//! ```

/// Local view of the relay states.
pub mod channel;
/// Relay board controller.
pub mod device;
/// Contains error types for the library.
mod error;
/// Defines the communication protocol of the relay board.
pub mod protocol;
/// Byte stream abstraction the controller talks through.
pub mod transport;

pub use channel::ChannelState;
pub use device::Device;
pub use error::{Error, Result};
pub use transport::Transport;

/// Synchronous serial port transport.
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
#[cfg(feature = "serialport")]
pub mod serialport;
