//! Transport implementations for swarmlink.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](swarmlink_core::Transport) trait from `swarmlink-core`:
//!
//! - [`SerialTransport`]: USB virtual COM ports and TTL UART adapters
//!
//! Transports push received bytes into the engine one at a time through a
//! shared [`LinkRegistry`](swarmlink_core::LinkRegistry).
//!
//! # Example
//!
//! ```no_run
//! use swarmlink_core::{LinkRegistry, Transport};
//! use swarmlink_transport::SerialTransport;
//!
//! # async fn example() -> swarmlink_core::Result<()> {
//! let registry = LinkRegistry::new();
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 115_200, registry.clone()).await?;
//!
//! // GFWV request; the response is dispatched to whichever engine
//! // registered for transport.link_id().
//! transport.transmit(&[0x7F, 0x02, 0x54, 0x08, 0x9E, 0xC6]).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
