//! Transport boundary for the radio link.
//!
//! The link is split in two directions. Outbound bytes go through the
//! [`Transport`] trait, which the command context drives. Inbound bytes
//! arrive asynchronously in whatever context the platform delivers them
//! (a reader task, a UART interrupt shim) and are pushed, one byte at a
//! time, into a [`ByteSink`] looked up through the
//! [`LinkRegistry`](crate::registry::LinkRegistry).
//!
//! Protocol engines (the Bee engine in `swarmlink-bee`) operate on these
//! traits rather than on a serial port, so the same engine runs against
//! real hardware and against `MockLink` from `swarmlink-test-harness`.

use async_trait::async_trait;

use crate::error::Result;
use crate::registry::LinkId;

/// Outbound half of a byte-oriented link.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit raw wire bytes.
    ///
    /// Fire-and-forget from the engine's point of view: the call returns
    /// once the bytes are handed to the link. When transmission has
    /// finished the implementation must dispatch
    /// [`ByteSink::on_transmit_complete`] for its [`LinkId`], which re-arms
    /// reception for the solicited response.
    async fn transmit(&mut self, data: &[u8]) -> Result<()>;

    /// Close the link.
    ///
    /// After `close()`, `transmit()` should return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the link is currently open.
    fn is_connected(&self) -> bool;

    /// Identity under which inbound bytes of this link are dispatched.
    fn link_id(&self) -> LinkId;
}

/// Inbound half of a link: the receive context.
///
/// Both methods are called from the transport's receive context and must
/// complete in small, bounded time without blocking on the command context.
pub trait ByteSink: Send + Sync {
    /// Called once per received byte, in arrival order.
    fn on_byte_received(&self, byte: u8);

    /// Called once after each completed transmission.
    fn on_transmit_complete(&self);
}
