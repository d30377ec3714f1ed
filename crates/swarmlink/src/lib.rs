//! # swarmlink -- Host engine for Swarm Bee radio modules
//!
//! `swarmlink` is an asynchronous Rust library for driving Swarm Bee class
//! ranging/data radio modules over their framed binary serial API. It
//! handles byte stuffing, CRC protection, the single-outstanding-request
//! exchange, and device error translation, and exposes every module command
//! as a typed async method.
//!
//! ## Quick Start
//!
//! ```no_run
//! use swarmlink::bee::BeeBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let node = BeeBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .baud_rate(115_200)
//!         .build()
//!         .await?;
//!
//!     println!("node {} firmware {}", node.node_id().await?, node.firmware_version().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                   | Purpose                                          |
//! |-------------------------|--------------------------------------------------|
//! | `swarmlink-core`        | [`Transport`], [`ByteSink`], [`LinkRegistry`], errors |
//! | `swarmlink-transport`   | Serial transport                                 |
//! | `swarmlink-bee`         | Frame codec, command catalog, exchange engine    |
//! | **`swarmlink`**         | This facade crate -- re-exports everything       |
//!
//! ## Events
//!
//! Frames the module pushes on its own, and frames the decoder discards,
//! are published as [`NodeEvent`](bee::NodeEvent)s:
//!
//! ```no_run
//! use swarmlink::bee::{BeeNode, NodeEvent};
//! # async fn example(node: &BeeNode) {
//! let mut events = node.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         NodeEvent::Unsolicited(frame) => println!("notification {frame:?}"),
//!         other => println!("discarded: {other:?}"),
//!     }
//! }
//! # }
//! ```

pub use swarmlink_core::*;

/// Serial transport.
pub mod transport {
    pub use swarmlink_transport::*;
}

/// Bee binary-API backend.
///
/// Provides [`BeeNode`](bee::BeeNode) and [`BeeBuilder`](bee::BeeBuilder),
/// plus the frame codec and the command catalog for callers that drive a
/// transport themselves.
#[cfg(feature = "bee")]
pub mod bee {
    pub use swarmlink_bee::*;
}

/// Returns every command the enabled backends know about.
///
/// Useful for listing what a module supports (e.g. in a command picker).
///
/// # Example
///
/// ```
/// for cmd in swarmlink::supported_commands() {
///     println!("{cmd}");
/// }
/// ```
#[cfg(feature = "bee")]
pub fn supported_commands() -> Vec<&'static bee::commands::CommandDescriptor> {
    bee::commands::CATALOG.iter().collect()
}
