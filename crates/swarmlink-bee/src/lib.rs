//! Swarm Bee binary-API protocol engine for swarmlink.
//!
//! This crate implements the framed, CRC-protected binary API spoken by
//! Swarm Bee class ranging/data radio modules over a serial link. It
//! provides:
//!
//! - **Frame codec** ([`frame`]) -- build and byte-stuff frames, and
//!   reassemble them from a stream fed one byte at a time.
//! - **Command catalog** ([`commands`]) -- validated request builders and
//!   positional response parsers for every device command.
//! - **Exchange coordinator** ([`exchange`]) -- the single-outstanding-request
//!   state machine bridging the command context and the receive context.
//! - **Error translation** ([`status`]) -- device error frames and discarded
//!   frames mapped onto [`Error`](swarmlink_core::Error).
//! - **BeeNode** ([`node`]) -- the typed command API.
//! - **BeeBuilder** ([`builder`]) -- fluent configuration and construction.
//!
//! # Example
//!
//! ```
//! use swarmlink_bee::commands::cmd_set_tx_power;
//! use swarmlink_bee::frame::{FrameCodec, FrameType};
//!
//! let codec = FrameCodec::default();
//! let wire = cmd_set_tx_power(63).unwrap().to_wire(&codec).unwrap();
//! assert_eq!(wire, vec![0x7F, 0x03, 0x55, 0x05, 0x3F, 0x53, 0x14]);
//!
//! let frame = codec.decode(&wire).unwrap();
//! assert_eq!(frame.frame_type, FrameType::Set);
//! assert_eq!(frame.payload, vec![63]);
//! ```

pub mod builder;
pub mod commands;
pub mod events;
pub mod exchange;
pub mod frame;
pub mod node;
pub mod status;
pub mod types;

pub use builder::BeeBuilder;
pub use events::NodeEvent;
pub use exchange::{ExchangeCoordinator, Phase};
pub use frame::{CrcSpan, FrameCodec, FrameType, LogicalFrame};
pub use node::BeeNode;
pub use types::{
    BroadcastMode, BroadcastReceipt, FirmwareVersion, NodeId, ReceivedData, SendTiming, Status,
    UniqueId,
};
