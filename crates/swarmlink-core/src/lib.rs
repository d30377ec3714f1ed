//! swarmlink-core: Core traits, error taxonomy, and link registry for
//! swarmlink.
//!
//! This crate defines the device-agnostic pieces shared by the protocol
//! engine, the transports, and the test harness.
//!
//! # Key types
//!
//! - [`Transport`] -- outbound byte transmission
//! - [`ByteSink`] -- inbound per-byte receive context
//! - [`LinkRegistry`] / [`LinkId`] -- handle table routing inbound bytes to
//!   the engine that owns a link
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod registry;
pub mod transport;

pub use error::{Error, Result};
pub use registry::{LinkId, LinkRegistry};
pub use transport::{ByteSink, Transport};
