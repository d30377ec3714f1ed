//! swarmlink-test-harness: Test utilities and mock links for swarmlink.
//!
//! This crate provides [`MockLink`] for deterministic testing of protocol
//! engines without a radio module attached.

pub mod mock_link;

pub use mock_link::{MockHandle, MockLink};
