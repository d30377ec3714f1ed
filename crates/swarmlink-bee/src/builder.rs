//! BeeBuilder -- fluent builder for constructing [`BeeNode`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, frame capacity, CRC span, and the response
//! timeout before the link is opened.
//!
//! # Example
//!
//! ```no_run
//! use swarmlink_bee::builder::BeeBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> swarmlink_core::Result<()> {
//! let node = BeeBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(115_200)
//!     .response_timeout(Duration::from_millis(300))
//!     .build()
//!     .await?;
//! println!("firmware {}", node.firmware_version().await?);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use swarmlink_core::{Error, LinkRegistry, Result, Transport};
use swarmlink_transport::{SerialConfig, SerialTransport};

use crate::exchange::{ExchangeConfig, ExchangeCoordinator};
use crate::frame::{CrcSpan, DEFAULT_FRAME_CAPACITY, FrameCodec, MIN_WIRE_LEN};
use crate::node::BeeNode;

/// Largest accepted frame capacity.
pub const MAX_FRAME_CAPACITY: usize = 1024;

/// Fluent builder for [`BeeNode`].
///
/// Every setting has a default matching a factory-configured module, so the
/// simplest usage is:
///
/// ```ignore
/// let node = BeeBuilder::new().serial_port("/dev/ttyUSB0").build().await?;
/// ```
#[derive(Debug, Clone)]
pub struct BeeBuilder {
    serial_port: Option<String>,
    serial: SerialConfig,
    response_timeout: Duration,
    frame_capacity: usize,
    crc_span: CrcSpan,
    event_capacity: usize,
}

impl Default for BeeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BeeBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        BeeBuilder {
            serial_port: None,
            serial: SerialConfig::default(),
            response_timeout: Duration::from_millis(500),
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            crc_span: CrcSpan::Logical,
            event_capacity: 32,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default baud rate (115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.serial.baud_rate = baud;
        self
    }

    /// Replace the full serial configuration.
    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial = config;
        self
    }

    /// Set how long each command waits for its response (default: 500ms).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the frame buffer capacity in bytes (default: 128).
    pub fn frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    /// Choose which bytes the frame CRC covers (default: logical bytes only).
    pub fn crc_span(mut self, span: CrcSpan) -> Self {
        self.crc_span = span;
        self
    }

    /// Set the capacity of the node event channel (default: 32).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    fn exchange_config(&self) -> Result<ExchangeConfig> {
        if !(MIN_WIRE_LEN..=MAX_FRAME_CAPACITY).contains(&self.frame_capacity) {
            return Err(Error::InvalidArgument(format!(
                "frame capacity {} outside {MIN_WIRE_LEN}..={MAX_FRAME_CAPACITY}",
                self.frame_capacity
            )));
        }
        if self.response_timeout.is_zero() {
            return Err(Error::InvalidArgument(
                "response timeout must be non-zero".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidArgument(
                "event capacity must be non-zero".into(),
            ));
        }
        Ok(ExchangeConfig {
            response_timeout: self.response_timeout,
            codec: FrameCodec::new(self.frame_capacity, self.crc_span),
            event_capacity: self.event_capacity,
        })
    }

    /// Build a [`BeeNode`] with a caller-provided transport.
    ///
    /// `registry` must be the registry the transport dispatches received
    /// bytes through. This is the entry point for tests (pass a `MockLink`
    /// from `swarmlink-test-harness`) and for custom links.
    pub fn build_with_transport(
        self,
        transport: Box<dyn Transport>,
        registry: Arc<LinkRegistry>,
    ) -> Result<BeeNode> {
        let config = self.exchange_config()?;
        let coordinator = ExchangeCoordinator::attach(transport, &registry, config)?;
        Ok(BeeNode::new(coordinator, registry))
    }

    /// Build a [`BeeNode`] over a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<BeeNode> {
        let port = self
            .serial_port
            .clone()
            .ok_or_else(|| Error::InvalidArgument("serial_port is required for build()".into()))?;
        // Validate before touching the port.
        self.exchange_config()?;
        let registry = LinkRegistry::new();
        let transport =
            SerialTransport::open_with_config(&port, self.serial.clone(), registry.clone()).await?;
        self.build_with_transport(Box::new(transport), registry)
    }
}
