//! Serial port transport for radio modules.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for USB virtual COM ports and UART adapters.
//!
//! The port is split in two. The write half stays with the transport and is
//! driven by `transmit()`. The read half moves into a reader task that
//! dispatches every received byte, in order, to the engine registered for
//! this link. The engine is reached only through the [`LinkRegistry`].
//!
//! # Example
//!
//! ```no_run
//! use swarmlink_core::LinkRegistry;
//! use swarmlink_transport::{SerialConfig, SerialTransport};
//!
//! # async fn example() -> swarmlink_core::Result<()> {
//! let registry = LinkRegistry::new();
//! let config = SerialConfig {
//!     baud_rate: 115_200,
//!     ..Default::default()
//! };
//! let transport = SerialTransport::open_with_config("/dev/ttyUSB0", config, registry).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;

use swarmlink_core::{Error, LinkId, LinkRegistry, Result, Transport};

/// Default UART speed of the module's binary API.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read chunk size of the reader task.
const READ_CHUNK: usize = 256;

/// Serial port configuration.
///
/// Defaults match the module's factory UART settings:
/// - 115200 baud
/// - 8 data bits
/// - 1 stop bit
/// - No parity
/// - No flow control
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (e.g., 9600, 115200, 921600)
    pub baud_rate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1)
    pub stop_bits: StopBits,
    /// Parity checking (typically None)
    pub parity: Parity,
    /// Flow control (typically None)
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial port transport for a radio module.
pub struct SerialTransport {
    writer: Option<WriteHalf<SerialStream>>,
    reader: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    registry: Arc<LinkRegistry>,
    link: LinkId,
    port_name: String,
}

impl SerialTransport {
    /// Open a serial port with the given baud rate and default settings.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate, 115200 for a factory-configured module
    /// * `registry` - Registry through which received bytes are dispatched
    pub async fn open(port: &str, baud_rate: u32, registry: Arc<LinkRegistry>) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config, registry).await
    }

    /// Open a serial port with full configuration control.
    ///
    /// Spawns the reader task, so this must be called within a Tokio
    /// runtime.
    pub async fn open_with_config(
        port: &str,
        config: SerialConfig,
        registry: Arc<LinkRegistry>,
    ) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "Opening serial port"
        );

        let mut serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("Failed to open serial port {}: {}", port, e))
            })?;

        // USB-UART bridges commonly wire DTR/RTS to the module's reset and
        // boot pins; leave both released.
        if let Err(e) = serial_stream.write_data_terminal_ready(false) {
            tracing::warn!(port = %port, error = %e, "Failed to de-assert DTR");
        }
        if let Err(e) = serial_stream.write_request_to_send(false) {
            tracing::warn!(port = %port, error = %e, "Failed to de-assert RTS");
        }

        let link = registry.allocate();
        let cancel = CancellationToken::new();
        let (read_half, write_half) = tokio::io::split(serial_stream);
        let reader = tokio::spawn(read_loop(
            read_half,
            registry.clone(),
            link,
            cancel.clone(),
            port.to_string(),
        ));

        tracing::info!(port = %port, baud_rate = config.baud_rate, link = %link, "Serial port opened successfully");

        Ok(Self {
            writer: Some(write_half),
            reader: Some(reader),
            cancel,
            registry,
            link,
            port_name: port.to_string(),
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Reader task: pump received bytes into the registry until cancelled or the
/// port fails.
async fn read_loop(
    mut port: ReadHalf<SerialStream>,
    registry: Arc<LinkRegistry>,
    link: LinkId,
    cancel: CancellationToken,
    port_name: String,
) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => break,
            result = port.read(&mut buf) => match result {
                Ok(0) => {
                    tracing::warn!(port = %port_name, "Serial port reached end of stream");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(port = %port_name, error = %e, "Failed to receive data");
                    break;
                }
            },
        };
        tracing::trace!(port = %port_name, bytes = n, data = ?&buf[..n], "Received data");
        registry.dispatch_bytes(link, &buf[..n]);
    }
    tracing::debug!(port = %port_name, "Reader task stopped");
}

#[async_trait]
impl Transport for SerialTransport {
    async fn transmit(&mut self, data: &[u8]) -> Result<()> {
        let port = self.writer.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            "Sending data"
        );

        port.write_all(data).await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            if e.kind() == std::io::ErrorKind::BrokenPipe
                || e.kind() == std::io::ErrorKind::NotConnected
            {
                Error::NotConnected
            } else {
                Error::Io(e)
            }
        })?;

        port.flush().await.map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to flush serial port");
            Error::Io(e)
        })?;

        self.registry.dispatch_transmit_complete(self.link);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                tracing::warn!(port = %self.port_name, error = %e, "Reader task ended abnormally");
            }
        }
        if let Some(mut port) = self.writer.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");
            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }
            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    fn link_id(&self) -> LinkId {
        self.link
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.writer.is_some() {
            tracing::debug!(port = %self.port_name, "SerialTransport dropped, closing port");
        }
    }
}
