//! BeeNode -- typed command API for one radio module.
//!
//! This module ties the command catalog ([`commands`]) and the exchange
//! coordinator ([`exchange`](crate::exchange)) together. Every catalogued
//! command is available two ways:
//!
//! - [`BeeNode::fire`] transmits a built [`Request`] and returns as soon as
//!   the transport accepted it;
//! - a typed method (`set_tx_power`, `firmware_version`, ...) transmits,
//!   waits for the response, resolves device errors, and decodes the fields.
//!
//! Commands are never retried; a timeout, CRC failure, or device error goes
//! straight back to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use swarmlink_core::{Error, LinkId, LinkRegistry, Result};

use crate::commands::{self, Encoding, Request};
use crate::events::NodeEvent;
use crate::exchange::{ExchangeCoordinator, Pending, Phase};
use crate::frame::LogicalFrame;
use crate::status;
use crate::types::{
    BroadcastMode, BroadcastReceipt, FirmwareVersion, NodeId, ReceivedData, SendTiming, Status,
    UniqueId,
};

/// A radio module reachable over one link.
///
/// Constructed via [`BeeBuilder`](crate::builder::BeeBuilder).
pub struct BeeNode {
    coordinator: Arc<ExchangeCoordinator>,
    registry: Arc<LinkRegistry>,
}

impl BeeNode {
    pub(crate) fn new(coordinator: Arc<ExchangeCoordinator>, registry: Arc<LinkRegistry>) -> Self {
        BeeNode {
            coordinator,
            registry,
        }
    }

    /// Id of the link this node is attached to.
    pub fn link_id(&self) -> LinkId {
        self.coordinator.link_id()
    }

    /// Current exchange state.
    pub fn phase(&self) -> Phase {
        self.coordinator.phase()
    }

    /// Response timeout applied to every command.
    pub fn response_timeout(&self) -> Duration {
        self.coordinator.response_timeout()
    }

    /// Subscribe to notifications and discarded frames.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.coordinator.subscribe()
    }

    /// The underlying exchange coordinator.
    pub fn coordinator(&self) -> &Arc<ExchangeCoordinator> {
        &self.coordinator
    }

    // ---------------------------------------------------------------
    // Generic paths
    // ---------------------------------------------------------------

    /// Transmit a request without waiting for the device's answer.
    ///
    /// For framed commands the exchange stays claimed until its response
    /// arrives or its deadline passes; a command issued before then sees
    /// [`Error::TransportBusy`].
    pub async fn fire(&self, request: &Request) -> Result<()> {
        let wire = request.to_wire(self.coordinator.codec())?;
        match request.descriptor().encoding {
            Encoding::Frame { opcode, .. } => {
                debug!(command = request.mnemonic(), "fire");
                self.coordinator.send(opcode, &wire).await.map(drop)
            }
            Encoding::Ascii(_) => self.coordinator.transmit_raw(&wire).await,
        }
    }

    /// Transmit a framed request and return the handle to await its response.
    pub async fn send(&self, request: &Request) -> Result<Pending> {
        let Encoding::Frame { opcode, .. } = request.descriptor().encoding else {
            return Err(Error::InvalidArgument(format!(
                "{} is not a framed command",
                request.mnemonic()
            )));
        };
        let wire = request.to_wire(self.coordinator.codec())?;
        self.coordinator.send(opcode, &wire).await
    }

    /// Wait for the response to a request sent with [`send`](Self::send).
    ///
    /// Error-typed responses resolve to [`Error::DeviceError`].
    pub async fn await_response(&self, pending: Pending) -> Result<LogicalFrame> {
        let frame = self.coordinator.await_response(pending).await?;
        status::check_response(frame)
    }

    /// Transmit a request and wait for its response.
    pub async fn fire_and_wait(&self, request: &Request) -> Result<LogicalFrame> {
        if !request.expects_response() {
            return Err(Error::InvalidArgument(format!(
                "{} has no response to wait for",
                request.mnemonic()
            )));
        }
        let pending = self.send(request).await?;
        let result = self.await_response(pending).await;
        if let Err(e) = &result {
            debug!(command = request.mnemonic(), error = %e, "command failed");
        }
        result
    }

    // ---------------------------------------------------------------
    // Identity and settings
    // ---------------------------------------------------------------

    /// SNID: assign the node id. Returns the id the module reports.
    pub async fn set_node_id(&self, id: NodeId) -> Result<NodeId> {
        let frame = self.fire_and_wait(&commands::cmd_set_node_id(id)?).await?;
        commands::parse_node_id(&frame)
    }

    /// GNID: read the node id.
    pub async fn node_id(&self) -> Result<NodeId> {
        let frame = self.fire_and_wait(&commands::cmd_get_node_id()).await?;
        commands::parse_node_id(&frame)
    }

    /// SSET: persist the current settings on the module.
    pub async fn save_settings(&self) -> Result<Status> {
        let frame = self.fire_and_wait(&commands::cmd_save_settings()).await?;
        commands::parse_status(&frame, &commands::SSET)
    }

    /// RSET: reload the persisted settings.
    pub async fn restore_settings(&self) -> Result<Status> {
        let frame = self.fire_and_wait(&commands::cmd_restore_settings()).await?;
        commands::parse_status(&frame, &commands::RSET)
    }

    /// SFAC: restore factory defaults.
    pub async fn factory_reset(&self) -> Result<Status> {
        let frame = self.fire_and_wait(&commands::cmd_factory_reset()).await?;
        commands::parse_status(&frame, &commands::SFAC)
    }

    /// STXP: set transmit power (0..=63). Returns the applied step.
    pub async fn set_tx_power(&self, power: u8) -> Result<u8> {
        let frame = self.fire_and_wait(&commands::cmd_set_tx_power(power)?).await?;
        commands::parse_tx_power(&frame)
    }

    /// SSYC: select the air sync word (0..=12). Returns the applied word.
    pub async fn set_sync_word(&self, sync: u8) -> Result<u8> {
        let frame = self.fire_and_wait(&commands::cmd_set_sync_word(sync)?).await?;
        commands::parse_sync_word(&frame)
    }

    /// GFWV: read the firmware version.
    pub async fn firmware_version(&self) -> Result<FirmwareVersion> {
        let frame = self.fire_and_wait(&commands::cmd_firmware_version()).await?;
        commands::parse_firmware_version(&frame)
    }

    /// GUID: read the MCU unique id.
    pub async fn unique_id(&self) -> Result<UniqueId> {
        let frame = self.fire_and_wait(&commands::cmd_unique_id()).await?;
        commands::parse_unique_id(&frame)
    }

    /// SUAS: change the module's UART speed. The host side of the link must
    /// be reopened at the new rate afterwards.
    pub async fn set_uart_speed(&self, baud: u32) -> Result<u32> {
        let frame = self.fire_and_wait(&commands::cmd_set_uart_speed(baud)).await?;
        commands::parse_uart_speed(&frame)
    }

    /// EAIR: enable or disable the air interface.
    pub async fn set_air_interface(&self, enable: bool) -> Result<bool> {
        let frame = self.fire_and_wait(&commands::cmd_air_interface(enable)).await?;
        commands::parse_flag(&frame, &commands::EAIR)
    }

    /// SBIV: set the blink interval in milliseconds.
    pub async fn set_blink_interval(&self, interval_ms: u16) -> Result<u16> {
        let frame = self
            .fire_and_wait(&commands::cmd_set_blink_interval(interval_ms))
            .await?;
        commands::parse_blink_interval(&frame)
    }

    // ---------------------------------------------------------------
    // Data
    // ---------------------------------------------------------------

    /// SDAT: send a payload to one node.
    pub async fn send_data(
        &self,
        timing: SendTiming,
        dest: NodeId,
        data: &[u8],
        timeout_ms: u16,
    ) -> Result<Status> {
        let request = commands::cmd_send_data(timing, dest, data, timeout_ms)?;
        let frame = self.fire_and_wait(&request).await?;
        commands::parse_status(&frame, &commands::SDAT)
    }

    /// BDAT: broadcast, queue a broadcast after the next blink, or cancel.
    pub async fn broadcast_data(&self, mode: &BroadcastMode) -> Result<BroadcastReceipt> {
        let frame = self
            .fire_and_wait(&commands::cmd_broadcast_data(mode)?)
            .await?;
        commands::parse_broadcast(&frame, mode)
    }

    /// GDAT: read out the oldest pending message, if any.
    pub async fn pending_data(&self) -> Result<Option<ReceivedData>> {
        let frame = self.fire_and_wait(&commands::cmd_get_data()).await?;
        commands::parse_received_data(&frame)
    }

    /// EDAN: enable or disable data notifications.
    pub async fn set_data_notification(&self, enable: bool) -> Result<bool> {
        let frame = self
            .fire_and_wait(&commands::cmd_data_notification(enable))
            .await?;
        commands::parse_flag(&frame, &commands::EDAN)
    }

    /// EIDN: enable or disable node id broadcast notifications.
    pub async fn set_node_id_notification(&self, enable: bool) -> Result<bool> {
        let frame = self
            .fire_and_wait(&commands::cmd_node_id_notification(enable))
            .await?;
        commands::parse_flag(&frame, &commands::EIDN)
    }

    /// FNIN: set the user data carried in node id notifications.
    pub async fn fill_node_id_notification(&self, data: &[u8]) -> Result<Status> {
        let frame = self
            .fire_and_wait(&commands::cmd_fill_node_id_notification(data)?)
            .await?;
        commands::parse_status(&frame, &commands::FNIN)
    }

    /// FRAD: fill the ranging data buffer. Empty data clears it.
    pub async fn set_ranging_data(&self, data: &[u8]) -> Result<Status> {
        let frame = self
            .fire_and_wait(&commands::cmd_set_ranging_data(data)?)
            .await?;
        commands::parse_status(&frame, &commands::FRAD_SET)
    }

    /// FRAD: read back up to `max_len` bytes of the ranging data buffer.
    pub async fn ranging_data(&self, max_len: u8) -> Result<Vec<u8>> {
        let frame = self
            .fire_and_wait(&commands::cmd_get_ranging_data(max_len)?)
            .await?;
        commands::parse_ranging_data(&frame)
    }

    /// SBIN: switch the module from its text API to the binary API.
    pub async fn set_binary_mode(&self) -> Result<()> {
        self.fire(&commands::cmd_binary_mode()).await
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Close the link and retire its registry entry.
    pub async fn close(&self) -> Result<()> {
        self.registry.unregister(self.link_id());
        self.coordinator.close().await
    }
}
