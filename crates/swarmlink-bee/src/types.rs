//! Value types exchanged with the module.

use std::fmt;
use std::str::FromStr;

use swarmlink_core::{Error, Result};

/// A 48-bit node identifier.
///
/// Transmitted most significant byte first. Displayed and parsed as twelve
/// hexadecimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Largest representable id. As a destination it means "any node that
    /// sends an id notification".
    pub const BROADCAST: NodeId = NodeId(0xFFFF_FFFF_FFFF);

    /// Largest id a node may be configured with.
    pub const MAX_ASSIGNABLE: NodeId = NodeId(0xFFFF_FFFF_FFFE);

    /// Wrap a raw 48-bit value.
    pub fn new(raw: u64) -> Result<Self> {
        if raw > Self::BROADCAST.0 {
            return Err(Error::InvalidArgument(format!(
                "node id 0x{raw:X} exceeds 48 bits"
            )));
        }
        Ok(NodeId(raw))
    }

    /// The raw 48-bit value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Decode six big-endian bytes.
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        NodeId(
            bytes
                .iter()
                .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
        )
    }

    /// Encode as six big-endian bytes.
    pub fn to_bytes(self) -> [u8; 6] {
        let be = self.0.to_be_bytes();
        [be[2], be[3], be[4], be[5], be[6], be[7]]
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012X}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
        if digits.is_empty() || digits.len() > 12 {
            return Err(Error::InvalidArgument(format!(
                "node id {s:?} must be 1 to 12 hex digits"
            )));
        }
        let raw = u64::from_str_radix(digits, 16)
            .map_err(|e| Error::InvalidArgument(format!("node id {s:?}: {e}")))?;
        NodeId::new(raw)
    }
}

/// Firmware version as reported by GFWV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub release_candidate: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.release_candidate != 0 {
            write!(f, "-rc{}", self.release_candidate)?;
        }
        Ok(())
    }
}

/// The module's 96-bit MCU unique id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniqueId(pub [u8; 12]);

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Single-byte completion status returned by action commands.
///
/// Zero is success; any other value means the device could not complete the
/// action (for SSET: settings verification failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            f.write_str("ok")
        } else {
            write!(f, "failed ({})", self.0)
        }
    }
}

/// When SDAT hands the payload to the air interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTiming {
    /// Transmit right away.
    Immediate,
    /// Wait for the destination's next blink. The receiver must be enabled
    /// to hear blinks.
    AfterBlink,
}

impl SendTiming {
    pub fn as_byte(self) -> u8 {
        match self {
            SendTiming::Immediate => 0,
            SendTiming::AfterBlink => 1,
        }
    }
}

impl TryFrom<u8> for SendTiming {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SendTiming::Immediate),
            1 => Ok(SendTiming::AfterBlink),
            other => Err(Error::InvalidArgument(format!(
                "send option {other} outside 0..=1"
            ))),
        }
    }
}

/// BDAT operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastMode {
    /// Broadcast the data now.
    Immediate { data: Vec<u8> },
    /// Broadcast after any node id blink, for up to `timeout_ms`
    /// (0 disables the timeout).
    AfterBlink { data: Vec<u8>, timeout_ms: u16 },
    /// Cancel a pending after-blink broadcast.
    Cancel,
}

impl BroadcastMode {
    pub fn option_byte(&self) -> u8 {
        match self {
            BroadcastMode::Immediate { .. } => 0,
            BroadcastMode::AfterBlink { .. } => 1,
            BroadcastMode::Cancel => 2,
        }
    }
}

/// Result of a BDAT command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastReceipt {
    /// Immediate broadcast or cancel: completion status.
    Completed(Status),
    /// After-blink broadcast queued under this payload id.
    Queued { payload_id: [u8; 8] },
}

/// A message read out with GDAT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedData {
    pub sender: NodeId,
    pub data: Vec<u8>,
}
