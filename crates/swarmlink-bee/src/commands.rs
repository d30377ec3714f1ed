//! Bee command catalog: request builders and response parsers.
//!
//! Every device command has a static [`CommandDescriptor`] in [`CATALOG`], a
//! builder `cmd_*` that validates arguments and lays out the request payload,
//! and (where the device answers) a parser `parse_*` that decodes the
//! response fields by position.
//!
//! Builders and parsers are pure. Builders reject out-of-range arguments with
//! [`Error::InvalidArgument`] before anything is encoded. Parsers never read
//! an error-typed response positionally; those resolve to
//! [`Error::DeviceError`].

use std::fmt;

use bytes::{BufMut, BytesMut};
use swarmlink_core::{Error, Result};

use crate::frame::{FrameCodec, FrameType, LogicalFrame};
use crate::status::{check_response, require_payload};
use crate::types::{
    BroadcastMode, BroadcastReceipt, FirmwareVersion, NodeId, ReceivedData, SendTiming, Status,
    UniqueId,
};

// ---------------------------------------------------------------
// Argument limits
// ---------------------------------------------------------------

/// Highest STXP power step.
pub const MAX_TX_POWER: u8 = 63;

/// Highest SSYC sync word index.
pub const MAX_SYNC_WORD: u8 = 12;

/// Largest SDAT payload.
pub const MAX_SEND_DATA: usize = 0x80;

/// Largest BDAT payload.
pub const MAX_BROADCAST_DATA: usize = 0x70;

/// Largest FNIN payload.
pub const MAX_NOTIFICATION_DATA: usize = 0xFF;

/// Largest FRAD ranging payload.
pub const MAX_RANGING_DATA: usize = 0x74;

/// Longest SDAT / BDAT blink timeout in milliseconds.
pub const MAX_BLINK_TIMEOUT_MS: u16 = 65_000;

/// ASCII command that switches the module from its text API to the binary API.
pub const BINARY_MODE_SWITCH: &str = "SBIN\r\n";

// ---------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------

/// How a command reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// A binary-API frame.
    Frame { frame_type: FrameType, opcode: u8 },
    /// A literal ASCII line, sent unframed.
    Ascii(&'static str),
}

/// Static description of one device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Four-letter mnemonic from the device manual.
    pub mnemonic: &'static str,
    /// Short description.
    pub name: &'static str,
    pub encoding: Encoding,
    /// Request payload layout.
    pub request: &'static str,
    /// Response payload layout.
    pub response: &'static str,
    /// Whether the device answers this command.
    pub expects_response: bool,
}

impl CommandDescriptor {
    /// Opcode for framed commands.
    pub fn opcode(&self) -> Option<u8> {
        match self.encoding {
            Encoding::Frame { opcode, .. } => Some(opcode),
            Encoding::Ascii(_) => None,
        }
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encoding {
            Encoding::Frame { frame_type, opcode } => write!(
                f,
                "{} 0x{:02X}/0x{:02X} {}",
                self.mnemonic,
                frame_type.as_byte(),
                opcode,
                self.name
            ),
            Encoding::Ascii(line) => {
                write!(f, "{} {:?} {}", self.mnemonic, line, self.name)
            }
        }
    }
}

const fn framed(
    mnemonic: &'static str,
    name: &'static str,
    frame_type: FrameType,
    opcode: u8,
    request: &'static str,
    response: &'static str,
) -> CommandDescriptor {
    CommandDescriptor {
        mnemonic,
        name,
        encoding: Encoding::Frame { frame_type, opcode },
        request,
        response,
        expects_response: true,
    }
}

pub const SNID: CommandDescriptor = framed(
    "SNID",
    "set node id",
    FrameType::Set,
    0x00,
    "id[6]",
    "id[0..6]",
);
pub const GNID: CommandDescriptor =
    framed("GNID", "get node id", FrameType::Get, 0x00, "-", "id[0..6]");
pub const SSET: CommandDescriptor =
    framed("SSET", "save settings", FrameType::Set, 0x01, "-", "status[0]");
pub const RSET: CommandDescriptor =
    framed("RSET", "restore settings", FrameType::Set, 0x02, "-", "status[0]");
pub const SFAC: CommandDescriptor =
    framed("SFAC", "factory reset", FrameType::Set, 0x03, "-", "status[0]");
pub const STXP: CommandDescriptor =
    framed("STXP", "set tx power", FrameType::Set, 0x05, "power", "power[0]");
pub const SSYC: CommandDescriptor =
    framed("SSYC", "set sync word", FrameType::Set, 0x06, "sync", "sync[0]");
pub const GFWV: CommandDescriptor = framed(
    "GFWV",
    "get firmware version",
    FrameType::Get,
    0x08,
    "-",
    "major minor patch rc",
);
pub const GUID: CommandDescriptor =
    framed("GUID", "get MCU unique id", FrameType::Get, 0x09, "-", "uid[0..12]");
pub const SUAS: CommandDescriptor = framed(
    "SUAS",
    "set UART speed",
    FrameType::Set,
    0x0A,
    "speed BE[4]",
    "speed BE[0..4]",
);
pub const EAIR: CommandDescriptor =
    framed("EAIR", "enable air interface", FrameType::Set, 0x0C, "flag", "flag[0]");
pub const EDAN: CommandDescriptor = framed(
    "EDAN",
    "enable data notification",
    FrameType::Set,
    0x20,
    "flag",
    "flag[0]",
);
pub const SDAT: CommandDescriptor = framed(
    "SDAT",
    "send data",
    FrameType::Set,
    0x21,
    "option id[6] len data timeout BE[2]",
    "status[0]",
);
pub const BDAT: CommandDescriptor = framed(
    "BDAT",
    "broadcast data",
    FrameType::Set,
    0x22,
    "option [len data [timeout BE[2]]]",
    "status[0] | payload id[0..8]",
);
pub const EIDN: CommandDescriptor = framed(
    "EIDN",
    "enable node id notification",
    FrameType::Aux,
    0x26,
    "flag",
    "flag[0]",
);
pub const GDAT: CommandDescriptor = framed(
    "GDAT",
    "get pending data",
    FrameType::Get,
    0x27,
    "-",
    "count[0] id[1..7] data[7..]",
);
pub const FNIN: CommandDescriptor = framed(
    "FNIN",
    "fill node id notification",
    FrameType::Set,
    0x28,
    "len data",
    "status[0]",
);
pub const FRAD_SET: CommandDescriptor = framed(
    "FRAD",
    "fill ranging data",
    FrameType::Set,
    0x2A,
    "len data",
    "status[0]",
);
pub const FRAD_GET: CommandDescriptor = framed(
    "FRAD",
    "read ranging data",
    FrameType::Aux,
    0x2A,
    "max len",
    "count[0] data[1..]",
);
pub const SBIV: CommandDescriptor = framed(
    "SBIV",
    "set blink interval",
    FrameType::Set,
    0x31,
    "interval BE[2]",
    "interval BE[0..2]",
);
pub const SBIN: CommandDescriptor = CommandDescriptor {
    mnemonic: "SBIN",
    name: "switch to binary API",
    encoding: Encoding::Ascii(BINARY_MODE_SWITCH),
    request: "ascii",
    response: "-",
    expects_response: false,
};

/// Every supported command.
pub static CATALOG: &[CommandDescriptor] = &[
    SNID, GNID, SSET, RSET, SFAC, STXP, SSYC, GFWV, GUID, SUAS, EAIR, EDAN, SDAT, BDAT, EIDN,
    GDAT, FNIN, FRAD_SET, FRAD_GET, SBIV, SBIN,
];

/// Look up catalog entries by mnemonic (case-insensitive).
///
/// FRAD has two entries (fill and read).
pub fn lookup(mnemonic: &str) -> Vec<&'static CommandDescriptor> {
    CATALOG
        .iter()
        .filter(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
        .collect()
}

// ---------------------------------------------------------------
// Requests
// ---------------------------------------------------------------

/// A validated command ready to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    descriptor: &'static CommandDescriptor,
    payload: Vec<u8>,
}

impl Request {
    fn new(descriptor: &'static CommandDescriptor, payload: Vec<u8>) -> Self {
        Request {
            descriptor,
            payload,
        }
    }

    pub fn descriptor(&self) -> &'static CommandDescriptor {
        self.descriptor
    }

    pub fn mnemonic(&self) -> &'static str {
        self.descriptor.mnemonic
    }

    /// Opcode for framed commands, `None` for ASCII ones.
    pub fn opcode(&self) -> Option<u8> {
        self.descriptor.opcode()
    }

    /// Request payload (the bytes after the opcode).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn expects_response(&self) -> bool {
        self.descriptor.expects_response
    }

    /// Produce the bytes to hand to the transport.
    pub fn to_wire(&self, codec: &FrameCodec) -> Result<Vec<u8>> {
        match self.descriptor.encoding {
            Encoding::Frame { frame_type, opcode } => {
                codec.encode(frame_type, opcode, &self.payload)
            }
            Encoding::Ascii(line) => Ok(line.as_bytes().to_vec()),
        }
    }
}

fn check_range<T>(what: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    if value < min || value > max {
        return Err(Error::InvalidArgument(format!(
            "{what} {value} outside {min}..={max}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------
// Builders
// ---------------------------------------------------------------

/// SNID: assign the node id. The all-ones id is reserved.
pub fn cmd_set_node_id(id: NodeId) -> Result<Request> {
    if id > NodeId::MAX_ASSIGNABLE {
        return Err(Error::InvalidArgument(format!(
            "node id {id} is reserved"
        )));
    }
    Ok(Request::new(&SNID, id.to_bytes().to_vec()))
}

/// GNID: read the node id.
pub fn cmd_get_node_id() -> Request {
    Request::new(&GNID, Vec::new())
}

/// SSET: persist the current settings.
pub fn cmd_save_settings() -> Request {
    Request::new(&SSET, Vec::new())
}

/// RSET: reload the persisted settings.
pub fn cmd_restore_settings() -> Request {
    Request::new(&RSET, Vec::new())
}

/// SFAC: restore factory defaults.
pub fn cmd_factory_reset() -> Request {
    Request::new(&SFAC, Vec::new())
}

/// STXP: set transmit power, `0..=63` steps.
pub fn cmd_set_tx_power(power: u8) -> Result<Request> {
    check_range("tx power", power, 0, MAX_TX_POWER)?;
    Ok(Request::new(&STXP, vec![power]))
}

/// SSYC: select the air sync word, `0..=12`.
pub fn cmd_set_sync_word(sync: u8) -> Result<Request> {
    check_range("sync word", sync, 0, MAX_SYNC_WORD)?;
    Ok(Request::new(&SSYC, vec![sync]))
}

/// GFWV: read the firmware version.
pub fn cmd_firmware_version() -> Request {
    Request::new(&GFWV, Vec::new())
}

/// GUID: read the MCU unique id.
pub fn cmd_unique_id() -> Request {
    Request::new(&GUID, Vec::new())
}

/// SUAS: change the UART baud rate. Takes effect after the response.
pub fn cmd_set_uart_speed(baud: u32) -> Request {
    Request::new(&SUAS, baud.to_be_bytes().to_vec())
}

/// EAIR: enable or disable the air interface.
pub fn cmd_air_interface(enable: bool) -> Request {
    Request::new(&EAIR, vec![u8::from(enable)])
}

/// EDAN: enable or disable data notifications to the host.
pub fn cmd_data_notification(enable: bool) -> Request {
    Request::new(&EDAN, vec![u8::from(enable)])
}

/// SDAT: send a payload to one node.
///
/// `dest` may be [`NodeId::BROADCAST`] to send after every node id
/// notification until the timeout.
pub fn cmd_send_data(
    timing: SendTiming,
    dest: NodeId,
    data: &[u8],
    timeout_ms: u16,
) -> Result<Request> {
    if dest.raw() == 0 {
        return Err(Error::InvalidArgument(
            "destination node id 000000000000 is not addressable".into(),
        ));
    }
    check_range("send data length", data.len(), 1, MAX_SEND_DATA)?;
    check_range("blink timeout", timeout_ms, 0, MAX_BLINK_TIMEOUT_MS)?;

    let mut payload = BytesMut::with_capacity(10 + data.len());
    payload.put_u8(timing.as_byte());
    payload.put_slice(&dest.to_bytes());
    payload.put_u8(data.len() as u8);
    payload.put_slice(data);
    payload.put_u16(timeout_ms);
    Ok(Request::new(&SDAT, payload.to_vec()))
}

/// BDAT: broadcast a payload, queue one for after the next blink, or cancel.
pub fn cmd_broadcast_data(mode: &BroadcastMode) -> Result<Request> {
    let mut payload = BytesMut::new();
    payload.put_u8(mode.option_byte());
    match mode {
        BroadcastMode::Immediate { data } => {
            check_range("broadcast data length", data.len(), 1, MAX_BROADCAST_DATA)?;
            payload.put_u8(data.len() as u8);
            payload.put_slice(data);
        }
        BroadcastMode::AfterBlink { data, timeout_ms } => {
            check_range("broadcast data length", data.len(), 1, MAX_BROADCAST_DATA)?;
            check_range("blink timeout", *timeout_ms, 0, MAX_BLINK_TIMEOUT_MS)?;
            payload.put_u8(data.len() as u8);
            payload.put_slice(data);
            payload.put_u16(*timeout_ms);
        }
        BroadcastMode::Cancel => {}
    }
    Ok(Request::new(&BDAT, payload.to_vec()))
}

/// EIDN: enable or disable node id broadcast notifications.
pub fn cmd_node_id_notification(enable: bool) -> Request {
    Request::new(&EIDN, vec![u8::from(enable)])
}

/// GDAT: read out the oldest pending message.
pub fn cmd_get_data() -> Request {
    Request::new(&GDAT, Vec::new())
}

/// FNIN: set the user data carried in node id notifications.
///
/// The documented range allows up to 255 bytes, but anything that does not
/// fit the frame capacity fails at encode time with
/// [`Error::EncodeOverflow`].
pub fn cmd_fill_node_id_notification(data: &[u8]) -> Result<Request> {
    check_range("notification data length", data.len(), 0, MAX_NOTIFICATION_DATA)?;
    let mut payload = Vec::with_capacity(1 + data.len());
    payload.push(data.len() as u8);
    payload.extend_from_slice(data);
    Ok(Request::new(&FNIN, payload))
}

/// FRAD (fill): set the data carried in every ranging packet. Empty data
/// clears the buffer.
pub fn cmd_set_ranging_data(data: &[u8]) -> Result<Request> {
    check_range("ranging data length", data.len(), 0, MAX_RANGING_DATA)?;
    let mut payload = Vec::with_capacity(1 + data.len());
    payload.push(data.len() as u8);
    payload.extend_from_slice(data);
    Ok(Request::new(&FRAD_SET, payload))
}

/// FRAD (read): read back up to `max_len` bytes of the ranging buffer.
pub fn cmd_get_ranging_data(max_len: u8) -> Result<Request> {
    check_range("ranging read length", max_len as usize, 0, MAX_RANGING_DATA)?;
    Ok(Request::new(&FRAD_GET, vec![max_len]))
}

/// SBIV: set the node id blink interval in milliseconds.
pub fn cmd_set_blink_interval(interval_ms: u16) -> Request {
    Request::new(&SBIV, interval_ms.to_be_bytes().to_vec())
}

/// SBIN: switch the module to the binary API. No response is expected.
pub fn cmd_binary_mode() -> Request {
    Request::new(&SBIN, Vec::new())
}

// ---------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------

/// Resolve device errors, check the opcode, and return the payload if it
/// holds at least `needed` bytes.
fn response_payload(
    frame: &LogicalFrame,
    descriptor: &CommandDescriptor,
    needed: usize,
) -> Result<Vec<u8>> {
    let frame = check_response(frame.clone())?;
    if let Some(opcode) = descriptor.opcode() {
        if frame.opcode != opcode {
            return Err(Error::Protocol(format!(
                "{} response carries opcode 0x{:02X}, expected 0x{opcode:02X}",
                descriptor.mnemonic, frame.opcode
            )));
        }
    }
    require_payload(&frame, needed, descriptor.mnemonic)?;
    Ok(frame.payload)
}

/// Decode the node id echoed by SNID or returned by GNID.
pub fn parse_node_id(frame: &LogicalFrame) -> Result<NodeId> {
    let descriptor = if frame.frame_type == FrameType::Get {
        &GNID
    } else {
        &SNID
    };
    let p = response_payload(frame, descriptor, 6)?;
    Ok(NodeId::from_bytes([p[0], p[1], p[2], p[3], p[4], p[5]]))
}

/// Decode a single-byte completion status.
pub fn parse_status(frame: &LogicalFrame, descriptor: &CommandDescriptor) -> Result<Status> {
    let p = response_payload(frame, descriptor, 1)?;
    Ok(Status(p[0]))
}

/// Decode the power step echoed by STXP.
pub fn parse_tx_power(frame: &LogicalFrame) -> Result<u8> {
    Ok(response_payload(frame, &STXP, 1)?[0])
}

/// Decode the sync word echoed by SSYC.
pub fn parse_sync_word(frame: &LogicalFrame) -> Result<u8> {
    Ok(response_payload(frame, &SSYC, 1)?[0])
}

/// Decode the GFWV response.
pub fn parse_firmware_version(frame: &LogicalFrame) -> Result<FirmwareVersion> {
    let p = response_payload(frame, &GFWV, 4)?;
    Ok(FirmwareVersion {
        major: p[0],
        minor: p[1],
        patch: p[2],
        release_candidate: p[3],
    })
}

/// Decode the GUID response.
pub fn parse_unique_id(frame: &LogicalFrame) -> Result<UniqueId> {
    let p = response_payload(frame, &GUID, 12)?;
    let mut uid = [0u8; 12];
    uid.copy_from_slice(&p[..12]);
    Ok(UniqueId(uid))
}

/// Decode the baud rate echoed by SUAS.
pub fn parse_uart_speed(frame: &LogicalFrame) -> Result<u32> {
    let p = response_payload(frame, &SUAS, 4)?;
    Ok(u32::from_be_bytes([p[0], p[1], p[2], p[3]]))
}

/// Decode an echoed enable flag (EAIR, EDAN, EIDN).
pub fn parse_flag(frame: &LogicalFrame, descriptor: &CommandDescriptor) -> Result<bool> {
    Ok(response_payload(frame, descriptor, 1)?[0] != 0)
}

/// Decode a BDAT response for the mode that was sent.
pub fn parse_broadcast(frame: &LogicalFrame, mode: &BroadcastMode) -> Result<BroadcastReceipt> {
    match mode {
        BroadcastMode::AfterBlink { .. } => {
            let p = response_payload(frame, &BDAT, 8)?;
            let mut payload_id = [0u8; 8];
            payload_id.copy_from_slice(&p[..8]);
            Ok(BroadcastReceipt::Queued { payload_id })
        }
        BroadcastMode::Immediate { .. } | BroadcastMode::Cancel => {
            Ok(BroadcastReceipt::Completed(parse_status(frame, &BDAT)?))
        }
    }
}

/// Decode a GDAT response. `None` means no message was pending.
pub fn parse_received_data(frame: &LogicalFrame) -> Result<Option<ReceivedData>> {
    let p = response_payload(frame, &GDAT, 1)?;
    let count = p[0] as usize;
    if count == 0 {
        return Ok(None);
    }
    if p.len() < 7 + count {
        return Err(Error::Protocol(format!(
            "GDAT announces {count} data bytes, response carries {}",
            p.len().saturating_sub(7)
        )));
    }
    Ok(Some(ReceivedData {
        sender: NodeId::from_bytes([p[1], p[2], p[3], p[4], p[5], p[6]]),
        data: p[7..7 + count].to_vec(),
    }))
}

/// Decode a FRAD read response.
pub fn parse_ranging_data(frame: &LogicalFrame) -> Result<Vec<u8>> {
    let p = response_payload(frame, &FRAD_GET, 1)?;
    let count = p[0] as usize;
    if p.len() < 1 + count {
        return Err(Error::Protocol(format!(
            "FRAD announces {count} data bytes, response carries {}",
            p.len() - 1
        )));
    }
    Ok(p[1..1 + count].to_vec())
}

/// Decode the blink interval echoed by SBIV.
pub fn parse_blink_interval(frame: &LogicalFrame) -> Result<u16> {
    let p = response_payload(frame, &SBIV, 2)?;
    Ok(u16::from_be_bytes([p[0], p[1]]))
}
