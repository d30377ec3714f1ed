//! Bee binary-API frame encoder and streaming decoder.
//!
//! The module speaks the radio's binary framing over a byte-oriented serial
//! link. This module handles the pure byte-level work: building logical
//! frames, CRC protection, byte-stuffing, and reassembling frames from a
//! stream delivered one byte at a time.
//!
//! # Frame format
//!
//! ```text
//! logical:  <len> <type> <opcode> [<payload>...] <crcLo> <crcHi>
//! wire:     0x7F  <logical bytes, escaped>
//! ```
//!
//! - `len`: number of bytes in `type + opcode + payload`
//! - `type`: request class (GET / SET / AUX) or response class (ERROR)
//! - CRC-16/ARC over the logical bytes before the CRC field
//! - Escaping: `0x7F` becomes `0x1B 0x53`, `0x1B` becomes `0x1B 0x45`

use bytes::{BufMut, BytesMut};
use crc::{CRC_16_ARC, Crc};
use tracing::warn;

use swarmlink_core::{Error, Result};

/// Sync marker: the one unescaped byte that starts every wire frame.
pub const SYNC: u8 = 0x7F;

/// Escape marker introducing a two-byte escape sequence.
pub const ESCAPE: u8 = 0x1B;

/// Substitution byte following [`ESCAPE`] for a literal [`SYNC`].
pub const SUB_SYNC: u8 = 0x53;

/// Substitution byte following [`ESCAPE`] for a literal [`ESCAPE`].
pub const SUB_ESCAPE: u8 = 0x45;

/// Default frame buffer capacity of the module's binary API.
pub const DEFAULT_FRAME_CAPACITY: usize = 128;

/// Size of the CRC trailer.
pub const CRC_LEN: usize = 2;

/// Smallest possible wire frame: sync, length, type, opcode, CRC.
pub const MIN_WIRE_LEN: usize = 6;

/// The "ANSI" CRC-16 used by the binary API (CRC-16/ARC).
pub const BEE_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Frame type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Read request (`0x54`).
    Get,
    /// Write request (`0x55`).
    Set,
    /// Auxiliary request class used by the notification and ranging-buffer
    /// commands (`0x57`).
    Aux,
    /// Device error response (`0x60`).
    Error,
    /// Any other type byte, typically a normal response.
    Other(u8),
}

impl FrameType {
    pub const GET: u8 = 0x54;
    pub const SET: u8 = 0x55;
    pub const AUX: u8 = 0x57;
    pub const ERROR: u8 = 0x60;

    /// Classify a raw type byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::GET => FrameType::Get,
            Self::SET => FrameType::Set,
            Self::AUX => FrameType::Aux,
            Self::ERROR => FrameType::Error,
            other => FrameType::Other(other),
        }
    }

    /// The raw type byte.
    pub fn as_byte(self) -> u8 {
        match self {
            FrameType::Get => Self::GET,
            FrameType::Set => Self::SET,
            FrameType::Aux => Self::AUX,
            FrameType::Error => Self::ERROR,
            FrameType::Other(b) => b,
        }
    }
}

/// Which bytes the CRC covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcSpan {
    /// The logical bytes only (`len` through the last payload byte).
    #[default]
    Logical,
    /// The sync marker followed by the logical bytes.
    IncludeSync,
}

/// A de-stuffed, CRC-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalFrame {
    /// Frame type.
    pub frame_type: FrameType,
    /// Command opcode (for short error frames, the device error code).
    pub opcode: u8,
    /// Payload bytes following the opcode (may be empty).
    pub payload: Vec<u8>,
    /// CRC carried in the frame trailer.
    pub crc: u16,
}

impl LogicalFrame {
    /// Returns `true` if this frame is a device error report.
    pub fn is_error(&self) -> bool {
        self.frame_type == FrameType::Error
    }

    /// Value of the frame's length field.
    pub fn length(&self) -> usize {
        2 + self.payload.len()
    }

    /// Serialize back to logical bytes, CRC trailer included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.length() + 1 + CRC_LEN);
        buf.put_u8(self.length() as u8);
        buf.put_u8(self.frame_type.as_byte());
        buf.put_u8(self.opcode);
        buf.put_slice(&self.payload);
        buf.put_u16_le(self.crc);
        buf.to_vec()
    }
}

/// Compute the frame CRC over `logical` (CRC field excluded).
pub fn frame_crc(span: CrcSpan, logical: &[u8]) -> u16 {
    let mut digest = BEE_CRC.digest();
    if span == CrcSpan::IncludeSync {
        digest.update(&[SYNC]);
    }
    digest.update(logical);
    digest.finalize()
}

/// Byte-stuff logical bytes and prefix the sync marker.
///
/// # Example
///
/// ```
/// use swarmlink_bee::frame::{escape, SYNC, ESCAPE, SUB_SYNC, SUB_ESCAPE};
///
/// let wire = escape(&[0x02, SYNC, ESCAPE]);
/// assert_eq!(wire, vec![SYNC, 0x02, ESCAPE, SUB_SYNC, ESCAPE, SUB_ESCAPE]);
/// ```
pub fn escape(logical: &[u8]) -> Vec<u8> {
    let specials = logical.iter().filter(|&&b| is_special(b)).count();
    let mut buf = BytesMut::with_capacity(1 + logical.len() + specials);
    buf.put_u8(SYNC);
    for &byte in logical {
        match byte {
            SYNC => buf.put_slice(&[ESCAPE, SUB_SYNC]),
            ESCAPE => buf.put_slice(&[ESCAPE, SUB_ESCAPE]),
            other => buf.put_u8(other),
        }
    }
    buf.to_vec()
}

/// Whether `byte` needs escaping on the wire.
pub fn is_special(byte: u8) -> bool {
    byte == SYNC || byte == ESCAPE
}

/// Frame encoder and decoder factory bound to one capacity and CRC span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    capacity: usize,
    crc_span: CrcSpan,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY, CrcSpan::Logical)
    }
}

impl FrameCodec {
    /// Create a codec with the given frame capacity and CRC span.
    pub fn new(capacity: usize, crc_span: CrcSpan) -> Self {
        FrameCodec { capacity, crc_span }
    }

    /// Frame buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// CRC span used for encoding and verification.
    pub fn crc_span(&self) -> CrcSpan {
        self.crc_span
    }

    /// Build the logical bytes of a frame, CRC trailer included.
    pub fn logical_bytes(
        &self,
        frame_type: FrameType,
        opcode: u8,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let length = 2 + payload.len();
        if length > u8::MAX as usize {
            return Err(Error::EncodeOverflow {
                needed: 1 + length + 1 + CRC_LEN,
                capacity: self.capacity,
            });
        }
        let mut buf = BytesMut::with_capacity(length + 1 + CRC_LEN);
        buf.put_u8(length as u8);
        buf.put_u8(frame_type.as_byte());
        buf.put_u8(opcode);
        buf.put_slice(payload);
        let crc = frame_crc(self.crc_span, &buf);
        buf.put_u16_le(crc);
        Ok(buf.to_vec())
    }

    /// Encode a frame into wire bytes ready for transmission.
    ///
    /// Fails with [`Error::EncodeOverflow`] if the escaped frame would not fit
    /// in the frame capacity.
    ///
    /// # Example
    ///
    /// ```
    /// use swarmlink_bee::frame::{FrameCodec, FrameType};
    ///
    /// // GFWV: read firmware version
    /// let wire = FrameCodec::default().encode(FrameType::Get, 0x08, &[]).unwrap();
    /// assert_eq!(wire, vec![0x7F, 0x02, 0x54, 0x08, 0x9E, 0xC6]);
    /// ```
    pub fn encode(&self, frame_type: FrameType, opcode: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let logical = self.logical_bytes(frame_type, opcode, payload)?;
        let needed = 1 + logical.len() + logical.iter().filter(|&&b| is_special(b)).count();
        if needed > self.capacity {
            return Err(Error::EncodeOverflow {
                needed,
                capacity: self.capacity,
            });
        }
        Ok(escape(&logical))
    }

    /// Create a streaming decoder sharing this codec's capacity and CRC span.
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::new(self.capacity, self.crc_span)
    }

    /// Decode the first complete frame found in `wire`.
    ///
    /// Convenience for whole-buffer decoding; live links feed a
    /// [`FrameDecoder`] byte by byte instead.
    pub fn decode(&self, wire: &[u8]) -> Result<LogicalFrame> {
        let mut decoder = self.decoder();
        for &byte in wire {
            match decoder.feed(byte) {
                FeedEvent::FrameReady(frame) => return Ok(frame),
                FeedEvent::CrcMismatch { computed, received } => {
                    return Err(Error::CrcMismatch { computed, received });
                }
                FeedEvent::Incomplete | FeedEvent::Desync(_) => {}
            }
        }
        Err(Error::Protocol(format!(
            "no complete frame in {} bytes",
            wire.len()
        )))
    }
}

/// Why the decoder abandoned a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesyncReason {
    /// An unescaped sync marker arrived mid-frame; a new frame was started.
    UnexpectedSync,
    /// An escape marker was followed by something other than a substitution code.
    InvalidEscape(u8),
    /// The length field was too small or the frame would exceed capacity.
    BadLength(u8),
}

/// Outcome of feeding one byte to a [`FrameDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// More bytes are needed (or the byte was inter-frame noise).
    Incomplete,
    /// A complete frame passed its CRC check.
    FrameReady(LogicalFrame),
    /// A complete frame failed its CRC check and was discarded.
    CrcMismatch { computed: u16, received: u16 },
    /// Framing was lost; the partial frame was discarded.
    Desync(DesyncReason),
}

/// Streaming frame assembler, fed one byte at a time.
///
/// Holds at most `capacity` logical bytes. After a complete frame, a CRC
/// failure, or a desync it is ready for the next frame without any caller
/// intervention.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    expected: Option<usize>,
    escape_pending: bool,
    in_frame: bool,
    capacity: usize,
    crc_span: CrcSpan,
}

impl FrameDecoder {
    /// Create an idle decoder.
    pub fn new(capacity: usize, crc_span: CrcSpan) -> Self {
        FrameDecoder {
            buf: Vec::with_capacity(capacity),
            expected: None,
            escape_pending: false,
            in_frame: false,
            capacity,
            crc_span,
        }
    }

    /// Return to "awaiting sync", dropping any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.expected = None;
        self.escape_pending = false;
        self.in_frame = false;
    }

    /// Whether a frame is currently being assembled.
    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Whether the last byte was an escape marker awaiting its substitution.
    pub fn is_escape_pending(&self) -> bool {
        self.escape_pending
    }

    /// Number of logical bytes assembled so far.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed one received wire byte.
    pub fn feed(&mut self, byte: u8) -> FeedEvent {
        if byte == SYNC {
            let restarted = self.in_frame;
            self.start_frame();
            return if restarted {
                FeedEvent::Desync(DesyncReason::UnexpectedSync)
            } else {
                FeedEvent::Incomplete
            };
        }

        if !self.in_frame {
            return FeedEvent::Incomplete;
        }

        if self.escape_pending {
            self.escape_pending = false;
            let literal = match byte {
                SUB_SYNC => SYNC,
                SUB_ESCAPE => ESCAPE,
                other => {
                    warn!(byte = other, "invalid escape sequence, dropping frame");
                    self.reset();
                    return FeedEvent::Desync(DesyncReason::InvalidEscape(other));
                }
            };
            return self.push(literal);
        }

        if byte == ESCAPE {
            self.escape_pending = true;
            return FeedEvent::Incomplete;
        }

        self.push(byte)
    }

    fn start_frame(&mut self) {
        self.reset();
        self.in_frame = true;
    }

    fn push(&mut self, byte: u8) -> FeedEvent {
        self.buf.push(byte);

        if self.buf.len() == 1 {
            let total = byte as usize + 1 + CRC_LEN;
            if byte < 2 || total > self.capacity {
                warn!(
                    length = byte,
                    capacity = self.capacity,
                    "rejecting frame with impossible length"
                );
                self.reset();
                return FeedEvent::Desync(DesyncReason::BadLength(byte));
            }
            self.expected = Some(total);
        }

        if Some(self.buf.len()) != self.expected {
            return FeedEvent::Incomplete;
        }

        let event = self.finish();
        self.reset();
        event
    }

    fn finish(&self) -> FeedEvent {
        let split = self.buf.len() - CRC_LEN;
        let (body, trailer) = self.buf.split_at(split);
        let received = u16::from_le_bytes([trailer[0], trailer[1]]);
        let computed = frame_crc(self.crc_span, body);
        if computed != received {
            warn!(
                computed = format_args!("0x{computed:04X}"),
                received = format_args!("0x{received:04X}"),
                "frame CRC mismatch"
            );
            return FeedEvent::CrcMismatch { computed, received };
        }
        FeedEvent::FrameReady(LogicalFrame {
            frame_type: FrameType::from_byte(body[1]),
            opcode: body[2],
            payload: body[3..].to_vec(),
            crc: received,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<FeedEvent> {
        bytes
            .iter()
            .map(|&b| decoder.feed(b))
            .filter(|e| *e != FeedEvent::Incomplete)
            .collect()
    }

    // ---------------------------------------------------------------
    // CRC
    // ---------------------------------------------------------------

    #[test]
    fn crc_check_value() {
        assert_eq!(BEE_CRC.checksum(b"123456789"), 0xBB3D);
    }

    #[test]
    fn crc_span_changes_result() {
        let logical = [0x08, 0x55, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        assert_eq!(frame_crc(CrcSpan::Logical, &logical), 0x0518);
        assert_eq!(frame_crc(CrcSpan::IncludeSync, &logical), 0x1E2A);
    }

    // ---------------------------------------------------------------
    // Frame type
    // ---------------------------------------------------------------

    #[test]
    fn frame_type_byte_mapping() {
        assert_eq!(FrameType::from_byte(0x54), FrameType::Get);
        assert_eq!(FrameType::from_byte(0x55), FrameType::Set);
        assert_eq!(FrameType::from_byte(0x57), FrameType::Aux);
        assert_eq!(FrameType::from_byte(0x60), FrameType::Error);
        assert_eq!(FrameType::from_byte(0x56), FrameType::Other(0x56));
        assert_eq!(FrameType::Other(0x56).as_byte(), 0x56);
        assert_eq!(FrameType::Set.as_byte(), 0x55);
    }

    // ---------------------------------------------------------------
    // Encoding
    // ---------------------------------------------------------------

    #[test]
    fn encode_set_node_id_without_escaping() {
        let codec = FrameCodec::default();
        let id = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

        let logical = codec.logical_bytes(FrameType::Set, 0x00, &id).unwrap();
        assert_eq!(
            logical,
            vec![0x08, 0x55, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x18, 0x05]
        );

        let wire = codec.encode(FrameType::Set, 0x00, &id).unwrap();
        let mut expected = vec![SYNC];
        expected.extend_from_slice(&logical);
        assert_eq!(wire, expected);
    }

    #[test]
    fn encode_read_firmware_version() {
        let wire = FrameCodec::default()
            .encode(FrameType::Get, 0x08, &[])
            .unwrap();
        assert_eq!(wire, vec![0x7F, 0x02, 0x54, 0x08, 0x9E, 0xC6]);
    }

    #[test]
    fn encode_escapes_payload_markers() {
        let codec = FrameCodec::default();
        let wire = codec.encode(FrameType::Set, 0x21, &[SYNC, ESCAPE]).unwrap();
        assert_eq!(wire[0], SYNC);
        // Only the leading byte may be an unescaped sync marker.
        assert!(!wire[1..].contains(&SYNC));
        assert_eq!(&wire[4..8], &[ESCAPE, SUB_SYNC, ESCAPE, SUB_ESCAPE]);
    }

    #[test]
    fn escape_expansion_for_all_escape_payload() {
        let codec = FrameCodec::default();
        let payload = [ESCAPE; 20];
        let logical = codec.logical_bytes(FrameType::Set, 0x28, &payload).unwrap();
        let wire = codec.encode(FrameType::Set, 0x28, &payload).unwrap();

        // Header and CRC bytes may need escaping too, depending on the CRC value.
        let header_and_crc = [&logical[..3], &logical[logical.len() - CRC_LEN..]].concat();
        let overhead = 1 + header_and_crc.len()
            + header_and_crc.iter().filter(|&&b| is_special(b)).count();
        assert_eq!(wire.len(), overhead + 2 * payload.len());

        let frame = codec.decode(&wire).unwrap();
        assert_eq!(frame.payload, payload.to_vec());
    }

    #[test]
    fn encode_overflow_on_capacity() {
        let codec = FrameCodec::default();
        // 122 payload bytes + 6 bytes of framing = 128: fits only if nothing escapes.
        let payload = vec![0x00; 122];
        assert!(codec.encode(FrameType::Set, 0x28, &payload).is_ok());

        let payload = vec![0x00; 123];
        match codec.encode(FrameType::Set, 0x28, &payload) {
            Err(Error::EncodeOverflow { needed, capacity }) => {
                assert_eq!(needed, 129);
                assert_eq!(capacity, 128);
            }
            other => panic!("expected EncodeOverflow, got {other:?}"),
        }
    }

    #[test]
    fn encode_overflow_counts_escape_expansion() {
        let codec = FrameCodec::default();
        // Fits unescaped, but escaping doubles every payload byte.
        let payload = vec![ESCAPE; 70];
        assert!(matches!(
            codec.encode(FrameType::Set, 0x28, &payload),
            Err(Error::EncodeOverflow { .. })
        ));
    }

    #[test]
    fn encode_overflow_on_length_field() {
        let codec = FrameCodec::new(1024, CrcSpan::Logical);
        let payload = vec![0x00; 254];
        assert!(matches!(
            codec.encode(FrameType::Set, 0x28, &payload),
            Err(Error::EncodeOverflow { .. })
        ));
    }

    // ---------------------------------------------------------------
    // Streaming decode
    // ---------------------------------------------------------------

    #[test]
    fn decode_simple_frame() {
        let codec = FrameCodec::default();
        let wire = codec.encode(FrameType::Get, 0x08, &[]).unwrap();
        let mut decoder = codec.decoder();

        let events = feed_all(&mut decoder, &wire);
        assert_eq!(events.len(), 1);
        match &events[0] {
            FeedEvent::FrameReady(frame) => {
                assert_eq!(frame.frame_type, FrameType::Get);
                assert_eq!(frame.opcode, 0x08);
                assert!(frame.payload.is_empty());
                assert_eq!(frame.crc, 0xC69E);
            }
            other => panic!("expected FrameReady, got {other:?}"),
        }
        assert!(!decoder.is_in_frame());
    }

    #[test]
    fn decode_escaped_sync_is_literal() {
        let mut decoder = FrameDecoder::new(DEFAULT_FRAME_CAPACITY, CrcSpan::Logical);
        assert_eq!(decoder.feed(SYNC), FeedEvent::Incomplete);
        assert_eq!(decoder.feed(0x03), FeedEvent::Incomplete);
        assert_eq!(decoder.feed(0x55), FeedEvent::Incomplete);
        assert_eq!(decoder.feed(0x05), FeedEvent::Incomplete);
        assert_eq!(decoder.feed(ESCAPE), FeedEvent::Incomplete);
        assert!(decoder.is_escape_pending());
        assert_eq!(decoder.buffered(), 3);
        assert_eq!(decoder.feed(SUB_SYNC), FeedEvent::Incomplete);
        assert!(!decoder.is_escape_pending());
        assert!(decoder.is_in_frame());
        assert_eq!(decoder.buffered(), 4);
    }

    #[test]
    fn decode_escaped_sync_round_trip() {
        let codec = FrameCodec::default();
        let wire = codec.encode(FrameType::Set, 0x05, &[SYNC]).unwrap();
        assert!(wire.windows(2).any(|w| w == [ESCAPE, SUB_SYNC]));
        let frame = codec.decode(&wire).unwrap();
        assert_eq!(frame.payload, vec![SYNC]);
    }

    #[test]
    fn round_trip_marker_only_payloads() {
        let codec = FrameCodec::default();
        let payloads: [&[u8]; 5] = [
            &[],
            &[SYNC; 16],
            &[ESCAPE; 16],
            &[SYNC, ESCAPE, SYNC, ESCAPE, SUB_SYNC, SUB_ESCAPE],
            &[0x00, 0xFF, 0x7E, 0x80, 0x1A, 0x1C],
        ];
        for payload in payloads {
            let wire = codec.encode(FrameType::Set, 0x21, payload).unwrap();
            let frame = codec.decode(&wire).unwrap();
            assert_eq!(frame.payload, payload.to_vec());
            assert_eq!(frame.opcode, 0x21);
        }
    }

    #[test]
    fn decode_noise_before_sync_is_dropped() {
        let codec = FrameCodec::default();
        let mut stream = vec![0x00, 0x45, 0x53, ESCAPE, 0x02];
        stream.extend(codec.encode(FrameType::Get, 0x09, &[]).unwrap());
        let frame = codec.decode(&stream).unwrap();
        assert_eq!(frame.opcode, 0x09);
    }

    #[test]
    fn decode_back_to_back_frames() {
        let codec = FrameCodec::default();
        let mut stream = codec.encode(FrameType::Get, 0x08, &[]).unwrap();
        stream.extend(codec.encode(FrameType::Get, 0x09, &[]).unwrap());

        let mut decoder = codec.decoder();
        let events = feed_all(&mut decoder, &stream);
        let opcodes: Vec<u8> = events
            .iter()
            .map(|e| match e {
                FeedEvent::FrameReady(f) => f.opcode,
                other => panic!("expected FrameReady, got {other:?}"),
            })
            .collect();
        assert_eq!(opcodes, vec![0x08, 0x09]);
    }

    #[test]
    fn decode_unexpected_sync_restarts_frame() {
        let codec = FrameCodec::default();
        let good = codec.encode(FrameType::Get, 0x08, &[]).unwrap();

        let mut decoder = codec.decoder();
        // Truncated frame, then a full one.
        let mut stream = vec![SYNC, 0x05, 0x55, 0x21];
        stream.extend_from_slice(&good);

        let events = feed_all(&mut decoder, &stream);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], FeedEvent::Desync(DesyncReason::UnexpectedSync));
        assert!(matches!(&events[1], FeedEvent::FrameReady(f) if f.opcode == 0x08));
    }

    #[test]
    fn decode_invalid_escape_desyncs_to_idle() {
        let mut decoder = FrameCodec::default().decoder();
        feed_all(&mut decoder, &[SYNC, 0x03, 0x55]);
        assert_eq!(decoder.feed(ESCAPE), FeedEvent::Incomplete);
        assert_eq!(
            decoder.feed(0x00),
            FeedEvent::Desync(DesyncReason::InvalidEscape(0x00))
        );
        assert!(!decoder.is_in_frame());
        assert!(!decoder.is_escape_pending());
    }

    #[test]
    fn decode_rejects_oversize_length() {
        let mut decoder = FrameDecoder::new(32, CrcSpan::Logical);
        assert_eq!(decoder.feed(SYNC), FeedEvent::Incomplete);
        // 30 + 3 = 33 logical bytes > 32
        assert_eq!(
            decoder.feed(30),
            FeedEvent::Desync(DesyncReason::BadLength(30))
        );
        assert!(!decoder.is_in_frame());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decode_rejects_short_length() {
        let mut decoder = FrameCodec::default().decoder();
        decoder.feed(SYNC);
        assert_eq!(decoder.feed(0x01), FeedEvent::Desync(DesyncReason::BadLength(1)));
    }

    #[test]
    fn decode_crc_mismatch_discards_frame() {
        let codec = FrameCodec::default();
        let mut wire = codec.encode(FrameType::Get, 0x08, &[]).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;

        let mut decoder = codec.decoder();
        let events = feed_all(&mut decoder, &wire);
        assert_eq!(
            events,
            vec![FeedEvent::CrcMismatch {
                computed: 0xC69E,
                received: 0xC79E
            }]
        );
        assert!(!decoder.is_in_frame());
    }

    #[test]
    fn every_single_bit_flip_is_detected() {
        let codec = FrameCodec::default();
        let logical = codec
            .logical_bytes(FrameType::Set, 0x21, &[0x00, 0x11, 0x22, 0x33, 0x44])
            .unwrap();

        // The length byte is skipped: corrupting it changes framing, not content.
        for index in 1..logical.len() {
            for bit in 0..8 {
                let mut corrupted = logical.clone();
                corrupted[index] ^= 1 << bit;
                let wire = escape(&corrupted);
                let mut decoder = codec.decoder();
                let events = feed_all(&mut decoder, &wire);
                assert!(
                    matches!(events.as_slice(), [FeedEvent::CrcMismatch { .. }]),
                    "flip of bit {bit} in byte {index} not detected: {events:?}"
                );
            }
        }
    }

    #[test]
    fn length_bit_flips_never_yield_a_frame() {
        let codec = FrameCodec::default();
        let logical = codec
            .logical_bytes(FrameType::Set, 0x21, &[0x00, 0x11, 0x22, 0x33, 0x44])
            .unwrap();
        for bit in 0..8 {
            let mut corrupted = logical.clone();
            corrupted[0] ^= 1 << bit;
            let wire = escape(&corrupted);
            let mut decoder = codec.decoder();
            let events = feed_all(&mut decoder, &wire);
            assert!(
                !events.iter().any(|e| matches!(e, FeedEvent::FrameReady(_))),
                "length flip of bit {bit} produced a frame"
            );
        }
    }

    #[test]
    fn reset_discards_partial_frame() {
        let codec = FrameCodec::default();
        let wire = codec.encode(FrameType::Get, 0x08, &[]).unwrap();
        let mut decoder = codec.decoder();
        feed_all(&mut decoder, &wire[..3]);
        decoder.feed(ESCAPE);
        assert!(decoder.is_in_frame());

        decoder.reset();
        assert!(!decoder.is_in_frame());
        assert!(!decoder.is_escape_pending());

        // The rest of the abandoned frame is just noise now.
        let events = feed_all(&mut decoder, &wire[3..]);
        assert!(events.is_empty());
    }

    #[test]
    fn include_sync_span_round_trip() {
        let codec = FrameCodec::new(DEFAULT_FRAME_CAPACITY, CrcSpan::IncludeSync);
        let wire = codec.encode(FrameType::Set, 0x00, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(&wire[10..], &[0x2A, 0x1E]);
        assert_eq!(codec.decode(&wire).unwrap().crc, 0x1E2A);

        // A logical-span decoder rejects it.
        assert!(matches!(
            FrameCodec::default().decode(&wire),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn logical_frame_to_bytes_matches_encoder() {
        let codec = FrameCodec::default();
        let logical = codec.logical_bytes(FrameType::Set, 0x05, &[0x3F]).unwrap();
        let frame = codec.decode(&escape(&logical)).unwrap();
        assert_eq!(frame.to_bytes(), logical);
        assert_eq!(frame.length(), 3);
        assert!(!frame.is_error());
    }

    #[test]
    fn decode_incomplete_buffer_errors() {
        let codec = FrameCodec::default();
        let wire = codec.encode(FrameType::Get, 0x08, &[]).unwrap();
        assert!(matches!(
            codec.decode(&wire[..wire.len() - 1]),
            Err(Error::Protocol(_))
        ));
    }
}
