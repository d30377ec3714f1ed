//! Translation of frame-level outcomes into [`Error`] values.
//!
//! The module reports refused commands with an error-typed response
//! (`type == 0x60`). The code byte is the device's error number; callers see
//! it sign-inverted as [`Error::DeviceError`], matching how the device
//! documents its return codes. Decoder events for discarded frames map onto
//! the link-integrity variants.

use swarmlink_core::{Error, Result};

use crate::frame::{DesyncReason, FeedEvent, FrameType, LogicalFrame};

/// Extract the device error code from an error-typed frame.
///
/// Full-form error responses carry the code as the first payload byte. The
/// short form `[0x02, 0x60, code]` has no payload, so the code sits in the
/// opcode position.
pub fn device_error_code(frame: &LogicalFrame) -> u8 {
    frame.payload.first().copied().unwrap_or(frame.opcode)
}

/// Resolve a received frame into either itself or the device error it reports.
pub fn check_response(frame: LogicalFrame) -> Result<LogicalFrame> {
    if frame.frame_type == FrameType::Error {
        return Err(Error::DeviceError(-i16::from(device_error_code(&frame))));
    }
    Ok(frame)
}

/// Map a decoder event for a discarded frame onto the error taxonomy.
///
/// Returns `None` for events that do not end a frame in failure.
pub fn from_feed_event(event: &FeedEvent) -> Option<Error> {
    match event {
        FeedEvent::CrcMismatch { computed, received } => Some(Error::CrcMismatch {
            computed: *computed,
            received: *received,
        }),
        FeedEvent::Desync(_) => Some(Error::SyncLost),
        FeedEvent::Incomplete | FeedEvent::FrameReady(_) => None,
    }
}

/// Human-readable name for a desync reason, for logs and events.
pub fn desync_description(reason: DesyncReason) -> String {
    match reason {
        DesyncReason::UnexpectedSync => "sync marker inside frame".to_string(),
        DesyncReason::InvalidEscape(b) => format!("invalid escape substitution 0x{b:02X}"),
        DesyncReason::BadLength(len) => format!("impossible length field {len}"),
    }
}

/// Require at least `needed` payload bytes in a response.
pub(crate) fn require_payload(frame: &LogicalFrame, needed: usize, what: &str) -> Result<()> {
    if frame.payload.len() < needed {
        return Err(Error::Protocol(format!(
            "{what} response too short: expected {needed} payload bytes, got {}",
            frame.payload.len()
        )));
    }
    Ok(())
}
