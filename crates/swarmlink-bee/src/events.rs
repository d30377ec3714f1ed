//! Asynchronous node event types.
//!
//! Events are published by the exchange coordinator through a
//! [`tokio::sync::broadcast`] channel for traffic that does not answer an
//! outstanding command: notifications the module pushes on its own (enabled
//! with EDAN / EIDN), responses that arrive after their exchange was
//! abandoned, and frames the decoder had to discard.

use crate::frame::{DesyncReason, LogicalFrame};

/// An event emitted by a node outside the command/response flow.
///
/// Subscribe via [`BeeNode::subscribe()`](crate::node::BeeNode::subscribe).
/// Delivery is best-effort through a bounded channel; slow consumers may
/// miss events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A valid frame that was not attributed to any outstanding exchange.
    Unsolicited(LogicalFrame),

    /// A complete frame failed its CRC check.
    CrcMismatch {
        /// CRC computed over the received bytes.
        computed: u16,
        /// CRC carried in the frame.
        received: u16,
    },

    /// Framing was lost and the partial frame was dropped.
    Desync(DesyncReason),
}

impl NodeEvent {
    /// Returns `true` for events that report a dropped frame.
    pub fn is_discard(&self) -> bool {
        matches!(self, NodeEvent::CrcMismatch { .. } | NodeEvent::Desync(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameType;

    #[test]
    fn event_is_clone() {
        let event = NodeEvent::Unsolicited(LogicalFrame {
            frame_type: FrameType::Other(0x56),
            opcode: 0x27,
            payload: vec![1],
            crc: 0,
        });
        assert_eq!(event.clone(), event);
        assert!(!event.is_discard());
    }

    #[test]
    fn discard_events() {
        assert!(NodeEvent::CrcMismatch {
            computed: 1,
            received: 2
        }
        .is_discard());
        assert!(NodeEvent::Desync(DesyncReason::UnexpectedSync).is_discard());
    }
}
