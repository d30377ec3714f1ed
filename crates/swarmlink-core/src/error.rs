//! Error types for swarmlink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Argument validation, framing, link
//! integrity, and device-reported failures are all captured here so that
//! callers never have to interpret raw status codes.

/// The error type for all swarmlink operations.
///
/// The first group of variants is the protocol engine's result taxonomy:
/// every command either succeeds or fails with exactly one of them. The
/// remaining variants cover the surrounding plumbing (opening ports,
/// malformed response payloads, a closed engine).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied value was outside the command's documented range.
    ///
    /// Always raised before anything is transmitted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The encoded frame would not fit in the frame buffer.
    ///
    /// Always raised before anything is transmitted.
    #[error("encoded frame needs {needed} bytes, capacity is {capacity}")]
    EncodeOverflow {
        /// Bytes the escaped wire frame would occupy.
        needed: usize,
        /// Configured frame capacity.
        capacity: usize,
    },

    /// An exchange is already outstanding, or the transport refused the
    /// transmission.
    #[error("transport busy: {0}")]
    TransportBusy(String),

    /// No complete, valid frame arrived before the deadline.
    #[error("timeout waiting for response")]
    Timeout,

    /// A complete frame arrived but failed its CRC check.
    #[error("CRC mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    CrcMismatch {
        /// CRC computed over the received logical bytes.
        computed: u16,
        /// CRC carried in the frame trailer.
        received: u16,
    },

    /// Framing was lost mid-frame (unexpected sync marker, invalid escape
    /// sequence, or an impossible length field).
    #[error("sync lost")]
    SyncLost,

    /// The device answered with an error-typed response.
    ///
    /// The code is sign-inverted per the device convention, so a wire code of
    /// `0x05` is reported as `DeviceError(-5)`.
    #[error("device error {0}")]
    DeviceError(i16),

    /// A response was received but its payload did not match the command's
    /// documented layout.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A transport-level error while opening or configuring the link.
    #[error("transport error: {0}")]
    Transport(String),

    /// The engine or the link has been shut down.
    #[error("not connected")]
    NotConnected,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the failure happened on the link rather than in the
    /// device: busy, timeout, integrity, or framing failures.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Error::TransportBusy(_)
                | Error::Timeout
                | Error::CrcMismatch { .. }
                | Error::SyncLost
                | Error::Transport(_)
                | Error::NotConnected
                | Error::Io(_)
        )
    }

    /// Returns `true` if the device explicitly refused the command.
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::DeviceError(_))
    }

    /// Returns `true` if the command was rejected locally, before any byte
    /// reached the transport.
    pub fn is_pre_transmission(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::EncodeOverflow { .. })
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_argument() {
        let e = Error::InvalidArgument("power 64 outside 0..=63".into());
        assert_eq!(e.to_string(), "invalid argument: power 64 outside 0..=63");
    }

    #[test]
    fn error_display_encode_overflow() {
        let e = Error::EncodeOverflow {
            needed: 140,
            capacity: 128,
        };
        assert_eq!(e.to_string(), "encoded frame needs 140 bytes, capacity is 128");
    }

    #[test]
    fn error_display_transport_busy() {
        let e = Error::TransportBusy("exchange outstanding".into());
        assert_eq!(e.to_string(), "transport busy: exchange outstanding");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_crc_mismatch() {
        let e = Error::CrcMismatch {
            computed: 0xBB3D,
            received: 0x1234,
        };
        assert_eq!(
            e.to_string(),
            "CRC mismatch: computed 0xBB3D, received 0x1234"
        );
    }

    #[test]
    fn error_display_sync_lost() {
        assert_eq!(Error::SyncLost.to_string(), "sync lost");
    }

    #[test]
    fn error_display_device_error() {
        assert_eq!(Error::DeviceError(-5).to_string(), "device error -5");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn link_failures_are_distinguished_from_device_errors() {
        assert!(Error::Timeout.is_link_failure());
        assert!(Error::SyncLost.is_link_failure());
        assert!(
            Error::CrcMismatch {
                computed: 0,
                received: 1
            }
            .is_link_failure()
        );
        assert!(!Error::DeviceError(-1).is_link_failure());
        assert!(Error::DeviceError(-1).is_device_error());
        assert!(!Error::Timeout.is_device_error());
    }

    #[test]
    fn pre_transmission_errors() {
        assert!(Error::InvalidArgument("x".into()).is_pre_transmission());
        assert!(
            Error::EncodeOverflow {
                needed: 200,
                capacity: 128
            }
            .is_pre_transmission()
        );
        assert!(!Error::TransportBusy("x".into()).is_pre_transmission());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
