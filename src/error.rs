//! Error types for transport and setup failures.
//!
//! Expected device conditions (occupied slot, no finger, bad id from the
//! caller) are never errors; they come back as [`Outcome`] values. This type
//! covers the things an outcome cannot describe: a serial line that stopped
//! answering, a frame that does not parse, or a scanner that could not be
//! brought up.

use crate::outcome::Outcome;
use crate::scanner::ScannerState;

/// Result type alias for driver and scanner operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by the serial driver and the scanner lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The underlying serial port failed to read or write a byte.
    #[error("Serial I/O failure while {operation}")]
    Serial { operation: &'static str },

    /// The module did not answer within the transport's deadline.
    #[error("Timed out waiting for the module")]
    Timeout,

    /// The reply did not start with the `0xEF01` start code.
    #[error("Bad packet header: {0:#06x}")]
    BadHeader(u16),

    /// The reply carried a packet identifier other than acknowledge.
    #[error("Unexpected packet identifier: {0:#04x}")]
    UnexpectedPacket(u8),

    /// The reply checksum did not match its contents.
    #[error("Checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },

    /// The length field is too small to hold a checksum.
    #[error("Frame length {len} is too short")]
    ShortFrame { len: u16 },

    /// A frame did not fit into the fixed-size packet buffer.
    #[error("Frame of {len} bytes exceeds the packet buffer")]
    FrameOverflow { len: usize },

    /// The password handshake was rejected or did not complete.
    #[error("Handshake failed: {0}")]
    Handshake(Outcome),

    /// The scanner was configured with values it cannot work with.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A mutating cache call referenced a slot outside `[1, capacity]`.
    #[error("Slot {id} is outside 1..={capacity}")]
    InvalidSlot { id: u16, capacity: u16 },

    /// Auto-detection found no cataloged profile and fallback is disabled.
    #[error("No known sensor profile matched the attached module")]
    NoProfileDetected,

    /// The scanner has not completed `begin()`.
    #[error("Scanner is not ready (state: {0:?})")]
    NotReady(ScannerState),
}

impl Error {
    /// Create a new serial failure error.
    pub fn serial(operation: &'static str) -> Self {
        Self::Serial { operation }
    }

    /// Create a new invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// True when the serial link itself is broken, as opposed to a single
    /// garbled or late reply.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Serial { .. })
    }
}
