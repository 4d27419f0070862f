//! Normalized results of device interactions.
//!
//! Fingerprint modules answer every command with a one-byte confirmation
//! code whose meaning drifts between families and firmware revisions. The
//! rest of the crate only ever looks at [`Outcome`]; [`Outcome::from_code`]
//! is the one place that knows the vendor numbering.

use core::fmt;

use crate::error::Error;

/// Vendor-independent result of a device interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    /// The scanner is not initialized or the module did not respond to setup.
    NoDevice,
    /// The slot id is outside the module's library.
    InvalidSlot,
    /// The slot already holds a template.
    SlotOccupied,
    /// The slot is addressable but holds no template.
    SlotEmpty,
    /// Every slot is taken.
    NoCapacityAvailable,
    CommunicationError,
    CommunicationTimeout,
    DeviceBusy,
    MalformedResponse,
    /// No finger on the sensor.
    NoSubjectPresented,
    PoorImageQuality,
    FeatureExtractionFailed,
    CaptureFailed,
    /// The captured finger does not match the addressed template.
    NoMatch,
    /// The captured finger matches nothing in the library.
    NotFound,
    Unsupported,
    InvalidParameter,
    /// A confirmation code outside the known table.
    Unknown(u8),
}

impl Outcome {
    /// Translate a raw confirmation code.
    ///
    /// Total over `u8`: codes not in the table become [`Outcome::Unknown`].
    ///
    /// ```
    /// use fingerprint_slots::Outcome;
    ///
    /// assert_eq!(Outcome::from_code(0x00), Outcome::Success);
    /// assert_eq!(Outcome::from_code(0x0B), Outcome::InvalidSlot);
    /// assert_eq!(Outcome::from_code(0x42), Outcome::Unknown(0x42));
    /// ```
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0x01 => Self::CommunicationError,
            0x02 => Self::NoSubjectPresented,
            0x03 => Self::CaptureFailed,
            0x06 => Self::PoorImageQuality,
            0x07 => Self::FeatureExtractionFailed,
            0x08 => Self::NoMatch,
            0x09 => Self::NotFound,
            // Failed to combine the two character files.
            0x0A => Self::FeatureExtractionFailed,
            0x0B => Self::InvalidSlot,
            // LoadChar on an in-range page without a valid template.
            0x0C => Self::SlotEmpty,
            0x0D => Self::FeatureExtractionFailed,
            0x0E | 0x0F | 0x10 | 0x11 => Self::CommunicationError,
            0x13 => Self::CommunicationError,
            0x15 => Self::CaptureFailed,
            0x18 => Self::CommunicationError,
            0x1A | 0x1B => Self::InvalidParameter,
            0x1D => Self::CommunicationError,
            0x1F => Self::NoCapacityAvailable,
            other => Self::Unknown(other),
        }
    }

    /// Normalize a transport result carrying a confirmation code.
    pub fn from_result(result: crate::Result<u8>) -> Self {
        match result {
            Ok(code) => Self::from_code(code),
            Err(ref error) => Self::from(error),
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NoDevice => "No sensor found",
            Self::InvalidSlot => "Invalid template ID",
            Self::SlotOccupied => "Slot already occupied",
            Self::SlotEmpty => "Slot is empty",
            Self::NoCapacityAvailable => "No empty slots available",
            Self::CommunicationError => "Communication error",
            Self::CommunicationTimeout => "Operation timeout",
            Self::DeviceBusy => "Sensor is busy",
            Self::MalformedResponse => "Invalid packet",
            Self::NoSubjectPresented => "No finger detected",
            Self::PoorImageQuality => "Image too messy",
            Self::FeatureExtractionFailed => "Feature extraction failed",
            Self::CaptureFailed => "Image capture failed",
            Self::NoMatch => "Finger does not match",
            Self::NotFound => "Finger not enrolled",
            Self::Unsupported => "Feature not supported",
            Self::InvalidParameter => "Invalid parameter",
            Self::Unknown(_) => "Unknown error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown error ({:#04x})", code),
            other => f.write_str(other.description()),
        }
    }
}

impl From<&Error> for Outcome {
    fn from(error: &Error) -> Self {
        match error {
            Error::Serial { .. } => Self::CommunicationError,
            Error::Timeout => Self::CommunicationTimeout,
            Error::BadHeader(_)
            | Error::UnexpectedPacket(_)
            | Error::Checksum { .. }
            | Error::ShortFrame { .. }
            | Error::FrameOverflow { .. } => Self::MalformedResponse,
            Error::Handshake(outcome) => *outcome,
            Error::InvalidSlot { .. } => Self::InvalidSlot,
            Error::InvalidConfiguration { .. } => Self::InvalidParameter,
            Error::NoProfileDetected | Error::NotReady(_) => Self::NoDevice,
        }
    }
}
