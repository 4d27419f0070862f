//! The boundary between the scanner and whatever carries bytes to the module.
//!
//! Every method is one blocking request/response exchange. `Ok` carries the
//! module's raw confirmation code; the caller normalizes it with
//! [`Outcome::from_code`](crate::Outcome::from_code). `Err` means no usable
//! reply arrived at all. Slot ids are 1-based on this side of the trait.

use crate::commands::CharBuffer;
use crate::error::Result;
use crate::responses::SystemParameters;

/// Best library match for the features in character buffer 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub code: u8,
    /// 1-based slot of the match; meaningless unless `code` is success.
    pub slot: u16,
    pub confidence: u16,
}

/// Score of a one-to-one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchScore {
    pub code: u8,
    pub confidence: u16,
}

/// Aura LED colors, numbered as the module expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Red = 1,
    Blue = 2,
    Purple = 3,
    Green = 4,
    Cyan = 5,
    Yellow = 6,
    White = 7,
}

/// Requested LED state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedState {
    pub on: bool,
    pub color: LedColor,
    /// 0 = solid, anything else breathes at that speed.
    pub speed: u8,
}

impl LedState {
    pub fn on(color: LedColor) -> Self {
        Self {
            on: true,
            color,
            speed: 0,
        }
    }

    pub fn off() -> Self {
        Self {
            on: false,
            color: LedColor::Blue,
            speed: 0,
        }
    }

    /// Breathe instead of staying solid.
    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = speed;
        self
    }
}

/// Request/response primitives of a fingerprint module.
pub trait Transport {
    /// Password handshake.
    fn verify_credential(&mut self) -> Result<u8>;

    /// Capture a fingerprint image. "No finger" is an ordinary code.
    fn capture_image(&mut self) -> Result<u8>;

    /// Turn the captured image into features in `buffer`.
    fn extract_features(&mut self, buffer: CharBuffer) -> Result<u8>;

    /// Merge both character buffers into one template.
    fn commit_template(&mut self) -> Result<u8>;

    /// Write the merged template to slot `id`.
    fn store_template(&mut self, id: u16) -> Result<u8>;

    fn delete_template(&mut self, id: u16) -> Result<u8>;

    /// Wipe the whole library.
    fn empty_library(&mut self) -> Result<u8>;

    /// Ask whether slot `id` holds a template. Used as the occupancy and
    /// capacity probe.
    fn query_template_at(&mut self, id: u16) -> Result<u8>;

    /// Search slots `1..=capacity` for the features in buffer 1.
    fn search_best(&mut self, capacity: u16) -> Result<SearchHit>;

    /// Compare the features in buffer 1 with the template in slot `id`.
    fn search_against(&mut self, id: u16) -> Result<MatchScore>;

    fn set_indicator(&mut self, led: LedState) -> Result<u8>;

    /// Set the matching security level (1 = lenient, 5 = strict).
    fn set_security_tier(&mut self, level: u8) -> Result<u8>;

    fn read_parameters(&mut self) -> Result<SystemParameters>;
}
