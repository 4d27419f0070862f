//! In-memory stand-in for a fingerprint module.
//!
//! [`MockModule`] implements [`Transport`] against a simulated template
//! library, so scanner logic can be exercised without hardware. Fingers are
//! plain numbers: a capture images whichever finger is on the sensor, and a
//! stored template matches a later capture of the same number.
//!
//! ```
//! use fingerprint_slots::mock::{MockCommand, MockModule};
//! use fingerprint_slots::{FingerprintScanner, ScannerConfig};
//!
//! let module = MockModule::new(162).with_enrolled(&[3, 4]);
//! let mut scanner = FingerprintScanner::new(module, ScannerConfig::default());
//! scanner.begin().unwrap();
//!
//! assert_eq!(scanner.enrolled_count(), 2);
//! assert!(scanner.transport().calls(MockCommand::QueryTemplate) >= 162);
//! ```

use std::collections::{HashMap, VecDeque};

use crate::commands::CharBuffer;
use crate::error::{Error, Result};
use crate::responses::SystemParameters;
use crate::transport::{LedState, MatchScore, SearchHit, Transport};

const OK: u8 = 0x00;
const PACKET_ERROR: u8 = 0x01;
const NO_FINGER: u8 = 0x02;
const NO_MATCH: u8 = 0x08;
const NOT_FOUND: u8 = 0x09;
const MERGE_FAILED: u8 = 0x0A;
const BAD_LOCATION: u8 = 0x0B;
const EMPTY_PAGE: u8 = 0x0C;
const CLEAR_FAILED: u8 = 0x11;
const WRONG_PASSWORD: u8 = 0x13;
const NO_VALID_IMAGE: u8 = 0x15;
const INVALID_REGISTER: u8 = 0x1A;

// Status register bits reported by ReadSysPara.
const PASSWORD_OK_BIT: u16 = 1 << 2;
const VALID_IMAGE_BIT: u16 = 1 << 3;

/// Confidence reported for every successful comparison.
pub const MATCH_CONFIDENCE: u16 = 120;

/// Transport operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCommand {
    VerifyCredential,
    CaptureImage,
    ExtractFeatures,
    CommitTemplate,
    StoreTemplate,
    DeleteTemplate,
    EmptyLibrary,
    QueryTemplate,
    SearchBest,
    SearchAgainst,
    SetIndicator,
    SetSecurityTier,
    ReadParameters,
}

/// Simulated module with a template library of fixed size.
#[derive(Debug, Clone)]
pub struct MockModule {
    library: Vec<Option<u32>>,
    reported_library_size: u16,
    password_ok: bool,
    supports_empty: bool,
    finger: Option<u32>,
    image: Option<u32>,
    buffers: [Option<u32>; 2],
    capture_script: VecDeque<u8>,
    failures: Vec<(MockCommand, Error)>,
    connected: bool,
    calls: HashMap<MockCommand, usize>,
    led: Option<LedState>,
    security_level: u8,
}

impl MockModule {
    /// An empty library of `capacity` slots with finger 1 resting on the sensor.
    pub fn new(capacity: u16) -> Self {
        Self {
            library: vec![None; usize::from(capacity)],
            reported_library_size: 0,
            password_ok: true,
            supports_empty: true,
            finger: Some(1),
            image: None,
            buffers: [None, None],
            capture_script: VecDeque::new(),
            failures: Vec::new(),
            connected: true,
            calls: HashMap::new(),
            led: None,
            security_level: 3,
        }
    }

    /// Pre-enroll `slots`, each holding the finger numbered like the slot.
    pub fn with_enrolled(mut self, slots: &[u16]) -> Self {
        for &id in slots {
            self.enroll_finger(id, u32::from(id));
        }
        self
    }

    /// Library size to report from `read_parameters`. Zero (the default)
    /// reports nothing useful, like many clones.
    pub fn with_reported_library_size(mut self, size: u16) -> Self {
        self.reported_library_size = size;
        self
    }

    /// Reject the password handshake.
    pub fn with_wrong_password(mut self) -> Self {
        self.password_ok = false;
        self
    }

    /// Fail the bulk `Empty` command, as some firmwares do.
    pub fn without_bulk_clear(mut self) -> Self {
        self.supports_empty = false;
        self
    }

    /// Queue raw codes for upcoming captures. Once drained, captures follow
    /// the finger on the sensor again.
    pub fn script_captures(&mut self, codes: &[u8]) {
        self.capture_script.extend(codes.iter().copied());
    }

    pub fn place_finger(&mut self, finger: u32) {
        self.finger = Some(finger);
    }

    pub fn lift_finger(&mut self) {
        self.finger = None;
    }

    /// Store a template directly, bypassing the enrollment sequence.
    /// Ids outside the library are ignored.
    pub fn enroll_finger(&mut self, id: u16, finger: u32) {
        if let Some(slot) = self.slot_mut(id) {
            *slot = Some(finger);
        }
    }

    /// Make the next call of `command` fail with `error`.
    pub fn fail_next(&mut self, command: MockCommand, error: Error) {
        self.failures.push((command, error));
    }

    /// Every call fails with a serial error until [`reconnect`](Self::reconnect).
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    pub fn is_enrolled(&self, id: u16) -> bool {
        self.slot(id).map(Option::is_some).unwrap_or(false)
    }

    pub fn enrolled_count(&self) -> usize {
        self.library.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of calls made of `command`, failed ones included.
    pub fn calls(&self, command: MockCommand) -> usize {
        self.calls.get(&command).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.values().sum()
    }

    pub fn reset_calls(&mut self) {
        self.calls.clear();
    }

    /// Last LED state the module accepted.
    pub fn led(&self) -> Option<LedState> {
        self.led
    }

    pub fn security_level(&self) -> u8 {
        self.security_level
    }

    fn slot(&self, id: u16) -> Option<&Option<u32>> {
        let index = usize::from(id.checked_sub(1)?);
        self.library.get(index)
    }

    fn slot_mut(&mut self, id: u16) -> Option<&mut Option<u32>> {
        let index = usize::from(id.checked_sub(1)?);
        self.library.get_mut(index)
    }

    fn enter(&mut self, command: MockCommand) -> Result<()> {
        *self.calls.entry(command).or_insert(0) += 1;
        if !self.connected {
            return Err(Error::serial("talking to a disconnected mock"));
        }
        match self.failures.iter().position(|(c, _)| *c == command) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }
}

impl Transport for MockModule {
    fn verify_credential(&mut self) -> Result<u8> {
        self.enter(MockCommand::VerifyCredential)?;
        Ok(if self.password_ok { OK } else { WRONG_PASSWORD })
    }

    fn capture_image(&mut self) -> Result<u8> {
        self.enter(MockCommand::CaptureImage)?;
        let code = match self.capture_script.pop_front() {
            Some(code) => code,
            None if self.finger.is_some() => OK,
            None => NO_FINGER,
        };
        self.image = if code == OK {
            Some(self.finger.unwrap_or_default())
        } else {
            None
        };
        Ok(code)
    }

    fn extract_features(&mut self, buffer: CharBuffer) -> Result<u8> {
        self.enter(MockCommand::ExtractFeatures)?;
        match self.image {
            Some(finger) => {
                self.buffers[usize::from(buffer.id() - 1)] = Some(finger);
                Ok(OK)
            }
            None => Ok(NO_VALID_IMAGE),
        }
    }

    fn commit_template(&mut self) -> Result<u8> {
        self.enter(MockCommand::CommitTemplate)?;
        match self.buffers {
            [Some(first), Some(second)] if first == second => Ok(OK),
            _ => Ok(MERGE_FAILED),
        }
    }

    fn store_template(&mut self, id: u16) -> Result<u8> {
        self.enter(MockCommand::StoreTemplate)?;
        let template = self.buffers[0];
        match (self.slot_mut(id), template) {
            (None, _) => Ok(BAD_LOCATION),
            (Some(_), None) => Ok(PACKET_ERROR),
            (Some(slot), Some(finger)) => {
                *slot = Some(finger);
                Ok(OK)
            }
        }
    }

    fn delete_template(&mut self, id: u16) -> Result<u8> {
        self.enter(MockCommand::DeleteTemplate)?;
        match self.slot_mut(id) {
            Some(slot) => {
                *slot = None;
                Ok(OK)
            }
            None => Ok(BAD_LOCATION),
        }
    }

    fn empty_library(&mut self) -> Result<u8> {
        self.enter(MockCommand::EmptyLibrary)?;
        if !self.supports_empty {
            return Ok(CLEAR_FAILED);
        }
        self.library.iter_mut().for_each(|slot| *slot = None);
        Ok(OK)
    }

    fn query_template_at(&mut self, id: u16) -> Result<u8> {
        self.enter(MockCommand::QueryTemplate)?;
        Ok(match self.slot(id) {
            Some(Some(_)) => OK,
            Some(None) => EMPTY_PAGE,
            None => BAD_LOCATION,
        })
    }

    fn search_best(&mut self, capacity: u16) -> Result<SearchHit> {
        self.enter(MockCommand::SearchBest)?;
        let wanted = self.buffers[0];
        let hit = self
            .library
            .iter()
            .take(usize::from(capacity))
            .position(|slot| slot.is_some() && *slot == wanted);
        Ok(match hit {
            Some(index) => SearchHit {
                code: OK,
                slot: index as u16 + 1,
                confidence: MATCH_CONFIDENCE,
            },
            None => SearchHit {
                code: NOT_FOUND,
                slot: 0,
                confidence: 0,
            },
        })
    }

    fn search_against(&mut self, id: u16) -> Result<MatchScore> {
        self.enter(MockCommand::SearchAgainst)?;
        let wanted = self.buffers[0];
        let (code, confidence) = match self.slot(id) {
            None => (BAD_LOCATION, 0),
            Some(None) => (EMPTY_PAGE, 0),
            Some(stored) if stored.is_some() && *stored == wanted => (OK, MATCH_CONFIDENCE),
            Some(_) => (NO_MATCH, 0),
        };
        Ok(MatchScore { code, confidence })
    }

    fn set_indicator(&mut self, led: LedState) -> Result<u8> {
        self.enter(MockCommand::SetIndicator)?;
        self.led = Some(led);
        Ok(OK)
    }

    fn set_security_tier(&mut self, level: u8) -> Result<u8> {
        self.enter(MockCommand::SetSecurityTier)?;
        if !(1..=5).contains(&level) {
            return Ok(INVALID_REGISTER);
        }
        self.security_level = level;
        Ok(OK)
    }

    fn read_parameters(&mut self) -> Result<SystemParameters> {
        self.enter(MockCommand::ReadParameters)?;
        let mut status_register = 0;
        if self.password_ok {
            status_register |= PASSWORD_OK_BIT;
        }
        if self.image.is_some() {
            status_register |= VALID_IMAGE_BIT;
        }
        Ok(SystemParameters {
            status_register,
            finger_library_size: self.reported_library_size,
            security_level: u16::from(self.security_level),
            system_identifier_code: 0x0009,
            ..Default::default()
        })
    }
}
