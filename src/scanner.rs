//! The scanner facade.
//!
//! [`FingerprintScanner`] owns a [`Transport`] and the [`SlotCache`] mirroring
//! the module's library. It resolves the module's profile once in
//! [`begin`](FingerprintScanner::begin), scans the library, and from then on
//! keeps the mirror in step with every enroll, delete and clear it performs.
//!
//! Device operations report [`Outcome`]s. A serial failure while the scanner
//! is changing the module's state moves it to [`ScannerState::Faulted`];
//! call `begin()` again to recover.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::cache::{DatabaseStatistics, SlotCache};
use crate::commands::CharBuffer;
use crate::detector::{self, Detection, DetectionMethod};
use crate::error::{Error, Result};
use crate::outcome::Outcome;
use crate::profile::{self, Profile, SensorModel};
use crate::transport::{LedState, Transport};

const MAX_ENROLL_SCANS: u8 = 4;

/// Which profile `begin()` should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelection {
    /// Detect the module family from its answers.
    Auto,
    /// Trust the caller.
    Fixed(SensorModel),
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::Auto
    }
}

/// Scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    pub model: ModelSelection,
    /// How long to wait for a finger before giving up.
    pub capture_timeout: Duration,
    /// Pause between "no finger" captures.
    pub poll_interval: Duration,
    /// Pause between enrollment captures while the finger is lifted.
    pub lift_delay: Duration,
    /// Assume the smallest cataloged profile when detection finds nothing.
    pub fallback_to_smallest: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            model: ModelSelection::Auto,
            capture_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            lift_delay: Duration::from_secs(2),
            fallback_to_smallest: true,
        }
    }
}

impl ScannerConfig {
    /// Skip detection and use `model`'s profile.
    pub fn with_model(mut self, model: SensorModel) -> Self {
        self.model = ModelSelection::Fixed(model);
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_lift_delay(mut self, delay: Duration) -> Self {
        self.lift_delay = delay;
        self
    }

    pub fn with_fallback_to_smallest(mut self, fallback: bool) -> Self {
        self.fallback_to_smallest = fallback;
        self
    }
}

/// Lifecycle of a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Uninitialized,
    Detecting,
    Ready,
    /// The serial link failed; only `begin()` gets out of here.
    Faulted,
}

/// A successful identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerMatch {
    /// 1-based slot holding the matching template.
    pub slot: u16,
    pub confidence: u16,
}

/// Slot-tracking front end for a fingerprint module.
#[derive(Debug)]
pub struct FingerprintScanner<T> {
    transport: T,
    config: ScannerConfig,
    state: ScannerState,
    detection: Option<Detection>,
    addressable: Option<u16>,
    cache: Option<SlotCache>,
}

impl<T: Transport> FingerprintScanner<T> {
    pub fn new(transport: T, config: ScannerConfig) -> Self {
        Self {
            transport,
            config,
            state: ScannerState::Uninitialized,
            detection: None,
            addressable: None,
            cache: None,
        }
    }

    /// Handshake, resolve the profile and scan the library.
    ///
    /// Can be called again from any state; the previous profile and cache
    /// are discarded.
    ///
    /// # Errors
    ///
    /// [`Error::Handshake`] when the module rejects the password or does not
    /// answer, [`Error::NoProfileDetected`] when detection fails with
    /// fallback disabled, [`Error::Serial`] when the link drops during the
    /// library scan. Each leaves the scanner [`Faulted`](ScannerState::Faulted).
    pub fn begin(&mut self) -> Result<()> {
        self.state = ScannerState::Detecting;
        self.detection = None;
        self.addressable = None;
        self.cache = None;
        debug!("scanner detecting");

        match self.bring_up() {
            Ok(()) => {
                self.state = ScannerState::Ready;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "scanner failed to start");
                self.state = ScannerState::Faulted;
                Err(error)
            }
        }
    }

    fn bring_up(&mut self) -> Result<()> {
        let handshake = Outcome::from_result(self.transport.verify_credential());
        if !handshake.is_success() {
            return Err(Error::Handshake(handshake));
        }

        let detection = self.resolve_profile()?;
        let mut cache = SlotCache::new(detection.profile.capacity)?;

        let transport = &mut self.transport;
        let occupied = cache.try_full_scan(|id| query_slot(transport, id))?;

        info!(
            model = detection.profile.name,
            method = ?detection.method,
            capacity = detection.profile.capacity,
            occupied,
            "scanner ready"
        );
        self.detection = Some(detection);
        self.cache = Some(cache);
        Ok(())
    }

    fn resolve_profile(&mut self) -> Result<Detection> {
        if let ModelSelection::Fixed(model) = self.config.model {
            return Ok(Detection {
                profile: model.profile(),
                method: DetectionMethod::Configured,
            });
        }

        let parameters = match self.transport.read_parameters() {
            Ok(parameters) => {
                debug!(
                    library_size = parameters.finger_library_size,
                    password_ok = parameters.password_ok(),
                    busy = parameters.busy(),
                    finger_match = parameters.has_finger_match(),
                    valid_image = parameters.has_valid_image(),
                    "module parameters"
                );
                Some(parameters)
            }
            Err(error) => {
                debug!(%error, "no parameter block, probing capacity");
                None
            }
        };

        let transport = &mut self.transport;
        let detected = detector::detect(parameters.as_ref(), |id| is_addressable(transport, id));

        match detected {
            Some(detection) => Ok(detection),
            None if self.config.fallback_to_smallest => {
                let fallback = profile::smallest();
                let addressable = detector::find_max_addressable(
                    |id| is_addressable(transport, id),
                    profile::largest().capacity,
                );
                warn!(
                    model = fallback.name,
                    addressable, "no profile detected, assuming smallest"
                );
                self.addressable = Some(addressable);
                Ok(Detection {
                    profile: fallback,
                    method: DetectionMethod::Fallback,
                })
            }
            None => Err(Error::NoProfileDetected),
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ScannerState::Ready
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// How the current profile was chosen, once `begin()` succeeded.
    pub fn detection(&self) -> Option<&Detection> {
        self.detection.as_ref()
    }

    /// Highest slot the module accepted in a binary search, measured only
    /// when detection fell back to the smallest profile.
    pub fn addressable_slots(&self) -> Option<u16> {
        self.addressable
    }

    pub fn profile(&self) -> Option<&'static Profile> {
        self.detection.as_ref().map(|detection| detection.profile)
    }

    /// Number of slots, 0 before `begin()`.
    pub fn capacity(&self) -> u16 {
        self.profile().map(|profile| profile.capacity).unwrap_or(0)
    }

    pub fn enrolled_count(&self) -> u16 {
        self.ready_cache()
            .map(SlotCache::occupied_count)
            .unwrap_or(0)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Direct access to the transport. Changes made behind the scanner's
    /// back are not reflected in the cache until [`scan_all`](Self::scan_all).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back.
    pub fn release(self) -> T {
        self.transport
    }

    /// Re-probe every slot. Returns the number of occupied slots.
    ///
    /// A serial failure part way through leaves the cache as it was and
    /// faults the scanner.
    pub fn scan_all(&mut self) -> Result<u16> {
        let (transport, cache) = self.ready_parts()?;
        let scanned = cache.try_full_scan(|id| query_slot(transport, id));
        if let Err(error) = &scanned {
            warn!(%error, "library scan failed, scanner faulted");
            self.state = ScannerState::Faulted;
        }
        scanned
    }

    pub fn is_occupied(&self, id: u16) -> bool {
        self.ready_cache()
            .map(|cache| cache.is_occupied(id))
            .unwrap_or(false)
    }

    /// Lowest empty slot at or after `start`.
    pub fn find_empty_slot(&self, start: u16) -> Option<u16> {
        self.ready_cache()
            .and_then(|cache| cache.find_empty_slot(start))
    }

    /// Lowest empty slot in the library.
    pub fn first_empty_slot(&self) -> Option<u16> {
        self.find_empty_slot(1)
    }

    /// Up to `count` empty slots, ascending from `start`.
    pub fn find_empty_slots(&self, count: usize, start: u16) -> Vec<u16> {
        self.ready_cache()
            .map(|cache| cache.find_empty_slots(count, start))
            .unwrap_or_default()
    }

    pub fn find_last_empty_slot(&self) -> Option<u16> {
        self.ready_cache()
            .and_then(SlotCache::find_last_empty_slot)
    }

    /// `true` when templates are not packed at the lowest ids.
    pub fn is_fragmented(&self) -> bool {
        self.ready_cache()
            .map(SlotCache::is_fragmented)
            .unwrap_or(false)
    }

    pub fn statistics(&mut self) -> Result<DatabaseStatistics> {
        let (transport, cache) = self.ready_parts()?;
        Ok(cache.statistics(|id| Outcome::from_result(transport.query_template_at(id))))
    }

    /// Enroll a finger into slot `id`, or the lowest free slot for `None` or
    /// `Some(0)`.
    ///
    /// Takes `scans` captures (1 to 4) of the same finger, pausing
    /// `lift_delay` between them, and stores the merged template.
    pub fn enroll(&mut self, id: Option<u16>, scans: u8) -> Outcome {
        if !self.is_ready() {
            return Outcome::NoDevice;
        }
        if !(1..=MAX_ENROLL_SCANS).contains(&scans) {
            return Outcome::InvalidParameter;
        }

        let id = match id.filter(|id| *id != 0) {
            Some(id) => id,
            None => match self.first_empty_slot() {
                Some(id) => id,
                None => {
                    debug!("library full");
                    return Outcome::NoCapacityAvailable;
                }
            },
        };
        if !self.is_valid_slot(id) {
            return Outcome::InvalidSlot;
        }
        if self.is_occupied(id) {
            debug!(id, "slot already occupied");
            return Outcome::SlotOccupied;
        }

        info!(id, scans, "enrolling");
        let outcome = self.run_enrollment(id, scans);
        if outcome.is_success() {
            self.record(id, true);
            info!(id, "enrolled");
        } else {
            warn!(id, %outcome, "enrollment failed");
        }
        outcome
    }

    fn run_enrollment(&mut self, id: u16, scans: u8) -> Outcome {
        for scan in 1..=scans {
            if scan > 1 {
                trace!(scan, "waiting for finger to be lifted");
                thread::sleep(self.config.lift_delay);
            }

            let outcome = self.wait_for_image(self.config.capture_timeout, true);
            if !outcome.is_success() {
                return outcome;
            }

            let buffer = if scan == 1 {
                CharBuffer::One
            } else {
                CharBuffer::Two
            };
            let outcome = self.mutate(|transport| transport.extract_features(buffer));
            if !outcome.is_success() {
                return outcome;
            }

            if scan > 1 {
                let outcome = self.mutate(|transport| transport.commit_template());
                if !outcome.is_success() {
                    return outcome;
                }
            }
        }

        if scans == 1 {
            // Same image into buffer 2 so there is something to merge with.
            let outcome = self.mutate(|transport| transport.extract_features(CharBuffer::Two));
            if !outcome.is_success() {
                return outcome;
            }
            let outcome = self.mutate(|transport| transport.commit_template());
            if !outcome.is_success() {
                return outcome;
            }
        }

        self.mutate(|transport| transport.store_template(id))
    }

    /// Search the whole library for the finger on the sensor.
    ///
    /// `Ok(None)` means a finger was read but matches no template.
    pub fn identify(&mut self, timeout: Duration) -> core::result::Result<Option<FingerMatch>, Outcome> {
        if !self.is_ready() {
            return Err(Outcome::NoDevice);
        }

        self.capture_features(timeout)?;

        let capacity = self.capacity();
        let hit = self
            .transport
            .search_best(capacity)
            .map_err(|error| Outcome::from(&error))?;

        match Outcome::from_code(hit.code) {
            Outcome::Success => {
                if !self.is_occupied(hit.slot) {
                    warn!(slot = hit.slot, "matched a slot the cache reports empty");
                }
                debug!(slot = hit.slot, confidence = hit.confidence, "finger identified");
                Ok(Some(FingerMatch {
                    slot: hit.slot,
                    confidence: hit.confidence,
                }))
            }
            Outcome::NotFound | Outcome::NoMatch => {
                debug!("finger not enrolled");
                Ok(None)
            }
            other => Err(other),
        }
    }

    /// Compare the finger on the sensor with slot `id`. Returns the
    /// match confidence.
    pub fn verify(&mut self, id: u16) -> core::result::Result<u16, Outcome> {
        if !self.is_ready() {
            return Err(Outcome::NoDevice);
        }
        if !self.is_valid_slot(id) {
            return Err(Outcome::InvalidSlot);
        }

        self.capture_features(self.config.capture_timeout)?;

        let score = self
            .transport
            .search_against(id)
            .map_err(|error| Outcome::from(&error))?;
        match Outcome::from_code(score.code) {
            Outcome::Success => Ok(score.confidence),
            other => {
                debug!(id, outcome = %other, "verification failed");
                Err(other)
            }
        }
    }

    pub fn delete(&mut self, id: u16) -> Outcome {
        if !self.is_ready() {
            return Outcome::NoDevice;
        }
        if !self.is_valid_slot(id) {
            return Outcome::InvalidSlot;
        }

        let outcome = self.mutate(|transport| transport.delete_template(id));
        if outcome.is_success() {
            self.record(id, false);
            info!(id, "template deleted");
        } else {
            warn!(id, %outcome, "delete failed");
        }
        outcome
    }

    /// Delete every template.
    ///
    /// Tries the bulk command first and falls back to deleting slot by
    /// slot, where slots the module calls out of range count as cleared.
    pub fn clear(&mut self) -> Outcome {
        if !self.is_ready() {
            return Outcome::NoDevice;
        }

        let outcome = self.mutate(|transport| transport.empty_library());
        if outcome.is_success() {
            if let Some(cache) = self.cache.as_mut() {
                cache.mark_all_empty();
            }
            info!("library cleared");
            return outcome;
        }
        if !self.is_ready() {
            return outcome;
        }

        warn!(%outcome, "bulk clear failed, deleting slot by slot");
        let mut failed = 0u16;
        for id in 1..=self.capacity() {
            match self.mutate(|transport| transport.delete_template(id)) {
                Outcome::Success | Outcome::InvalidSlot => self.record(id, false),
                outcome => {
                    trace!(id, %outcome, "slot not cleared");
                    failed += 1;
                    if !self.is_ready() {
                        return outcome;
                    }
                }
            }
        }

        if failed == 0 {
            info!("library cleared");
            Outcome::Success
        } else {
            warn!(failed, "library partially cleared");
            Outcome::CommunicationError
        }
    }

    /// Drive the LED ring. Modules without one get `Unsupported` without a
    /// round trip.
    pub fn set_led(&mut self, led: LedState) -> Outcome {
        match self.profile() {
            Some(profile) if self.is_ready() => {
                if !profile.supports_led {
                    return Outcome::Unsupported;
                }
            }
            _ => return Outcome::NoDevice,
        }
        self.mutate(|transport| transport.set_indicator(led))
    }

    /// Set the matching strictness, 1 (lenient) to 5 (strict).
    pub fn set_security_level(&mut self, level: u8) -> Outcome {
        if !self.is_ready() {
            return Outcome::NoDevice;
        }
        if !(1..=5).contains(&level) {
            return Outcome::InvalidParameter;
        }
        let outcome = self.mutate(|transport| transport.set_security_tier(level));
        if outcome.is_success() {
            debug!(level, "security level set");
        }
        outcome
    }

    /// One capture attempt; `true` only when an image was taken.
    pub fn is_finger_present(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        Outcome::from_result(self.transport.capture_image()).is_success()
    }

    fn capture_features(&mut self, timeout: Duration) -> core::result::Result<(), Outcome> {
        let outcome = self.wait_for_image(timeout, false);
        if !outcome.is_success() {
            return Err(outcome);
        }
        let outcome = Outcome::from_result(self.transport.extract_features(CharBuffer::One));
        if outcome.is_success() {
            Ok(())
        } else {
            Err(outcome)
        }
    }

    /// Capture until a finger is imaged, something other than "no finger"
    /// comes back, or `timeout` runs out.
    fn wait_for_image(&mut self, timeout: Duration, mutating: bool) -> Outcome {
        let deadline = Instant::now() + timeout;
        loop {
            let outcome = if mutating {
                self.mutate(|transport| transport.capture_image())
            } else {
                Outcome::from_result(self.transport.capture_image())
            };
            if outcome != Outcome::NoSubjectPresented {
                return outcome;
            }
            if Instant::now() >= deadline {
                debug!(?timeout, "no finger presented");
                return Outcome::CommunicationTimeout;
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Run one state-changing transport call. A serial failure faults the
    /// scanner.
    fn mutate<F>(&mut self, call: F) -> Outcome
    where
        F: FnOnce(&mut T) -> Result<u8>,
    {
        match call(&mut self.transport) {
            Ok(code) => Outcome::from_code(code),
            Err(error) => {
                if error.is_fatal() && self.state == ScannerState::Ready {
                    warn!(%error, "serial link failed, scanner faulted");
                    self.state = ScannerState::Faulted;
                }
                Outcome::from(&error)
            }
        }
    }

    fn record(&mut self, id: u16, occupied: bool) {
        if let Some(cache) = self.cache.as_mut() {
            if let Err(error) = cache.mark_occupancy(id, occupied) {
                warn!(%error, "cache update rejected");
            }
        }
    }

    fn is_valid_slot(&self, id: u16) -> bool {
        (1..=self.capacity()).contains(&id)
    }

    fn ready_cache(&self) -> Option<&SlotCache> {
        if self.is_ready() {
            self.cache.as_ref()
        } else {
            None
        }
    }

    fn ready_parts(&mut self) -> Result<(&mut T, &mut SlotCache)> {
        match (self.state, self.cache.as_mut()) {
            (ScannerState::Ready, Some(cache)) => Ok((&mut self.transport, cache)),
            (state, _) => Err(Error::NotReady(state)),
        }
    }
}

/// Whether the module knows slot `id`: a template query answered with
/// either a template or an empty page.
fn is_addressable<T: Transport>(transport: &mut T, id: u16) -> bool {
    matches!(
        Outcome::from_result(transport.query_template_at(id)),
        Outcome::Success | Outcome::SlotEmpty
    )
}

/// Slot query for library scans. Only a dead link is an error; any other
/// failure reads as "no template here".
fn query_slot<T: Transport>(transport: &mut T, id: u16) -> Result<Outcome> {
    match transport.query_template_at(id) {
        Ok(code) => Ok(Outcome::from_code(code)),
        Err(error) if error.is_fatal() => Err(error),
        Err(error) => Ok(Outcome::from(&error)),
    }
}
