//! Shared helpers for the integration tests.
//!
//! Scanners built here use millisecond timeouts and no lift delay so that
//! capture polling finishes quickly.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use embedded_hal::serial::{Read, Write};
use fingerprint_slots::mock::MockModule;
use fingerprint_slots::{FingerprintScanner, ScannerConfig, ScannerState};

/// Capture timeout used by [`fast_config`].
pub const CAPTURE_TIMEOUT: Duration = Duration::from_millis(25);

pub fn fast_config() -> ScannerConfig {
    ScannerConfig::default()
        .with_capture_timeout(CAPTURE_TIMEOUT)
        .with_poll_interval(Duration::from_millis(1))
        .with_lift_delay(Duration::ZERO)
}

/// A scanner over `module` that has completed `begin()`.
pub fn ready_scanner(module: MockModule) -> FingerprintScanner<MockModule> {
    ready_scanner_with(module, fast_config())
}

pub fn ready_scanner_with(
    module: MockModule,
    config: ScannerConfig,
) -> FingerprintScanner<MockModule> {
    let mut scanner = FingerprintScanner::new(module, config);
    scanner.begin().expect("scanner should start");
    assert_eq!(scanner.state(), ScannerState::Ready);
    scanner
}

/// Check the cache against the mock's library slot by slot.
pub fn assert_cache_matches_module(scanner: &FingerprintScanner<MockModule>) {
    let module = scanner.transport();
    for id in 1..=scanner.capacity() {
        assert_eq!(
            scanner.is_occupied(id),
            module.is_enrolled(id),
            "cache and module disagree on slot {}",
            id
        );
    }
    assert_eq!(
        usize::from(scanner.enrolled_count()),
        module.enrolled_count()
    );
}

/// Build an acknowledge frame around `payload`.
pub fn ack_frame(payload: &[u8]) -> Vec<u8> {
    let length = (payload.len() + 2) as u16;
    let mut frame = vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07];
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    let checksum = frame[6..]
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)));
    frame.extend_from_slice(&checksum.to_be_bytes());
    frame
}

/// Serial TX half that records every byte.
#[derive(Debug, Default)]
pub struct RecordingTx {
    pub written: Vec<u8>,
}

impl Write<u8> for RecordingTx {
    type Error = ();

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.written.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

/// Serial RX half replaying canned replies; fails once they run out.
#[derive(Debug, Default)]
pub struct ScriptedRx {
    pending: VecDeque<u8>,
}

impl ScriptedRx {
    pub fn push_frame(&mut self, frame: &[u8]) {
        self.pending.extend(frame.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl Read<u8> for ScriptedRx {
    type Error = ();

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.pending.pop_front().ok_or(nb::Error::Other(()))
    }
}
