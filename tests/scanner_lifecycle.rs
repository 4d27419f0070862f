//! Integration tests for `begin()`: handshake, profile resolution and the
//! scanner state machine.

mod common;

use fingerprint_slots::mock::{MockCommand, MockModule};
use fingerprint_slots::{
    DetectionMethod, Error, FingerprintScanner, Outcome, ScannerState, SensorModel,
};
use rstest::rstest;

#[rstest]
#[case(162, SensorModel::As608)]
#[case(200, SensorModel::Gt511c3)]
#[case(256, SensorModel::Zfm20)]
#[case(300, SensorModel::Zfm60)]
#[case(1000, SensorModel::R307)]
fn test_capacity_probe_selects_profile(#[case] capacity: u16, #[case] expected: SensorModel) {
    let scanner = common::ready_scanner(MockModule::new(capacity));

    let detection = scanner.detection().expect("profile resolved");
    assert_eq!(detection.profile.model, expected);
    assert_eq!(detection.method, DetectionMethod::CapacityProbe);
    assert_eq!(scanner.capacity(), capacity);
}

#[test]
fn test_oversized_library_selects_largest_profile() {
    // Every cataloged capacity is addressable; the largest wins.
    let scanner = common::ready_scanner(MockModule::new(1500));
    assert_eq!(scanner.profile().map(|p| p.model), Some(SensorModel::R307));
}

#[test]
fn test_between_catalog_sizes_selects_next_lower_profile() {
    let scanner = common::ready_scanner(MockModule::new(280));
    assert_eq!(scanner.profile().map(|p| p.model), Some(SensorModel::Zfm20));
}

#[test]
fn test_reported_library_size_skips_probing() {
    let module = MockModule::new(300).with_reported_library_size(300);
    let scanner = common::ready_scanner(module);

    assert_eq!(
        scanner.detection().map(|d| d.method),
        Some(DetectionMethod::Parameters)
    );
    assert_eq!(scanner.profile().map(|p| p.model), Some(SensorModel::Zfm60));
    // Only the full scan probed.
    assert_eq!(scanner.transport().calls(MockCommand::QueryTemplate), 300);
}

#[test]
fn test_unknown_reported_size_falls_through_to_probe() {
    let module = MockModule::new(200).with_reported_library_size(123);
    let scanner = common::ready_scanner(module);
    assert_eq!(
        scanner.detection().map(|d| d.method),
        Some(DetectionMethod::CapacityProbe)
    );
    assert_eq!(scanner.capacity(), 200);
}

#[test]
fn test_configured_model_skips_detection() {
    let config = common::fast_config().with_model(SensorModel::Zfm20);
    let scanner = common::ready_scanner_with(MockModule::new(256), config);

    assert_eq!(
        scanner.detection().map(|d| d.method),
        Some(DetectionMethod::Configured)
    );
    assert_eq!(scanner.transport().calls(MockCommand::ReadParameters), 0);
    assert_eq!(scanner.transport().calls(MockCommand::QueryTemplate), 256);
}

#[test]
fn test_undetectable_module_falls_back_to_smallest() {
    let scanner = common::ready_scanner(MockModule::new(100));

    assert_eq!(
        scanner.detection().map(|d| d.method),
        Some(DetectionMethod::Fallback)
    );
    assert_eq!(scanner.profile().map(|p| p.model), Some(SensorModel::As608));
    assert_eq!(scanner.capacity(), 162);
}

#[test]
fn test_undetectable_module_without_fallback_faults() {
    let config = common::fast_config().with_fallback_to_smallest(false);
    let mut scanner = FingerprintScanner::new(MockModule::new(100), config);

    assert_eq!(scanner.begin(), Err(Error::NoProfileDetected));
    assert_eq!(scanner.state(), ScannerState::Faulted);
    assert!(scanner.profile().is_none());
}

#[test]
fn test_rejected_password_faults() {
    let module = MockModule::new(162).with_wrong_password();
    let mut scanner = FingerprintScanner::new(module, common::fast_config());

    assert_eq!(
        scanner.begin(),
        Err(Error::Handshake(Outcome::CommunicationError))
    );
    assert_eq!(scanner.state(), ScannerState::Faulted);
    assert_eq!(scanner.enroll(None, 2), Outcome::NoDevice);
    assert_eq!(scanner.transport().calls(MockCommand::QueryTemplate), 0);
}

#[test]
fn test_silent_module_faults() {
    let mut module = MockModule::new(162);
    module.disconnect();
    let mut scanner = FingerprintScanner::new(module, common::fast_config());

    let error = scanner.begin().unwrap_err();
    assert_eq!(error, Error::Handshake(Outcome::CommunicationError));
    assert_eq!(scanner.state(), ScannerState::Faulted);
}

#[test]
fn test_begin_recovers_from_fault() {
    let mut module = MockModule::new(162).with_enrolled(&[7]);
    module.disconnect();
    let mut scanner = FingerprintScanner::new(module, common::fast_config());
    assert!(scanner.begin().is_err());

    scanner.transport_mut().reconnect();
    scanner.begin().unwrap();
    assert_eq!(scanner.state(), ScannerState::Ready);
    assert!(scanner.is_occupied(7));
}

#[test]
fn test_serial_failure_during_delete_faults() {
    let mut scanner = common::ready_scanner(MockModule::new(162).with_enrolled(&[1]));
    scanner
        .transport_mut()
        .fail_next(MockCommand::DeleteTemplate, Error::serial("writing command"));

    assert_eq!(scanner.delete(1), Outcome::CommunicationError);
    assert_eq!(scanner.state(), ScannerState::Faulted);

    // Cache queries degrade and device calls are refused.
    assert!(!scanner.is_occupied(1));
    assert_eq!(scanner.find_empty_slot(1), None);
    assert_eq!(scanner.enrolled_count(), 0);
    assert_eq!(scanner.delete(1), Outcome::NoDevice);
    assert_eq!(
        scanner.statistics(),
        Err(Error::NotReady(ScannerState::Faulted))
    );
    assert!(scanner.transport().is_enrolled(1));
}

#[test]
fn test_garbled_reply_does_not_fault() {
    let mut scanner = common::ready_scanner(MockModule::new(162).with_enrolled(&[1]));
    scanner.transport_mut().fail_next(
        MockCommand::DeleteTemplate,
        Error::Checksum {
            expected: 0x0010,
            actual: 0x0011,
        },
    );

    assert_eq!(scanner.delete(1), Outcome::MalformedResponse);
    assert_eq!(scanner.state(), ScannerState::Ready);
    assert!(scanner.is_occupied(1));
}

#[test]
fn test_release_returns_transport() {
    let scanner = common::ready_scanner(MockModule::new(162).with_enrolled(&[9]));
    let module = scanner.release();
    assert!(module.is_enrolled(9));
}

#[test]
fn test_link_failure_during_library_scan_faults() {
    let mut module = MockModule::new(162).with_enrolled(&[1, 2]);
    for _ in 0..162 {
        module.fail_next(MockCommand::QueryTemplate, Error::serial("reading reply"));
    }
    let config = common::fast_config().with_model(SensorModel::As608);
    let mut scanner = FingerprintScanner::new(module, config);

    assert_eq!(scanner.begin(), Err(Error::serial("reading reply")));
    assert_eq!(scanner.state(), ScannerState::Faulted);
    assert_eq!(scanner.transport().calls(MockCommand::QueryTemplate), 1);

    // Nothing may be written over the templates the scan never saw.
    assert_eq!(scanner.first_empty_slot(), None);
    assert_eq!(scanner.enroll(None, 2), Outcome::NoDevice);
    assert_eq!(scanner.transport().calls(MockCommand::StoreTemplate), 0);
    assert!(scanner.transport().is_enrolled(1));
    assert!(scanner.transport().is_enrolled(2));
}

#[test]
fn test_begin_after_failed_library_scan() {
    let mut module = MockModule::new(162).with_enrolled(&[1, 2]);
    module.fail_next(MockCommand::QueryTemplate, Error::serial("reading reply"));
    let config = common::fast_config().with_model(SensorModel::As608);
    let mut scanner = FingerprintScanner::new(module, config);
    assert!(scanner.begin().is_err());

    scanner.begin().unwrap();
    assert_eq!(scanner.enrolled_count(), 2);
    assert_eq!(scanner.enroll(None, 2), Outcome::Success);
    assert!(scanner.transport().is_enrolled(3));
    common::assert_cache_matches_module(&scanner);
}

#[test]
fn test_garbled_reply_during_library_scan_reads_as_empty() {
    let mut module = MockModule::new(162).with_enrolled(&[1]);
    module.fail_next(
        MockCommand::QueryTemplate,
        Error::Checksum {
            expected: 0x0010,
            actual: 0x0011,
        },
    );
    let config = common::fast_config().with_model(SensorModel::As608);
    let scanner = common::ready_scanner_with(module, config);

    assert!(!scanner.is_occupied(1));
    assert_eq!(scanner.transport().calls(MockCommand::QueryTemplate), 162);
}

#[test]
fn test_link_failure_during_rescan_faults() {
    let mut scanner = common::ready_scanner(MockModule::new(162).with_enrolled(&[4]));
    scanner
        .transport_mut()
        .fail_next(MockCommand::QueryTemplate, Error::serial("reading reply"));

    assert_eq!(scanner.scan_all(), Err(Error::serial("reading reply")));
    assert_eq!(scanner.state(), ScannerState::Faulted);
    assert!(scanner.transport().is_enrolled(4));
}

#[test]
fn test_fallback_measures_addressable_slots() {
    let scanner = common::ready_scanner(MockModule::new(100));
    assert_eq!(
        scanner.detection().map(|d| d.method),
        Some(DetectionMethod::Fallback)
    );
    assert_eq!(scanner.addressable_slots(), Some(100));
}

#[test]
fn test_detected_profile_skips_addressable_search() {
    let scanner = common::ready_scanner(MockModule::new(200));
    assert_eq!(scanner.addressable_slots(), None);
}
