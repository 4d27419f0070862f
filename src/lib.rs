//! **fingerprint-slots** keeps track of the template library inside a serial fingerprint module
//! (R30x/R50x, AS608, ZFM-20/60 and similar Synochip-protocol devices).
//!
//! These modules have no "list templates" command and do not say how big their library is. The
//! [`FingerprintScanner`] works that out by probing: on [`begin`](FingerprintScanner::begin) it
//! picks a [`Profile`] from the module's answers, then queries every slot once and mirrors the
//! result in a [`SlotCache`]. Enroll, delete and clear keep the mirror current, so free-slot and
//! statistics queries never touch the serial line.
//!
//! Every device interaction reports an [`Outcome`]; [`Error`] is reserved for a link that does
//! not work at all.
//!
//! ## Example
//!
//! ```
//! use fingerprint_slots::mock::MockModule;
//! use fingerprint_slots::{FingerprintScanner, Outcome, ScannerConfig};
//! # use std::time::Duration;
//!
//! // Any `Transport` works here; `R502` drives a real module over embedded-hal serial.
//! let module = MockModule::new(162);
//! let config = ScannerConfig::default().with_lift_delay(Duration::ZERO);
//! let mut scanner = FingerprintScanner::new(module, config);
//! scanner.begin().unwrap();
//!
//! assert_eq!(scanner.capacity(), 162);
//! let slot = scanner.first_empty_slot().unwrap();
//! assert_eq!(scanner.enroll(Some(slot), 2), Outcome::Success);
//! assert!(scanner.is_occupied(slot));
//! ```
#![warn(missing_debug_implementations, rust_2018_idioms)]

mod cache;
mod commands;
mod detector;
mod driver;
mod error;
pub mod mock;
mod outcome;
pub mod profile;
mod responses;
mod scanner;
mod transport;
mod utils;

pub use crate::cache::{DatabaseStatistics, SlotCache};
pub use crate::commands::{CharBuffer, Command};
pub use crate::detector::{
    detect, detect_by_capacity, detect_by_parameters, find_max_addressable, Detection,
    DetectionMethod,
};
pub use crate::driver::{DEFAULT_ADDRESS, R502};
pub use crate::error::{Error, Result};
pub use crate::outcome::Outcome;
pub use crate::profile::{Profile, SensorModel, CATALOG};
pub use crate::responses::{
    AckResult, MatchResult, ReadSysParaResult, Reply, SearchResult, SystemParameters,
};
pub use crate::scanner::{FingerMatch, FingerprintScanner, ModelSelection, ScannerConfig, ScannerState};
pub use crate::transport::{LedColor, LedState, MatchScore, SearchHit, Transport};
