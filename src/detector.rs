//! Capability detection for modules of unknown family.
//!
//! There is no enumeration command, so the library size has to be inferred.
//! The primary method walks the catalog from the largest capacity down and
//! asks the module whether that capacity's last slot can be addressed; the
//! first one that can is the match. A module reporting its library size in
//! `ReadSysPara` gives a cheaper hint that is tried first, but the value is
//! not trustworthy across clones, so it only counts on an exact catalog hit.
//!
//! A probe cannot tell "this index does not exist" from "the line glitched",
//! so a marginal connection may select a smaller profile than the real one.

use tracing::{debug, trace};

use crate::profile::{self, Profile};
use crate::responses::SystemParameters;

/// How a profile was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    /// Set explicitly in the scanner configuration.
    Configured,
    /// The module reported a library size matching a catalog entry.
    Parameters,
    /// Capacity membership test over the catalog.
    CapacityProbe,
    /// Nothing matched; the smallest profile was assumed.
    Fallback,
}

/// Result of selecting a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub profile: &'static Profile,
    pub method: DetectionMethod,
}

/// Select a profile from the module's reported parameters.
///
/// Only an exact match between `finger_library_size` and a catalog capacity
/// counts.
pub fn detect_by_parameters(parameters: &SystemParameters) -> Option<&'static Profile> {
    let reported = parameters.finger_library_size;
    if reported == 0 {
        return None;
    }
    let found = profile::by_capacity(reported);
    trace!(reported, matched = found.is_some(), "library size hint");
    found
}

/// Select the profile whose largest slot is the highest addressable one.
///
/// Profiles are tried from the largest capacity down; `probe(id)` answers
/// whether slot `id` can be addressed.
pub fn detect_by_capacity<P>(mut probe: P) -> Option<&'static Profile>
where
    P: FnMut(u16) -> bool,
{
    for candidate in profile::by_capacity_descending() {
        if probe(candidate.capacity) {
            debug!(
                capacity = candidate.capacity,
                model = candidate.name,
                "slot addressable"
            );
            return Some(candidate);
        }
        trace!(capacity = candidate.capacity, "slot rejected");
    }
    None
}

/// Run the parameter hint, then the capacity membership test.
pub fn detect<P>(parameters: Option<&SystemParameters>, probe: P) -> Option<Detection>
where
    P: FnMut(u16) -> bool,
{
    if let Some(found) = parameters.and_then(detect_by_parameters) {
        return Some(Detection {
            profile: found,
            method: DetectionMethod::Parameters,
        });
    }

    detect_by_capacity(probe).map(|found| Detection {
        profile: found,
        method: DetectionMethod::CapacityProbe,
    })
}

/// Highest addressable slot in `1..=upper`, or 0 when slot 1 is rejected.
///
/// Binary search; assumes every slot below an accepted one is accepted too.
pub fn find_max_addressable<P>(mut probe: P, upper: u16) -> u16
where
    P: FnMut(u16) -> bool,
{
    let mut low = 1u16;
    let mut high = upper;
    let mut found = 0u16;

    while low <= high {
        let mid = low + (high - low) / 2;
        if probe(mid) {
            found = mid;
            low = match mid.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        } else {
            if mid == 1 {
                break;
            }
            high = mid - 1;
        }
    }

    found
}
