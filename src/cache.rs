//! Host-side mirror of the module's template library.
//!
//! The module has no bulk "which slots are filled" command, so occupancy is
//! built by probing every slot once and then maintained locally as the
//! scanner enrolls and deletes. Nothing here talks to the device directly;
//! scans take a probe closure supplied by the caller.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::outcome::Outcome;

/// Derived view of the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStatistics {
    pub total_slots: u16,
    pub occupied_slots: u16,
    pub free_slots: u16,
    /// Lowest empty slot.
    pub first_free_slot: Option<u16>,
    /// Highest empty slot.
    pub last_free_slot: Option<u16>,
    /// Occupied share of the library, 0.0 to 100.0.
    pub usage_percentage: f32,
}

/// Per-slot occupancy, indexed by `slot - 1`.
#[derive(Debug, Clone)]
pub struct SlotCache {
    occupancy: Vec<bool>,
    occupied: u16,
    scanned: bool,
}

impl SlotCache {
    /// Allocate an empty, unscanned cache for `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] when `capacity` is zero.
    pub fn new(capacity: u16) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_configuration(
                "slot capacity must be greater than zero",
            ));
        }
        Ok(Self {
            occupancy: vec![false; usize::from(capacity)],
            occupied: 0,
            scanned: false,
        })
    }

    pub fn capacity(&self) -> u16 {
        self.occupancy.len() as u16
    }

    pub fn occupied_count(&self) -> u16 {
        self.occupied
    }

    /// Whether the mirror has been populated from the device.
    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    /// Probe every slot and rebuild the mirror.
    ///
    /// A slot counts as occupied only when `probe` returns
    /// [`Outcome::Success`]. Returns the number of occupied slots.
    pub fn full_scan<P>(&mut self, mut probe: P) -> u16
    where
        P: FnMut(u16) -> Outcome,
    {
        match self.try_full_scan(|id| Ok(probe(id))) {
            Ok(occupied) => occupied,
            Err(_) => self.occupied,
        }
    }

    /// Like [`full_scan`](Self::full_scan), but stops at the first slot whose
    /// query fails.
    ///
    /// The mirror is only replaced when every slot answered; after an
    /// error it keeps its previous contents and scanned flag.
    pub fn try_full_scan<Q>(&mut self, mut query: Q) -> Result<u16>
    where
        Q: FnMut(u16) -> Result<Outcome>,
    {
        let mut occupancy = Vec::with_capacity(self.occupancy.len());
        let mut occupied = 0u16;
        for id in 1..=self.capacity() {
            let outcome = query(id).map_err(|error| {
                debug!(id, %error, "full scan aborted");
                error
            })?;
            let filled = outcome.is_success();
            if filled {
                occupied += 1;
            } else if outcome != Outcome::SlotEmpty {
                trace!(id, %outcome, "probe did not report a template");
            }
            occupancy.push(filled);
        }
        self.occupancy = occupancy;
        self.occupied = occupied;
        self.scanned = true;
        debug!(capacity = self.capacity(), occupied, "full scan complete");
        Ok(occupied)
    }

    /// `false` for ids outside `[1, capacity]` and before the first scan.
    pub fn is_occupied(&self, id: u16) -> bool {
        if !self.scanned {
            return false;
        }
        self.index_of(id)
            .map(|index| self.occupancy[index])
            .unwrap_or(false)
    }

    /// Lowest empty slot at or after `start`.
    pub fn find_empty_slot(&self, start: u16) -> Option<u16> {
        if !self.scanned {
            return None;
        }
        let from = self.index_of(start)?;
        self.occupancy[from..]
            .iter()
            .position(|occupied| !occupied)
            .map(|offset| (from + offset) as u16 + 1)
    }

    /// Highest empty slot.
    pub fn find_last_empty_slot(&self) -> Option<u16> {
        if !self.scanned {
            return None;
        }
        self.occupancy
            .iter()
            .rposition(|occupied| !occupied)
            .map(|index| index as u16 + 1)
    }

    /// Up to `count` empty slots, ascending from `start`.
    pub fn find_empty_slots(&self, count: usize, start: u16) -> Vec<u16> {
        if !self.scanned || count == 0 {
            return Vec::new();
        }
        let from = match self.index_of(start) {
            Some(index) => index,
            None => return Vec::new(),
        };
        self.occupancy[from..]
            .iter()
            .enumerate()
            .filter(|(_, occupied)| !**occupied)
            .map(|(offset, _)| (from + offset) as u16 + 1)
            .take(count)
            .collect()
    }

    /// Record the new state of one slot.
    ///
    /// Setting a slot to the state it already has changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlot`] for ids outside `[1, capacity]`; the
    /// cache is left untouched.
    pub fn mark_occupancy(&mut self, id: u16, occupied: bool) -> Result<()> {
        let index = self.index_of(id).ok_or(Error::InvalidSlot {
            id,
            capacity: self.capacity(),
        })?;

        let previous = self.occupancy[index];
        if previous == occupied {
            return Ok(());
        }

        self.occupancy[index] = occupied;
        if occupied {
            self.occupied += 1;
        } else {
            self.occupied -= 1;
        }
        trace!(id, occupied, count = self.occupied, "slot updated");
        Ok(())
    }

    /// Mark every slot empty, as after a library wipe.
    pub fn mark_all_empty(&mut self) {
        self.occupancy.iter_mut().for_each(|slot| *slot = false);
        self.occupied = 0;
        self.scanned = true;
    }

    /// True when some occupied slot sits above an empty one.
    pub fn is_fragmented(&self) -> bool {
        match self.occupancy.iter().position(|occupied| !occupied) {
            Some(first_gap) => self.occupancy[first_gap..].iter().any(|occupied| *occupied),
            None => false,
        }
    }

    /// Current statistics, scanning first if the mirror was never populated.
    pub fn statistics<P>(&mut self, probe: P) -> DatabaseStatistics
    where
        P: FnMut(u16) -> Outcome,
    {
        if !self.scanned {
            self.full_scan(probe);
        }

        let total = self.capacity();
        DatabaseStatistics {
            total_slots: total,
            occupied_slots: self.occupied,
            free_slots: total - self.occupied,
            first_free_slot: self.find_empty_slot(1),
            last_free_slot: self.find_last_empty_slot(),
            usage_percentage: f32::from(self.occupied) / f32::from(total) * 100.0,
        }
    }

    fn index_of(&self, id: u16) -> Option<usize> {
        if id == 0 || id > self.capacity() {
            None
        } else {
            Some(usize::from(id) - 1)
        }
    }
}
