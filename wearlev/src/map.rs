//! Sector translation map.
//!
//! Pure arithmetic over the mapping state, with no per-sector side tables that
//! could drift out of sync with the spare pointer.

/// Logical-to-physical translation for one rotation region.
///
/// The region has `sectors` physical sectors; one (`dummy`) is the spare,
/// the other `sectors - 1` each hold exactly one logical sector,
/// contiguous in logical order modulo the rotation offset. Each committed
/// rotation advances the spare by one; a full pass of the spare shifts the
/// whole map by one physical sector, which `cycle` records. The spare
/// pointer is therefore cyclic with period `N` and the complete map with
/// period `N * (N - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SectorMap {
    sectors: u32,
    dummy: u32,
    cycle: u32,
}

impl SectorMap {
    /// Build the map for `sectors >= 2` physical sectors from persisted
    /// state. Out-of-range state values are reduced to their canonical
    /// form rather than trusted blindly.
    pub(crate) fn new(sectors: u32, dummy_position: u32, move_count: u32) -> Self {
        debug_assert!(sectors >= 2);
        Self {
            sectors,
            dummy: dummy_position % sectors,
            cycle: move_count % (sectors - 1),
        }
    }

    /// Number of addressable logical sectors.
    #[inline]
    pub(crate) fn logical_sectors(&self) -> u32 {
        self.sectors - 1
    }

    /// Physical index of the current spare.
    #[inline]
    pub(crate) fn spare(&self) -> u32 {
        self.dummy
    }

    /// Physical index of the sector the next rotation vacates, the one
    /// that becomes the spare.
    #[inline]
    pub(crate) fn vacating(&self) -> u32 {
        (self.dummy + 1) % self.sectors
    }

    /// Canonical pass counter for persisting.
    #[inline]
    pub(crate) fn move_count(&self) -> u32 {
        self.cycle
    }

    /// Translate a logical sector index to its physical sector.
    ///
    /// Total and deterministic for `logical < sectors - 1`; never yields
    /// the spare. Range checks belong to the caller.
    pub(crate) fn physical_of(&self, logical: u32) -> u32 {
        debug_assert!(logical < self.logical_sectors());
        let slots = self.sectors - 1;
        let slot = (logical + slots - self.cycle) % slots;
        if slot < self.dummy { slot } else { slot + 1 }
    }

    /// Inverse translation. `None` for the spare.
    pub(crate) fn logical_of(&self, physical: u32) -> Option<u32> {
        debug_assert!(physical < self.sectors);
        if physical == self.dummy {
            return None;
        }
        let slots = self.sectors - 1;
        let slot = if physical < self.dummy {
            physical
        } else {
            physical - 1
        };
        Some((slot + self.cycle) % slots)
    }

    /// The map after one committed rotation: the spare advances by one,
    /// wrapping into the next pass.
    pub(crate) fn advanced(&self) -> Self {
        let dummy = self.dummy + 1;
        if dummy == self.sectors {
            Self {
                sectors: self.sectors,
                dummy: 0,
                cycle: (self.cycle + 1) % (self.sectors - 1),
            }
        } else {
            Self { dummy, ..*self }
        }
    }
}
