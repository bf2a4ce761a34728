//! Construction-time configuration for a wear-leveled device.

/// Smallest sector size the core supports.
///
/// A state slot must hold the 32-byte mapping record plus the move marker
/// programmed at byte 64, so anything from 128 bytes up works.
pub const MIN_SECTOR_SIZE: u32 = 128;

/// Minimum number of redundant state-record copies.
pub const MIN_REDUNDANCY: u32 = 2;

/// Configuration for a wear-leveled device.
///
/// Two knobs:
///
/// - `redundancy`: number of state-record copies `K`. Each lives in its own
///   dedicated physical sector outside the logical address space; commits
///   rotate round-robin across them so a single corrupted sector never
///   loses the mapping.
/// - `rotation_interval`: logical writes between forced rotations
///   (`max_count`). Lower values level more aggressively at the cost of one
///   extra sector copy per interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WlConfig {
    redundancy: u32,
    rotation_interval: u32,
}

impl WlConfig {
    /// Create a new configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `redundancy` is below [`MIN_REDUNDANCY`] or
    /// `rotation_interval` is zero.
    pub const fn new(redundancy: u32, rotation_interval: u32) -> Result<Self, ConfigError> {
        if redundancy < MIN_REDUNDANCY {
            return Err(ConfigError::RedundancyTooLow { redundancy });
        }
        if rotation_interval == 0 {
            return Err(ConfigError::ZeroRotationInterval);
        }
        Ok(Self {
            redundancy,
            rotation_interval,
        })
    }

    /// Number of redundant state-record copies.
    #[inline]
    pub const fn redundancy(&self) -> u32 {
        self.redundancy
    }

    /// Logical writes between forced rotations.
    #[inline]
    pub const fn rotation_interval(&self) -> u32 {
        self.rotation_interval
    }
}

impl Default for WlConfig {
    /// Two state copies, one rotation every 16 logical writes.
    fn default() -> Self {
        Self {
            redundancy: 2,
            rotation_interval: 16,
        }
    }
}

/// Errors that can occur when validating a configuration against a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Fewer than [`MIN_REDUNDANCY`] state-record copies requested.
    RedundancyTooLow {
        /// The requested copy count.
        redundancy: u32,
    },
    /// A rotation interval of zero would rotate on every write forever.
    ZeroRotationInterval,
    /// The flash sector size is not a power of two, or too small to hold a
    /// state record.
    UnsupportedSectorSize {
        /// The sector size reported by the flash.
        sector_size: u32,
    },
    /// The flash region is too small for the state slots plus a spare and
    /// at least one logical sector.
    TooFewSectors {
        /// The sector count reported by the flash.
        sectors: u32,
        /// The minimum required for this configuration.
        required: u32,
    },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RedundancyTooLow { redundancy } => write!(
                f,
                "redundancy {} is below the minimum of {}",
                redundancy, MIN_REDUNDANCY
            ),
            Self::ZeroRotationInterval => write!(f, "rotation interval cannot be zero"),
            Self::UnsupportedSectorSize { sector_size } => write!(
                f,
                "sector size {} must be a power of two of at least {} bytes",
                sector_size, MIN_SECTOR_SIZE
            ),
            Self::TooFewSectors { sectors, required } => write!(
                f,
                "flash has {} sectors but this configuration needs at least {}",
                sectors, required
            ),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Fixed geometry of a mounted region, derived from the flash and the
/// configuration at mount time.
///
/// The last `state_slots` physical sectors hold the redundant state
/// records; the `data_sectors` before them are the rotation region: one
/// spare plus `data_sectors - 1` logical sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub sector_size: u32,
    pub data_sectors: u32,
    pub state_slots: u32,
}

impl Geometry {
    pub(crate) fn new(
        sector_size: u32,
        sector_count: u32,
        config: &WlConfig,
    ) -> Result<Self, ConfigError> {
        if !sector_size.is_power_of_two() || sector_size < MIN_SECTOR_SIZE {
            return Err(ConfigError::UnsupportedSectorSize { sector_size });
        }
        // K state slots, one spare, at least one logical sector.
        let required = config.redundancy() + 2;
        if sector_count < required {
            return Err(ConfigError::TooFewSectors {
                sectors: sector_count,
                required,
            });
        }
        Ok(Self {
            sector_size,
            data_sectors: sector_count - config.redundancy(),
            state_slots: config.redundancy(),
        })
    }

    /// Number of logical sectors exposed above this region.
    #[inline]
    pub(crate) fn logical_sectors(&self) -> u32 {
        self.data_sectors - 1
    }

    /// Physical sector holding the given state slot.
    #[inline]
    pub(crate) fn state_slot_sector(&self, slot: u32) -> u32 {
        self.data_sectors + slot
    }
}
