//! Raw sector flash contract.
//!
//! This crate defines the [`SectorFlash`] trait: the interface a wear-leveling
//! core (or any other sector-remapping layer) consumes from a physical flash
//! driver. The device is addressed by physical sector index; erase granularity
//! equals the sector size.
//!
//! The contract is deliberately thin and policy-free:
//!
//! - `read`/`write` access a byte range inside one sector,
//! - `write` programs bits and **never** implicitly erases,
//! - `erase` resets one whole sector to the erased state (all 0xFF),
//! - every call reports success or failure, never partial byte counts.
//!
//! [`SendSectorFlash`] is the `Send` variant of the same trait for
//! multi-threaded executors, generated with `trait-variant`.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

/// Interface to a raw flash region addressed by physical sector.
///
/// Implementations wrap an actual flash driver (memory-mapped NOR, SPI flash
/// behind `embedded-storage` traits, an in-memory fake, ...) and expose a
/// fixed geometry: `sector_count()` sectors of `sector_size()` bytes each,
/// where the sector size is a power of two and equals the erase unit.
///
/// A `SectorFlash` value is exclusively owned by whoever mounts it; the
/// contract makes no provision for shared access to the same physical region.
#[trait_variant::make(SendSectorFlash: Send)]
pub trait SectorFlash {
    /// The error type for flash operations.
    type Error: core::error::Error;

    /// Sector size `S` in bytes. Power of two; also the erase granularity.
    fn sector_size(&self) -> u32;

    /// Number of physical sectors in the region.
    fn sector_count(&self) -> u32;

    /// Read `buf.len()` bytes from `sector` starting at byte `offset`.
    ///
    /// # Errors
    ///
    /// Fails if the range exceeds the sector or the underlying device
    /// reports a failure. On error the buffer contents are unspecified.
    async fn read(&mut self, sector: u32, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Program `buf.len()` bytes into `sector` starting at byte `offset`.
    ///
    /// Programming only clears bits (1 → 0 on NOR); writing over
    /// already-programmed cells without an intervening [`erase`] does not
    /// restore them. This call never erases.
    ///
    /// # Errors
    ///
    /// Fails if the range exceeds the sector or the device reports a
    /// failure. A failed write leaves the sector contents unspecified.
    ///
    /// [`erase`]: SectorFlash::erase
    async fn write(&mut self, sector: u32, offset: u32, buf: &[u8]) -> Result<(), Self::Error>;

    /// Erase one whole sector, resetting every byte to 0xFF.
    async fn erase(&mut self, sector: u32) -> Result<(), Self::Error>;
}

/// Deterministic fault injection on a flash implementation.
///
/// Crash-consistency properties are tested by interrupting the device at an
/// exact physical operation instead of cycling real power: arm the fault,
/// drive the layer above until the operation fails, then remount and check
/// the invariants.
pub trait FaultInjection {
    /// Arm a fault: the next `ops` physical operations (read, write, erase)
    /// succeed, every one after that fails without being applied.
    fn inject_fault_after(&mut self, ops: u64);

    /// Disarm any pending fault.
    fn clear_fault(&mut self);

    /// Total physical operations performed since construction.
    ///
    /// Useful for asserting that an API call touched no hardware, and for
    /// sizing fault-injection sweeps.
    fn op_count(&self) -> u64;
}
