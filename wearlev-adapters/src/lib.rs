//! Sector flash adapters for the `wearlev` wear-leveling core.
//!
//! Two implementations of the [`SectorFlash`] contract:
//!
//! - [`RamFlash`] (feature `alloc`): a heap-backed fake with true NOR
//!   program semantics, per-sector erase counters and deterministic fault
//!   injection. The intended tool for testing crash consistency and wear
//!   distribution without hardware.
//! - [`NorFlashAdapter`] (feature `embedded-storage`): wraps any
//!   `embedded-storage` NOR flash (ESP32 internal flash, external SPI
//!   flash, ...) as a `SectorFlash` over a configured region.
//!
//! # Features
//!
//! - `alloc`: Enable the heap-backed RAM flash
//! - `std`: Enable standard library features
//! - `embedded-storage`: Enable the NOR flash adapter
//! - `log` / `defmt`: Logging support

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
mod ram_flash;

#[cfg(feature = "embedded-storage")]
mod nor_flash_adapter;

#[cfg(feature = "alloc")]
pub use ram_flash::{RamFlash, RamFlashError};

#[cfg(feature = "embedded-storage")]
pub use nor_flash_adapter::{NorFlashAdapter, NorFlashAdapterError, NorFlashRegion};

// Re-export the contract so users can depend on wearlev-adapters alone.
pub use wearlev_flash_device::{FaultInjection, SectorFlash, SendSectorFlash};
