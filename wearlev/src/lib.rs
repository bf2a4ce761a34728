//! Flash sector wear-leveling with power-loss safe rotation.
//!
//! This crate lets a file system treat a raw NOR/NAND flash region as an
//! array of freely rewritable logical sectors. Internally one physical
//! sector is kept aside as a rotating spare; a periodic copy-erase-commit
//! rotation walks the spare through the whole region so erase load is spread
//! evenly no matter which logical sectors are hot.
//!
//! # Architecture
//!
//! ```text
//! Logical View:            Physical Layout:
//! ┌──────────────┐         ┌──────────────┐ ← Physical 0
//! │ Sector 0     │ ───────►│ Data sectors │   ...
//! │ Sector 1     │ ───────►│ + one spare  │ ← Physical N-1
//! │ ...          │         ├──────────────┤
//! │ Sector N-2   │         │ State slot 0 │ ← Mapping state records,
//! └──────────────┘         │ ...          │   K redundant copies,
//!                          │ State slot K-1   committed round-robin
//!                          └──────────────┘
//! ```
//!
//! The mapping state (spare position, generation counter, rotation
//! counters) is persisted as a fixed little-endian record with a trailing
//! CRC32, in `K >= 2` dedicated sectors outside the logical space. On mount
//! the [recovery scanner] picks the valid record with the highest
//! generation and replays any rotation that was interrupted by power loss,
//! so a crash at any point leaves either the old or the new mapping fully
//! reconstructible.
//!
//! # Quick Start
//!
//! ```ignore
//! use wearlev::{WearLevelingDevice, WlConfig};
//!
//! let mut flash = MyFlash::new(); // any wearlev_flash_device::SectorFlash
//! let config = WlConfig::new(2, 16)?;
//!
//! // Once, at provisioning time:
//! WearLevelingDevice::format(&mut flash, &config).await?;
//!
//! // On every boot:
//! let device = WearLevelingDevice::mount(flash, config).await?;
//! device.erase_range(0, 1).await?;
//! device.write(0, 0, b"hello").await?;
//!
//! let mut buf = [0u8; 5];
//! device.read(0, 0, &mut buf).await?;
//! ```
//!
//! # Features
//!
//! - `std`: Enable standard library support
//! - `log`: Enable logging via the `log` facade
//! - `defmt`: Enable defmt logging for embedded targets
//!
//! [recovery scanner]: WearLevelingDevice::mount

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

#[macro_use]
mod fmt;

mod config;
mod device;
mod error;
mod map;
mod recovery;
mod state;

pub use config::{ConfigError, WlConfig};
pub use device::WearLevelingDevice;
pub use error::{CorruptionError, Error};
pub use state::MapState;

// Re-export the raw flash contract so users can depend on `wearlev` alone.
pub use wearlev_flash_device::{FaultInjection, SectorFlash, SendSectorFlash};
