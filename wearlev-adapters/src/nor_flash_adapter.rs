//! NOR flash adapter for embedded-storage traits.
//!
//! Wraps any type implementing the `embedded-storage` NOR flash traits and
//! exposes a region of it as a [`SectorFlash`]. Unlike a filesystem-facing
//! block adapter this one never erases on write: the wear-leveling core
//! above owns erase scheduling, and an implicit erase here would wreck its
//! crash-consistency ordering.
//!
//! # Example
//!
//! ```ignore
//! use esp_storage::FlashStorage as EspFlash;
//! use wearlev_adapters::{NorFlashAdapter, NorFlashRegion};
//!
//! let esp_flash = EspFlash::new();
//! let region = NorFlashRegion::new(0x3C_0000, 64); // 64 sectors at offset
//! let flash = NorFlashAdapter::new(esp_flash, region);
//! // flash now implements SectorFlash with S = ERASE_SIZE
//! ```

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use wearlev_flash_device::SectorFlash;

/// A window into a NOR flash device, in erase-sector units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorFlashRegion {
    /// Start offset in flash bytes (must be erase-sector aligned).
    pub base_offset: u32,
    /// Number of erase sectors in the region.
    pub sector_count: u32,
}

impl NorFlashRegion {
    /// Create a new region description.
    pub const fn new(base_offset: u32, sector_count: u32) -> Self {
        Self {
            base_offset,
            sector_count,
        }
    }
}

/// Error type for NOR flash adapter operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NorFlashAdapterError {
    /// Sector index or byte range outside the configured region.
    Bounds,
    /// The underlying flash reported a failure.
    Device,
}

impl core::fmt::Display for NorFlashAdapterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bounds => write!(f, "access outside the flash region"),
            Self::Device => write!(f, "NOR flash error"),
        }
    }
}

impl core::error::Error for NorFlashAdapterError {}

/// Adapter exposing an `embedded-storage` NOR flash as a [`SectorFlash`].
///
/// The sector size is the flash's `ERASE_SIZE`; reads and writes pass
/// through at byte granularity, erases cover exactly one sector.
pub struct NorFlashAdapter<F> {
    flash: F,
    region: NorFlashRegion,
}

impl<F> NorFlashAdapter<F> {
    /// Get the region description.
    pub fn region(&self) -> &NorFlashRegion {
        &self.region
    }

    /// Consume the adapter and return the underlying flash.
    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: NorFlash + ReadNorFlash> NorFlashAdapter<F> {
    /// Create a new adapter over `region` of `flash`.
    ///
    /// # Panics
    ///
    /// Panics if `region.base_offset` is not aligned to the flash's erase
    /// size.
    pub fn new(flash: F, region: NorFlashRegion) -> Self {
        assert!(
            region.base_offset as usize % F::ERASE_SIZE == 0,
            "base_offset must be erase-sector aligned"
        );
        Self { flash, region }
    }

    fn address(&self, sector: u32, offset: u32, len: usize) -> Result<u32, NorFlashAdapterError> {
        if sector >= self.region.sector_count
            || offset as u64 + len as u64 > F::ERASE_SIZE as u64
        {
            return Err(NorFlashAdapterError::Bounds);
        }
        Ok(self.region.base_offset + sector * F::ERASE_SIZE as u32 + offset)
    }
}

impl<F: NorFlash + ReadNorFlash> SectorFlash for NorFlashAdapter<F> {
    type Error = NorFlashAdapterError;

    fn sector_size(&self) -> u32 {
        F::ERASE_SIZE as u32
    }

    fn sector_count(&self) -> u32 {
        self.region.sector_count
    }

    async fn read(&mut self, sector: u32, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let address = self.address(sector, offset, buf.len())?;
        self.flash
            .read(address, buf)
            .map_err(|_| NorFlashAdapterError::Device)
    }

    async fn write(&mut self, sector: u32, offset: u32, buf: &[u8]) -> Result<(), Self::Error> {
        let address = self.address(sector, offset, buf.len())?;
        self.flash
            .write(address, buf)
            .map_err(|_| NorFlashAdapterError::Device)
    }

    async fn erase(&mut self, sector: u32) -> Result<(), Self::Error> {
        let address = self.address(sector, 0, 0)?;
        self.flash
            .erase(address, address + F::ERASE_SIZE as u32)
            .map_err(|_| NorFlashAdapterError::Device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTOR: usize = 4096;

    /// Mock NOR flash with AND-programming, like the real thing.
    struct MockFlash {
        data: [[u8; SECTOR]; 8],
    }

    impl MockFlash {
        fn new() -> Self {
            Self {
                data: [[0xFF; SECTOR]; 8],
            }
        }
    }

    #[derive(Debug)]
    struct MockFlashError;

    impl embedded_storage::nor_flash::NorFlashError for MockFlashError {
        fn kind(&self) -> embedded_storage::nor_flash::NorFlashErrorKind {
            embedded_storage::nor_flash::NorFlashErrorKind::Other
        }
    }

    impl embedded_storage::nor_flash::ErrorType for MockFlash {
        type Error = MockFlashError;
    }

    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let sector = (offset as usize) / SECTOR;
            let start = (offset as usize) % SECTOR;
            if sector >= self.data.len() || start + bytes.len() > SECTOR {
                return Err(MockFlashError);
            }
            bytes.copy_from_slice(&self.data[sector][start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len() * SECTOR
        }
    }

    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = SECTOR;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            let start = (from as usize) / SECTOR;
            let end = (to as usize).div_ceil(SECTOR);
            for sector in start..end.min(self.data.len()) {
                self.data[sector] = [0xFF; SECTOR];
            }
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let sector = (offset as usize) / SECTOR;
            let start = (offset as usize) % SECTOR;
            if sector >= self.data.len() || start + bytes.len() > SECTOR {
                return Err(MockFlashError);
            }
            for (cell, byte) in self.data[sector][start..start + bytes.len()]
                .iter_mut()
                .zip(bytes)
            {
                *cell &= *byte;
            }
            Ok(())
        }
    }

    fn block_on<Fut: core::future::Future>(f: Fut) -> Fut::Output {
        use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(core::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = core::pin::pin!(f);

        loop {
            match f.as_mut().poll(&mut cx) {
                Poll::Ready(val) => return val,
                Poll::Pending => {}
            }
        }
    }

    #[test]
    fn test_region_offset_math() {
        block_on(async {
            let mut flash = MockFlash::new();
            flash.data[2][0] = 0xAB; // sector 0 of a region based at sector 2

            let region = NorFlashRegion::new(2 * SECTOR as u32, 4);
            let mut adapter = NorFlashAdapter::new(flash, region);
            assert_eq!(adapter.sector_size(), SECTOR as u32);
            assert_eq!(adapter.sector_count(), 4);

            let mut buf = [0u8; 1];
            adapter.read(0, 0, &mut buf).await.unwrap();
            assert_eq!(buf[0], 0xAB);
        });
    }

    #[test]
    fn test_write_does_not_erase() {
        block_on(async {
            let flash = MockFlash::new();
            let region = NorFlashRegion::new(0, 4);
            let mut adapter = NorFlashAdapter::new(flash, region);

            adapter.write(1, 0, &[0xF0]).await.unwrap();
            adapter.write(1, 0, &[0x0F]).await.unwrap();

            let mut buf = [0u8; 1];
            adapter.read(1, 0, &mut buf).await.unwrap();
            // AND of both writes proves no implicit erase happened.
            assert_eq!(buf[0], 0x00);

            adapter.erase(1).await.unwrap();
            adapter.read(1, 0, &mut buf).await.unwrap();
            assert_eq!(buf[0], 0xFF);
        });
    }

    #[test]
    fn test_bounds_checks() {
        block_on(async {
            let flash = MockFlash::new();
            let region = NorFlashRegion::new(0, 4);
            let mut adapter = NorFlashAdapter::new(flash, region);

            let mut buf = [0u8; 8];
            assert_eq!(
                adapter.read(4, 0, &mut buf).await,
                Err(NorFlashAdapterError::Bounds)
            );
            assert_eq!(
                adapter.write(0, SECTOR as u32 - 4, &buf).await,
                Err(NorFlashAdapterError::Bounds)
            );
            assert_eq!(adapter.erase(7).await, Err(NorFlashAdapterError::Bounds));
        });
    }

    #[test]
    #[should_panic(expected = "erase-sector aligned")]
    fn test_unaligned_region() {
        let flash = MockFlash::new();
        let _ = NorFlashAdapter::new(flash, NorFlashRegion::new(0x100, 4));
    }
}
