//! In-memory sector flash with NOR semantics and fault injection.

use alloc::vec;
use alloc::vec::Vec;

use wearlev_flash_device::{FaultInjection, SectorFlash};

/// Error type for RAM flash operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RamFlashError {
    /// Sector index or byte range outside the device.
    Bounds,
    /// An armed fault fired; the operation was not applied.
    Fault,
}

impl core::fmt::Display for RamFlashError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bounds => write!(f, "access outside the flash region"),
            Self::Fault => write!(f, "injected fault"),
        }
    }
}

impl core::error::Error for RamFlashError {}

/// A heap-backed flash region with real NOR behavior.
///
/// Erase sets a sector to 0xFF; programming ANDs bytes in, so a write over
/// already-programmed cells silently loses bits exactly as hardware would,
/// and tests built on this catch any layer that forgets to erase first. Every
/// erase is counted per sector for wear-distribution assertions, and the
/// [`FaultInjection`] fuse fails operations at a chosen point to simulate
/// power loss.
///
/// # Example
///
/// ```ignore
/// let mut flash = RamFlash::new(512, 16);
/// flash.inject_fault_after(10);
/// // ... the 11th physical operation fails without being applied ...
/// ```
#[derive(Debug, Clone)]
pub struct RamFlash {
    sector_size: u32,
    data: Vec<u8>,
    erase_counts: Vec<u32>,
    ops: u64,
    fuse: Option<u64>,
}

impl RamFlash {
    /// Create an erased region of `sector_count` sectors of
    /// `sector_size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `sector_size` is not a power of two or `sector_count`
    /// is zero.
    pub fn new(sector_size: u32, sector_count: u32) -> Self {
        assert!(
            sector_size.is_power_of_two(),
            "sector_size must be a power of two"
        );
        assert!(sector_count > 0, "sector_count must be nonzero");
        Self {
            sector_size,
            data: vec![0xFF; (sector_size * sector_count) as usize],
            erase_counts: vec![0; sector_count as usize],
            ops: 0,
            fuse: None,
        }
    }

    /// How many times a sector has been erased.
    pub fn erase_count(&self, sector: u32) -> u32 {
        self.erase_counts[sector as usize]
    }

    /// Raw view of one sector's content.
    pub fn sector(&self, sector: u32) -> &[u8] {
        let start = (sector * self.sector_size) as usize;
        &self.data[start..start + self.sector_size as usize]
    }

    /// Mutable raw view of one sector, bypassing the flash contract.
    /// Intended for tests that corrupt persisted records in place.
    pub fn sector_mut(&mut self, sector: u32) -> &mut [u8] {
        let start = (sector * self.sector_size) as usize;
        &mut self.data[start..start + self.sector_size as usize]
    }

    fn gate(&mut self) -> Result<(), RamFlashError> {
        if let Some(left) = self.fuse.as_mut() {
            if *left == 0 {
                return Err(RamFlashError::Fault);
            }
            *left -= 1;
        }
        self.ops += 1;
        Ok(())
    }

    fn check(&self, sector: u32, offset: u32, len: usize) -> Result<usize, RamFlashError> {
        if sector >= self.erase_counts.len() as u32
            || offset as u64 + len as u64 > self.sector_size as u64
        {
            return Err(RamFlashError::Bounds);
        }
        Ok((sector * self.sector_size + offset) as usize)
    }
}

impl SectorFlash for RamFlash {
    type Error = RamFlashError;

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn sector_count(&self) -> u32 {
        self.erase_counts.len() as u32
    }

    async fn read(&mut self, sector: u32, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = self.check(sector, offset, buf.len())?;
        self.gate()?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    async fn write(&mut self, sector: u32, offset: u32, buf: &[u8]) -> Result<(), Self::Error> {
        let start = self.check(sector, offset, buf.len())?;
        self.gate()?;
        for (cell, byte) in self.data[start..start + buf.len()].iter_mut().zip(buf) {
            *cell &= *byte;
        }
        Ok(())
    }

    async fn erase(&mut self, sector: u32) -> Result<(), Self::Error> {
        let start = self.check(sector, 0, self.sector_size as usize)?;
        self.gate()?;
        self.data[start..start + self.sector_size as usize].fill(0xFF);
        self.erase_counts[sector as usize] += 1;
        Ok(())
    }
}

impl FaultInjection for RamFlash {
    fn inject_fault_after(&mut self, ops: u64) {
        self.fuse = Some(ops);
    }

    fn clear_fault(&mut self) {
        self.fuse = None;
    }

    fn op_count(&self) -> u64 {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: core::future::Future>(f: F) -> F::Output {
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
    fn test_program_only_clears_bits() {
        block_on(async {
            let mut flash = RamFlash::new(128, 4);
            flash.write(0, 0, &[0xF0]).await.unwrap();
            flash.write(0, 0, &[0x0F]).await.unwrap();

            let mut buf = [0u8; 1];
            flash.read(0, 0, &mut buf).await.unwrap();
            assert_eq!(buf[0], 0x00);
        });
    }

    #[test]
    fn test_erase_restores_and_counts() {
        block_on(async {
            let mut flash = RamFlash::new(128, 4);
            flash.write(1, 0, &[0x00; 16]).await.unwrap();
            flash.erase(1).await.unwrap();

            let mut buf = [0u8; 16];
            flash.read(1, 0, &mut buf).await.unwrap();
            assert_eq!(buf, [0xFF; 16]);
            assert_eq!(flash.erase_count(1), 1);
            assert_eq!(flash.erase_count(0), 0);
        });
    }

    #[test]
    fn test_fault_fires_at_exact_op() {
        block_on(async {
            let mut flash = RamFlash::new(128, 4);
            flash.inject_fault_after(2);

            let mut buf = [0u8; 1];
            flash.read(0, 0, &mut buf).await.unwrap();
            flash.write(0, 0, &[0xAA]).await.unwrap();
            assert_eq!(flash.erase(0).await, Err(RamFlashError::Fault));
            // The failed op is not applied and not counted.
            assert_eq!(flash.op_count(), 2);
            assert_eq!(flash.erase_count(0), 0);

            flash.clear_fault();
            flash.erase(0).await.unwrap();
            assert_eq!(flash.op_count(), 3);
        });
    }

    #[test]
    fn test_bounds_errors() {
        block_on(async {
            let mut flash = RamFlash::new(128, 4);
            let mut buf = [0u8; 4];
            assert_eq!(flash.read(4, 0, &mut buf).await, Err(RamFlashError::Bounds));
            assert_eq!(flash.write(0, 126, &buf).await, Err(RamFlashError::Bounds));
            assert_eq!(flash.erase(9).await, Err(RamFlashError::Bounds));
        });
    }
}
