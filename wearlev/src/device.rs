//! The logical device: translation, inline rotation and the public API.

use async_lock::Mutex;
use wearlev_flash_device::SectorFlash;

use crate::config::{Geometry, WlConfig};
use crate::error::Error;
use crate::map::SectorMap;
use crate::state::{CRC32, MARKER_LEN, MARKER_OFFSET, MapState, MoveMarker};

/// Scratch size for streaming sector copies and checksums. Bounds stack
/// use; sectors smaller than this are handled by slicing.
const COPY_CHUNK: usize = 256;

/// Mutable core of a mounted device: the flash handle plus the current
/// mapping state. All methods assume the caller holds the device lock.
pub(crate) struct Core<F> {
    pub(crate) flash: F,
    pub(crate) geometry: Geometry,
    pub(crate) state: MapState,
    /// Slot holding the authoritative record; commits go to the next one.
    pub(crate) active_slot: u32,
}

impl<F: SectorFlash> Core<F> {
    /// Translation map for the current state.
    pub(crate) fn map(&self) -> SectorMap {
        SectorMap::new(
            self.geometry.data_sectors,
            self.state.dummy_position,
            self.state.move_count,
        )
    }

    fn check_range(&self, logical: u32, offset: u32, len: usize) -> Result<(), Error<F::Error>> {
        let size = self.geometry.sector_size as u64;
        if logical >= self.geometry.logical_sectors() || offset as u64 + len as u64 > size {
            return Err(Error::OutOfRange {
                sector: logical,
                offset,
                len,
            });
        }
        Ok(())
    }

    pub(crate) async fn read(
        &mut self,
        logical: u32,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), Error<F::Error>> {
        self.check_range(logical, offset, buf.len())?;
        let physical = self.map().physical_of(logical);
        self.flash.read(physical, offset, buf).await.map_err(Error::Io)
    }

    pub(crate) async fn write(
        &mut self,
        logical: u32,
        offset: u32,
        buf: &[u8],
    ) -> Result<(), Error<F::Error>> {
        self.check_range(logical, offset, buf.len())?;
        let physical = self.map().physical_of(logical);
        self.flash.write(physical, offset, buf).await.map_err(Error::Io)?;

        // Global rotation counter: wear leveling comes from the periodic
        // forced rotation, not from per-write relocation.
        self.state.access_count = self.state.access_count.saturating_add(1);
        if self.state.access_count >= self.state.max_count {
            self.rotate().await.map_err(Error::Io)?;
        }
        Ok(())
    }

    pub(crate) async fn erase_range(
        &mut self,
        logical: u32,
        count: u32,
    ) -> Result<(), Error<F::Error>> {
        let limit = self.map().logical_sectors();
        if logical >= limit || count > limit - logical {
            return Err(Error::OutOfRange {
                sector: logical,
                offset: 0,
                len: count as usize,
            });
        }
        for index in logical..logical + count {
            let physical = self.map().physical_of(index);
            self.flash.erase(physical).await.map_err(Error::Io)?;
        }
        Ok(())
    }

    /// One rotation step: relocate the sector that becomes the next spare
    /// into the current spare, then commit the advanced state.
    ///
    /// Ordering is what makes this power-loss safe: the marker precedes
    /// any data movement, the vacated erase follows the durable copy, and
    /// the record write to the next round-robin slot is the single commit
    /// point. A failure anywhere earlier leaves the previous generation
    /// authoritative.
    pub(crate) async fn rotate(&mut self) -> Result<(), F::Error> {
        let map = self.map();
        let src = map.vacating();
        let dst = map.spare();
        if let Some(logical) = map.logical_of(src) {
            trace!("relocating logical sector {}: {} -> {}", logical, src, dst);
        }

        let data_crc = self.sector_crc(src).await?;
        self.write_marker(self.active_slot, MoveMarker { data_crc }).await?;

        // The spare may hold stale data from its previous life, or a
        // partial copy from an interrupted rotation.
        self.flash.erase(dst).await?;
        self.copy_sector(src, dst).await?;
        self.flash.erase(src).await?;

        self.commit_advance().await?;
        debug!(
            "rotation committed: generation {}, spare {}",
            self.state.generation, self.state.dummy_position
        );
        Ok(())
    }

    /// Commit the post-rotation state to the next redundant slot. Never
    /// overwrites the slot that was read as authoritative.
    pub(crate) async fn commit_advance(&mut self) -> Result<(), F::Error> {
        let next_map = self.map().advanced();
        let next = MapState {
            generation: self.state.generation.wrapping_add(1),
            dummy_position: next_map.spare(),
            move_count: next_map.move_count(),
            access_count: 0,
            max_count: self.state.max_count,
        };
        let slot = (self.active_slot + 1) % self.geometry.state_slots;
        self.write_record(slot, &next).await?;
        self.state = next;
        self.active_slot = slot;
        Ok(())
    }

    /// Whole-sector content checksum, streamed in bounded chunks.
    pub(crate) async fn sector_crc(&mut self, sector: u32) -> Result<u32, F::Error> {
        let mut digest = CRC32.digest();
        let mut chunk = [0u8; COPY_CHUNK];
        let size = self.geometry.sector_size;
        let mut offset = 0;
        while offset < size {
            let n = (size - offset).min(COPY_CHUNK as u32) as usize;
            self.flash.read(sector, offset, &mut chunk[..n]).await?;
            digest.update(&chunk[..n]);
            offset += n as u32;
        }
        Ok(digest.finalize())
    }

    /// Copy one physical sector into another (already erased) one.
    pub(crate) async fn copy_sector(&mut self, src: u32, dst: u32) -> Result<(), F::Error> {
        let mut chunk = [0u8; COPY_CHUNK];
        let size = self.geometry.sector_size;
        let mut offset = 0;
        while offset < size {
            let n = (size - offset).min(COPY_CHUNK as u32) as usize;
            self.flash.read(src, offset, &mut chunk[..n]).await?;
            self.flash.write(dst, offset, &chunk[..n]).await?;
            offset += n as u32;
        }
        Ok(())
    }

    async fn write_record(&mut self, slot: u32, state: &MapState) -> Result<(), F::Error> {
        let sector = self.geometry.state_slot_sector(slot);
        self.flash.erase(sector).await?;
        self.flash.write(sector, 0, &state.encode()).await
    }

    pub(crate) async fn read_record(&mut self, slot: u32) -> Result<Option<MapState>, F::Error> {
        let mut record = [0u8; MapState::RECORD_LEN];
        let sector = self.geometry.state_slot_sector(slot);
        self.flash.read(sector, 0, &mut record).await?;
        Ok(MapState::decode(&record))
    }

    pub(crate) async fn read_marker(&mut self, slot: u32) -> Result<Option<MoveMarker>, F::Error> {
        let mut raw = [0u8; MARKER_LEN];
        let sector = self.geometry.state_slot_sector(slot);
        self.flash.read(sector, MARKER_OFFSET, &mut raw).await?;
        Ok(MoveMarker::decode(&raw))
    }

    async fn write_marker(&mut self, slot: u32, marker: MoveMarker) -> Result<(), F::Error> {
        let sector = self.geometry.state_slot_sector(slot);
        self.flash.write(sector, MARKER_OFFSET, &marker.encode()).await
    }
}

/// A wear-leveled logical block device over a raw sector flash.
///
/// Exposes `sector_count() - redundancy - 1` freely rewritable logical
/// sectors. Writes are programmed in place; every `rotation_interval`
/// writes the device performs one inline rotation, advancing the spare and
/// committing a new mapping generation. There is no background task:
/// write latency is predictable, occasionally one rotation higher.
///
/// The core sits behind a single async mutex held for the whole of each
/// operation, because a rotation's copy-erase-commit sequence must never
/// interleave with another operation touching the same physical sectors.
/// Guards are scoped, so the lock is released on every exit path.
pub struct WearLevelingDevice<F: SectorFlash> {
    core: Mutex<Core<F>>,
    geometry: Geometry,
}

impl<F: SectorFlash> WearLevelingDevice<F> {
    /// Write a fresh mapping state to every state slot.
    ///
    /// Destroys any previous mapping. The data region is left untouched.
    ///
    /// # Errors
    ///
    /// `Config` if the flash geometry cannot support `config`, `Io` on a
    /// flash failure.
    pub async fn format(flash: &mut F, config: &WlConfig) -> Result<(), Error<F::Error>> {
        let geometry = Geometry::new(flash.sector_size(), flash.sector_count(), config)
            .map_err(Error::Config)?;
        let record = MapState::initial(config.rotation_interval()).encode();
        for slot in 0..geometry.state_slots {
            let sector = geometry.state_slot_sector(slot);
            flash.erase(sector).await.map_err(Error::Io)?;
            flash.write(sector, 0, &record).await.map_err(Error::Io)?;
        }
        info!(
            "formatted: {} logical sectors, {} state slots",
            geometry.logical_sectors(),
            geometry.state_slots
        );
        Ok(())
    }

    /// Mount a previously formatted region.
    ///
    /// Runs the recovery scan: reads every state slot, selects the newest
    /// valid record and replays an interrupted rotation if one is found.
    /// Mounting an already-consistent region changes nothing.
    ///
    /// The flash handle is exclusively owned until [`unmount`]. Mounting
    /// the same physical region twice is a configuration error this layer
    /// cannot detect.
    ///
    /// # Errors
    ///
    /// `Corrupted` if no state slot holds a valid record or an interrupted
    /// rotation cannot be replayed; `Config` and `Io` as for [`format`].
    ///
    /// [`unmount`]: WearLevelingDevice::unmount
    /// [`format`]: WearLevelingDevice::format
    pub async fn mount(flash: F, config: WlConfig) -> Result<Self, Error<F::Error>> {
        let geometry = Geometry::new(flash.sector_size(), flash.sector_count(), &config)
            .map_err(Error::Config)?;
        let mut core = Core {
            flash,
            geometry,
            state: MapState::initial(config.rotation_interval()),
            active_slot: 0,
        };
        core.recover(config.rotation_interval()).await?;
        Ok(Self {
            geometry,
            core: Mutex::new(core),
        })
    }

    /// Read `buf.len()` bytes from a logical sector at a byte offset.
    pub async fn read(&self, logical: u32, offset: u32, buf: &mut [u8]) -> Result<(), Error<F::Error>> {
        self.core.lock().await.read(logical, offset, buf).await
    }

    /// Program `buf.len()` bytes into a logical sector at a byte offset.
    ///
    /// Like the raw device, this never erases: programming only clears
    /// bits. Call [`erase_range`] before rewriting a sector with arbitrary
    /// data. May trigger one inline rotation; if that rotation fails the
    /// write is reported failed and the previous mapping generation stays
    /// authoritative.
    ///
    /// [`erase_range`]: WearLevelingDevice::erase_range
    pub async fn write(&self, logical: u32, offset: u32, buf: &[u8]) -> Result<(), Error<F::Error>> {
        self.core.lock().await.write(logical, offset, buf).await
    }

    /// Erase `count` logical sectors starting at `logical`.
    pub async fn erase_range(&self, logical: u32, count: u32) -> Result<(), Error<F::Error>> {
        self.core.lock().await.erase_range(logical, count).await
    }

    /// Number of addressable logical sectors.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.geometry.logical_sectors()
    }

    /// Sector size in bytes.
    #[inline]
    pub fn sector_size(&self) -> u32 {
        self.geometry.sector_size
    }

    /// Snapshot of the current mapping state.
    pub async fn map_state(&self) -> MapState {
        self.core.lock().await.state
    }

    /// Consume the device and return the flash handle.
    ///
    /// Nothing needs flushing: every committed rotation is already
    /// durable, and the write counter restarts its interval on the next
    /// mount.
    pub fn unmount(self) -> F {
        self.core.into_inner().flash
    }
}
