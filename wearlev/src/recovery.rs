//! Mount-time recovery: locate the authoritative mapping state and repair
//! an interrupted rotation.
//!
//! Every state slot is read and validated; the valid record with the
//! highest generation wins (ties go to the lowest slot, which keeps the
//! round-robin deterministic after a format wrote identical records
//! everywhere). A valid move marker on the winning slot means a rotation
//! from exactly that state was started and possibly never committed;
//! replaying it to its commit point is what makes both crash recovery and
//! the fall-back-one-generation path converge on the same mapping.

use wearlev_flash_device::SectorFlash;

use crate::device::Core;
use crate::error::{CorruptionError, Error};
use crate::state::{MapState, MoveMarker};

impl<F: SectorFlash> Core<F> {
    /// Scan the state slots, adopt the newest valid record and replay an
    /// interrupted rotation if the marker says one was in flight.
    pub(crate) async fn recover(&mut self, rotation_interval: u32) -> Result<(), Error<F::Error>> {
        let mut best: Option<(u32, MapState)> = None;
        for slot in 0..self.geometry.state_slots {
            match self.read_record(slot).await.map_err(Error::Io)? {
                Some(state) => {
                    if best.map_or(true, |(_, chosen)| state.generation > chosen.generation) {
                        best = Some((slot, state));
                    }
                }
                None => {
                    trace!("state slot {} holds no valid record", slot);
                }
            }
        }

        let (slot, mut state) = match best {
            Some(found) => found,
            None => {
                warn!("mount failed: no valid mapping state in any slot");
                return Err(Error::Corrupted(CorruptionError::NoValidState));
            }
        };

        // The mounted configuration wins over the persisted interval; the
        // new value reaches flash with the next rotation commit.
        state.max_count = rotation_interval;
        self.state = state;
        self.active_slot = slot;

        match self.read_marker(slot).await.map_err(Error::Io)? {
            Some(marker) => self.replay(marker).await?,
            None => {
                debug!(
                    "mounted clean: generation {}, spare {}",
                    self.state.generation, self.state.dummy_position
                );
            }
        }
        Ok(())
    }

    /// Finish the rotation the marker describes.
    ///
    /// The marker's data checksum decides how much work is left: if the
    /// spare already matches, the copy completed and only the vacated
    /// erase and the commit can be outstanding; otherwise the ordering
    /// guarantee (the source is erased strictly after the durable copy)
    /// means the source is still intact and the copy is redone from it.
    /// Either way the replay ends in a fresh commit, so running recovery
    /// again afterwards finds a clean state and does nothing.
    async fn replay(&mut self, marker: MoveMarker) -> Result<(), Error<F::Error>> {
        let map = self.map();
        let src = map.vacating();
        let dst = map.spare();

        let copied = self.sector_crc(dst).await.map_err(Error::Io)? == marker.data_crc;
        if !copied {
            self.flash.erase(dst).await.map_err(Error::Io)?;
            self.copy_sector(src, dst).await.map_err(Error::Io)?;
            if self.sector_crc(dst).await.map_err(Error::Io)? != marker.data_crc {
                warn!("replay verification failed for sector {}", src);
                return Err(Error::Corrupted(CorruptionError::ReplayVerification));
            }
        }
        self.flash.erase(src).await.map_err(Error::Io)?;
        self.commit_advance().await.map_err(Error::Io)?;
        info!(
            "replayed interrupted rotation: generation {}, spare {}",
            self.state.generation, self.state.dummy_position
        );
        Ok(())
    }
}
