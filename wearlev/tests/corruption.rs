//! State-record corruption: redundancy fallback, refusal to mount without
//! any valid record, and recovery idempotence.

use futures::executor::block_on;
use wearlev::{CorruptionError, Error, WearLevelingDevice, WlConfig};
use wearlev_adapters::RamFlash;

const SECTOR_SIZE: u32 = 512;
const TOTAL: u32 = 6; // 4 data sectors + 2 state slots
const SLOT0: u32 = 4;
const SLOT1: u32 = 5;

fn pattern(logical: u32) -> [u8; SECTOR_SIZE as usize] {
    [0xF8 | logical as u8; SECTOR_SIZE as usize]
}

/// A formatted image where one write has committed generation 1 into
/// slot 1, leaving generation 0 plus the move marker behind in slot 0.
async fn image_after_one_rotation() -> RamFlash {
    let config = WlConfig::new(2, 1).unwrap();
    let mut flash = RamFlash::new(SECTOR_SIZE, TOTAL);
    WearLevelingDevice::format(&mut flash, &config)
        .await
        .unwrap();
    let device = WearLevelingDevice::mount(flash, config).await.unwrap();
    device.write(0, 0, &pattern(0)).await.unwrap();
    assert_eq!(device.map_state().await.generation, 1);
    device.unmount()
}

#[test]
fn corrupt_newest_record_falls_back() {
    block_on(async {
        let mut flash = image_after_one_rotation().await;
        // Flip a record byte in the newest copy; its checksum no longer
        // matches, so it must never be trusted.
        flash.sector_mut(SLOT1)[0] ^= 0xFF;

        let config = WlConfig::new(2, 1000).unwrap();
        let device = WearLevelingDevice::mount(flash, config).await.unwrap();

        // The older record's marker replayed the completed rotation, so the
        // mount converges on the same committed mapping.
        let state = device.map_state().await;
        assert_eq!(state.generation, 1);
        assert_eq!(state.dummy_position, 1);

        let mut buf = [0u8; SECTOR_SIZE as usize];
        device.read(0, 0, &mut buf).await.unwrap();
        assert_eq!(buf, pattern(0));
    });
}

#[test]
fn corrupt_every_record_fails_mount() {
    block_on(async {
        let mut flash = image_after_one_rotation().await;
        flash.sector_mut(SLOT0)[8] ^= 0x01;
        flash.sector_mut(SLOT1)[8] ^= 0x01;

        let config = WlConfig::new(2, 1000).unwrap();
        let result = WearLevelingDevice::mount(flash, config).await;
        assert!(matches!(
            result,
            Err(Error::Corrupted(CorruptionError::NoValidState))
        ));
    });
}

#[test]
fn recovery_is_idempotent() {
    block_on(async {
        let config = WlConfig::new(2, 2).unwrap();
        let mut flash = RamFlash::new(SECTOR_SIZE, TOTAL);
        WearLevelingDevice::format(&mut flash, &config)
            .await
            .unwrap();

        let device = WearLevelingDevice::mount(flash, config).await.unwrap();
        for _ in 0..3 {
            device.write(0, 0, &pattern(0)).await.unwrap();
        }
        let flash = device.unmount();

        let device = WearLevelingDevice::mount(flash, config).await.unwrap();
        let first = device.map_state().await;
        let flash = device.unmount();

        let device = WearLevelingDevice::mount(flash, config).await.unwrap();
        let second = device.map_state().await;
        assert_eq!(first, second);
    });
}

#[test]
fn stale_marker_on_old_slot_is_ignored() {
    block_on(async {
        // After the rotation, slot 0 still carries its marker but slot 1 is
        // authoritative; mounting must not replay anything.
        let flash = image_after_one_rotation().await;
        let config = WlConfig::new(2, 1000).unwrap();

        let device = WearLevelingDevice::mount(flash, config).await.unwrap();
        assert_eq!(device.map_state().await.generation, 1);
        let flash = device.unmount();

        let device = WearLevelingDevice::mount(flash, config).await.unwrap();
        assert_eq!(device.map_state().await.generation, 1);
    });
}
