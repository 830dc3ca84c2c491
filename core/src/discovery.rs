//! NTFS partition discovery.
//!
//! The firmware cannot tell us which partition is NTFS, so every Block I/O
//! handle on the boot disk gets its first sector read and the OEM id of
//! the boot sector checked.

use alloc::vec;

use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use log::{debug, info};

use crate::device_path::{paths_equal, DevicePath};
use crate::error::{RelayError, Result};
use crate::firmware::{describe_path, Firmware};
use crate::protocol::Protocol;

/// OEM id of an NTFS boot sector.
pub const NTFS_MAGIC: &[u8; 8] = b"NTFS    ";

/// Byte offset of the OEM id within sector 0.
pub const NTFS_MAGIC_OFFSET: usize = 3;

/// `true` if `sector` is the first sector of an NTFS volume.
pub fn has_ntfs_signature(sector: &[u8]) -> bool {
    sector.get(NTFS_MAGIC_OFFSET..NTFS_MAGIC_OFFSET + NTFS_MAGIC.len()) == Some(&NTFS_MAGIC[..])
}

/// Finds the NTFS partition that sits next to `boot`.
///
/// With `same_device_only`, a candidate must share its parent device path
/// (the disk) with the boot partition. The first match wins.
pub fn find_target_partition<F: Firmware>(
    fw: &F,
    boot: F::Handle,
    same_device_only: bool,
) -> Result<F::Handle> {
    let boot_path = fw.device_path(boot).ok();
    let boot_parent = boot_path.and_then(DevicePath::parent);

    let handles = fw
        .locate_handles(Protocol::BlockIo)
        .map_err(RelayError::firmware("LocateHandleBuffer(BlockIo)"))?;

    for handle in handles {
        if handle == boot {
            continue;
        }
        let path = fw.device_path(handle).ok();
        if paths_equal(path, boot_path) {
            continue;
        }
        if same_device_only {
            let parent = path.and_then(DevicePath::parent);
            if !paths_equal(parent.as_deref(), boot_parent.as_deref()) {
                continue;
            }
        }
        if probe_ntfs(fw, handle) {
            if let Some(path) = path {
                info!("Found NTFS target partition: {}", describe_path(fw, path));
            }
            return Ok(handle);
        }
    }

    Err(RelayError::PartitionNotFound)
}

/// Reads one block at LBA 0. Unreadable handles are not candidates.
fn probe_ntfs<F: Firmware>(fw: &F, handle: F::Handle) -> bool {
    let mut dev = match fw.open_block_device(handle) {
        Ok(dev) => dev,
        Err(status) => {
            debug!("{:?}: no Block I/O ({})", handle, status);
            return false;
        }
    };

    let block_size = dev.block_size().to_u64() as usize;
    let mut sector = vec![0u8; block_size];
    if let Err(err) = dev.read_blocks(Lba(0), &mut sector) {
        debug!("{:?}: could not read first sector ({})", handle, err);
        return false;
    }

    has_ntfs_signature(&sector)
}
