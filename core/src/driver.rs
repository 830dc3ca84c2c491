//! NTFS driver activation.
//!
//! Loads the filesystem driver from the boot medium, checks it really is a
//! boot services driver, starts it and binds it to the target partition.
//! Some firmware ships drivers that grab every partition they see without
//! producing a usable filesystem on it; [`disconnect_blocking_drivers`]
//! evicts those before ours is connected.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::firmware::{describe_path, BlockDevice, Firmware};
use crate::path::EfiPath;
use crate::protocol::{MemoryType, Protocol};
use crate::status::Status;

/// How the target partition got its Simple File System.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Firmware, or a previously loaded driver, already provides it.
    AlreadyPresent,
    /// Our driver was connected to the partition.
    Connected,
}

/// A driver image and the device it was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedDriver<H> {
    pub image: H,
    pub device: H,
}

/// Loads `driver_path` from the first filesystem that has it.
///
/// `preferred` (the device we booted from) is tried first, then every
/// Simple File System handle in firmware order.
pub fn load_driver<F: Firmware>(
    fw: &F,
    preferred: Option<F::Handle>,
    driver_path: &EfiPath,
) -> Result<LoadedDriver<F::Handle>> {
    let mut candidates: Vec<F::Handle> = preferred.into_iter().collect();
    match fw.locate_handles(Protocol::SimpleFileSystem) {
        Ok(handles) => candidates.extend(handles.into_iter().filter(|h| Some(*h) != preferred)),
        Err(status) => warn!("Could not enumerate filesystems: {}", status),
    }

    for device in candidates {
        let Ok(dev_path) = fw.device_path(device) else {
            continue;
        };
        let image_path = dev_path.with_file_path(driver_path.as_units());
        match fw.load_image(&image_path) {
            Ok(image) => {
                debug!("Loaded '{}' from {}", driver_path, describe_path(fw, dev_path));
                return Ok(LoadedDriver { image, device });
            }
            Err(status) => debug!("'{}' not on {:?}: {}", driver_path, device, status),
        }
    }

    Err(RelayError::DriverNotFound {
        path: driver_path.to_string(),
    })
}

/// Refuses anything but a boot services driver, then starts it.
///
/// A rejected image is unloaded before the error is returned.
pub fn verify_and_start<F: Firmware>(fw: &F, image: F::Handle) -> Result<()> {
    let code_type = match fw.image_code_type(image) {
        Ok(code_type) => code_type,
        Err(status) => {
            unload(fw, image);
            return Err(RelayError::Firmware {
                op: "OpenProtocol(LoadedImage)",
                status,
            });
        }
    };
    if code_type != MemoryType::BOOT_SERVICES_CODE {
        unload(fw, image);
        return Err(RelayError::WrongImageType(code_type));
    }

    fw.start_image(image)
        .map_err(RelayError::firmware("StartImage(driver)"))
}

fn unload<F: Firmware>(fw: &F, image: F::Handle) {
    if let Err(status) = fw.unload_image(image) {
        warn!("Could not unload driver image: {}", status);
    }
}

/// Disconnects drivers that hold a partition's Disk I/O without exposing a
/// filesystem on it. Returns how many were disconnected.
///
/// Nothing here is fatal: every failure is logged and skipped.
pub fn disconnect_blocking_drivers<F: Firmware>(fw: &F) -> usize {
    let handles = match fw.locate_handles(Protocol::BlockIo) {
        Ok(handles) => handles,
        Err(status) => {
            warn!("Could not enumerate block devices: {}", status);
            return 0;
        }
    };

    let mut disconnected = 0;
    for handle in handles {
        let logical = match fw.open_block_device(handle) {
            Ok(dev) => dev.is_logical_partition(),
            Err(_) => continue,
        };
        if !logical || fw.test_protocol(handle, Protocol::SimpleFileSystem).is_ok() {
            continue;
        }

        let holders = match fw.open_protocol_information(handle, Protocol::DiskIo) {
            Ok(holders) => holders,
            Err(Status::NOT_FOUND | Status::UNSUPPORTED) => continue,
            Err(status) => {
                warn!("Could not get Disk I/O holders for {:?}: {}", handle, status);
                continue;
            }
        };

        for holder in holders.iter().filter(|h| h.is_driver_hold()) {
            let name = driver_name(fw, holder.agent);
            let target = fw
                .device_path(handle)
                .map(|p| describe_path(fw, p))
                .unwrap_or_default();
            match fw.disconnect_controller(handle, Some(holder.agent)) {
                Ok(()) => {
                    info!("Disconnected '{}' from {}", name, target);
                    disconnected += 1;
                }
                Err(status) => warn!("Could not disconnect '{}' from {}: {}", name, target, status),
            }
        }
    }
    disconnected
}

/// Makes sure `partition` exposes a Simple File System, connecting `driver`
/// to it when it does not.
pub fn ensure_file_system<F: Firmware>(
    fw: &F,
    partition: F::Handle,
    driver: F::Handle,
) -> Result<ServiceState> {
    match fw.test_protocol(partition, Protocol::SimpleFileSystem) {
        Ok(()) => {
            info!("NTFS partition already has a file system service");
            Ok(ServiceState::AlreadyPresent)
        }
        Err(Status::UNSUPPORTED) => {
            fw.connect_controller(partition, Some(driver), true)
                .map_err(RelayError::firmware("ConnectController"))?;
            Ok(ServiceState::Connected)
        }
        Err(status) => Err(RelayError::Firmware {
            op: "OpenProtocol(SimpleFileSystem)",
            status,
        }),
    }
}

/// Display name of a driver: Component Name 2, then Component Name.
pub fn driver_name<F: Firmware>(fw: &F, agent: F::Handle) -> String {
    [Protocol::ComponentName2, Protocol::ComponentName]
        .into_iter()
        .find_map(|protocol| fw.component_name(agent, protocol))
        .unwrap_or_else(|| String::from("(unknown)"))
}
