//! The firmware boundary.
//!
//! Every firmware service the engine needs goes through [`Firmware`]. The
//! bootloader implements it over the raw UEFI boot-services table; tests
//! implement it over a scripted handle database.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use gpt_disk_io::BlockIo;

use crate::device_path::DevicePath;
use crate::protocol::{FileAttributes, MemoryType, OpenInfo, Protocol};
use crate::status::Status;

/// A Block I/O instance opened on a handle.
pub trait BlockDevice: BlockIo {
    /// `true` for partitions, `false` for whole disks.
    fn is_logical_partition(&self) -> bool;
}

/// One directory entry as returned by a read on an open directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// UCS-2 name, without terminator.
    pub name: Vec<u16>,
    pub attributes: FileAttributes,
}

/// An open directory on a mounted volume. Closed on drop.
pub trait Directory: Sized {
    /// Opens `path` (UCS-2, no terminator) read-only, relative to this
    /// directory. Absolute paths start at the volume root.
    fn open(&self, path: &[u16]) -> Result<Self, Status>;

    /// Moves the enumeration cursor; `0` rewinds.
    fn set_position(&mut self, position: u64) -> Result<(), Status>;

    /// Reads the next entry, `Ok(None)` once the directory is exhausted.
    fn read_entry(&mut self) -> Result<Option<DirEntry>, Status>;
}

/// Boot-time firmware services.
pub trait Firmware {
    /// Opaque handle. Only stable within one discovery pass.
    type Handle: Copy + Eq + fmt::Debug;
    type Block: BlockDevice;
    type Dir: Directory;

    /// Handle of the running image.
    fn image_handle(&self) -> Self::Handle;

    /// Device the running image was loaded from.
    fn image_device(&self) -> Result<Self::Handle, Status>;

    /// All handles exposing `protocol`.
    fn locate_handles(&self, protocol: Protocol) -> Result<Vec<Self::Handle>, Status>;

    /// Firmware-owned device path of `handle`.
    fn device_path(&self, handle: Self::Handle) -> Result<&DevicePath, Status>;

    fn open_block_device(&self, handle: Self::Handle) -> Result<Self::Block, Status>;

    /// Probes for `protocol` without opening it (`TEST_PROTOCOL`).
    fn test_protocol(&self, handle: Self::Handle, protocol: Protocol) -> Result<(), Status>;

    /// Every agent holding `protocol` open on `handle`.
    fn open_protocol_information(
        &self,
        handle: Self::Handle,
        protocol: Protocol,
    ) -> Result<Vec<OpenInfo<Self::Handle>>, Status>;

    /// Opens the Simple File System on `handle` and returns its root.
    fn open_volume(&self, handle: Self::Handle) -> Result<Self::Dir, Status>;

    /// Loads an image from `path`, parented to the running image.
    fn load_image(&self, path: &DevicePath) -> Result<Self::Handle, Status>;

    /// `ImageCodeType` from the image's Loaded Image protocol.
    fn image_code_type(&self, image: Self::Handle) -> Result<MemoryType, Status>;

    /// Transfers control; returns the image's exit status.
    fn start_image(&self, image: Self::Handle) -> Result<(), Status>;

    fn unload_image(&self, image: Self::Handle) -> Result<(), Status>;

    fn connect_controller(
        &self,
        controller: Self::Handle,
        driver: Option<Self::Handle>,
        recursive: bool,
    ) -> Result<(), Status>;

    fn disconnect_controller(
        &self,
        controller: Self::Handle,
        driver: Option<Self::Handle>,
    ) -> Result<(), Status>;

    /// Busy-waits for `microseconds`.
    fn stall(&self, microseconds: usize);

    /// Blocks until a key is pressed and discards it.
    fn wait_for_key(&self);

    /// Driver display name through `protocol` (Component Name 2 or
    /// Component Name) on `agent`, `None` if absent.
    fn component_name(&self, agent: Self::Handle, protocol: Protocol) -> Option<String>;

    /// Text form of `path` through the DevicePathToText protocol, `None`
    /// on firmware without it.
    fn device_path_text(&self, path: &DevicePath) -> Option<String>;
}

/// Text form of `path`, falling back to a hex dump.
pub fn describe_path<F: Firmware + ?Sized>(fw: &F, path: &DevicePath) -> String {
    fw.device_path_text(path).unwrap_or_else(|| path.to_hex())
}
