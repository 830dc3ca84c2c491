//! Simple File System and File protocols

use super::{EfiStatus, Guid};

#[repr(C)]
pub struct SimpleFileSystemProtocol {
    pub revision: u64,
    pub open_volume: unsafe extern "efiapi" fn(
        this: *mut SimpleFileSystemProtocol,
        root: *mut *mut FileProtocol,
    ) -> EfiStatus,
}

#[repr(C)]
pub struct FileProtocol {
    pub revision: u64,
    pub open: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        new_handle: *mut *mut FileProtocol,
        file_name: *const u16,
        open_mode: u64,
        attributes: u64,
    ) -> EfiStatus,
    pub close: unsafe extern "efiapi" fn(this: *mut FileProtocol) -> EfiStatus,
    pub delete: unsafe extern "efiapi" fn(this: *mut FileProtocol) -> EfiStatus,
    pub read: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        buffer_size: *mut usize,
        buffer: *mut u8,
    ) -> EfiStatus,
    pub write: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        buffer_size: *mut usize,
        buffer: *const u8,
    ) -> EfiStatus,
    pub get_position: unsafe extern "efiapi" fn(this: *mut FileProtocol, position: *mut u64) -> EfiStatus,
    pub set_position: unsafe extern "efiapi" fn(this: *mut FileProtocol, position: u64) -> EfiStatus,
    pub get_info: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        information_type: *const Guid,
        buffer_size: *mut usize,
        buffer: *mut u8,
    ) -> EfiStatus,
    pub set_info: unsafe extern "efiapi" fn(
        this: *mut FileProtocol,
        information_type: *const Guid,
        buffer_size: usize,
        buffer: *const u8,
    ) -> EfiStatus,
    pub flush: unsafe extern "efiapi" fn(this: *mut FileProtocol) -> EfiStatus,
}

/// `EFI_FILE_MODE_READ`
pub const FILE_MODE_READ: u64 = 0x0000_0000_0000_0001;

/// Offsets into a raw `EFI_FILE_INFO` record, as returned by reading a
/// directory.
pub mod file_info {
    pub const SIZE: usize = 0;
    pub const ATTRIBUTE: usize = 72;
    /// Start of the NUL-terminated UCS-2 file name.
    pub const FILE_NAME: usize = 80;
}
