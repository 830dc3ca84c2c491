//! Block I/O protocol

use super::EfiStatus;

#[repr(C)]
pub struct BlockIoProtocol {
    pub revision: u64,
    pub media: *const BlockIoMedia,
    pub reset:
        unsafe extern "efiapi" fn(this: *mut BlockIoProtocol, extended_verification: bool) -> EfiStatus,
    pub read_blocks: unsafe extern "efiapi" fn(
        this: *mut BlockIoProtocol,
        media_id: u32,
        lba: u64,
        buffer_size: usize,
        buffer: *mut u8,
    ) -> EfiStatus,
    pub write_blocks: unsafe extern "efiapi" fn(
        this: *mut BlockIoProtocol,
        media_id: u32,
        lba: u64,
        buffer_size: usize,
        buffer: *const u8,
    ) -> EfiStatus,
    pub flush_blocks: unsafe extern "efiapi" fn(this: *mut BlockIoProtocol) -> EfiStatus,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BlockIoMedia {
    pub media_id: u32,
    pub removable_media: bool,
    pub media_present: bool,
    pub logical_partition: bool,
    pub read_only: bool,
    pub write_caching: bool,
    pub block_size: u32,
    /// Required buffer alignment; 0 or 1 means none.
    pub io_align: u32,
    pub last_block: u64,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(core::mem::offset_of!(BlockIoMedia, logical_partition) == 6);
    assert!(core::mem::offset_of!(BlockIoMedia, block_size) == 12);
    assert!(core::mem::offset_of!(BlockIoMedia, io_align) == 16);
    assert!(core::mem::offset_of!(BlockIoMedia, last_block) == 24);
    assert!(core::mem::size_of::<BlockIoProtocol>() == 48);
};
