//! Loaded Image protocol

use core::ffi::c_void;

use super::{EfiStatus, Handle};

#[repr(C)]
pub struct LoadedImageProtocol {
    pub revision: u32,
    pub parent_handle: Handle,
    pub system_table: *mut c_void,
    pub device_handle: Handle,
    pub file_path: *const u8,
    pub reserved: *mut c_void,
    pub load_options_size: u32,
    pub load_options: *mut c_void,
    pub image_base: *mut c_void,
    pub image_size: u64,
    pub image_code_type: u32,
    pub image_data_type: u32,
    pub unload: Option<unsafe extern "efiapi" fn(image_handle: Handle) -> EfiStatus>,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(core::mem::offset_of!(LoadedImageProtocol, device_handle) == 24);
    assert!(core::mem::offset_of!(LoadedImageProtocol, image_code_type) == 80);
    assert!(core::mem::size_of::<LoadedImageProtocol>() == 96);
};
