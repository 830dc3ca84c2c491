//! Component Name (2) and Device Path To Text protocols

use super::{EfiStatus, Handle};

/// Layout shared by Component Name and Component Name 2. Only the
/// language tag format differs (ISO 639-2 vs RFC 4646).
#[repr(C)]
pub struct ComponentNameProtocol {
    pub get_driver_name: unsafe extern "efiapi" fn(
        this: *mut ComponentNameProtocol,
        language: *const u8,
        driver_name: *mut *const u16,
    ) -> EfiStatus,
    pub get_controller_name: unsafe extern "efiapi" fn(
        this: *mut ComponentNameProtocol,
        controller_handle: Handle,
        child_handle: Handle,
        language: *const u8,
        controller_name: *mut *const u16,
    ) -> EfiStatus,
    /// Semicolon separated (CN2) or concatenated 3-letter (CN) tags.
    pub supported_languages: *const u8,
}

#[repr(C)]
pub struct DevicePathToTextProtocol {
    pub convert_device_node_to_text: unsafe extern "efiapi" fn(
        device_node: *const u8,
        display_only: bool,
        allow_shortcuts: bool,
    ) -> *mut u16,
    pub convert_device_path_to_text: unsafe extern "efiapi" fn(
        device_path: *const u8,
        display_only: bool,
        allow_shortcuts: bool,
    ) -> *mut u16,
}
