//! System Table and Boot Services Table

use core::ffi::c_void;

use super::text::{SimpleTextInputProtocol, SimpleTextOutputProtocol};
use super::{EfiStatus, Event, Guid, Handle};

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TableHeader {
    pub signature: u64,
    pub revision: u32,
    pub header_size: u32,
    pub crc32: u32,
    pub reserved: u32,
}

#[repr(C)]
pub struct SystemTable {
    pub header: TableHeader,
    pub firmware_vendor: *const u16,
    pub firmware_revision: u32,
    pub console_in_handle: Handle,
    pub con_in: *mut SimpleTextInputProtocol,
    pub console_out_handle: Handle,
    pub con_out: *mut SimpleTextOutputProtocol,
    pub standard_error_handle: Handle,
    pub std_err: *mut SimpleTextOutputProtocol,
    pub runtime_services: *mut c_void,
    pub boot_services: *mut BootServices,
    pub number_of_table_entries: usize,
    pub configuration_table: *mut c_void,
}

/// One agent holding a protocol open, as returned by
/// `OpenProtocolInformation`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OpenProtocolInformationEntry {
    pub agent_handle: Handle,
    pub controller_handle: Handle,
    pub attributes: u32,
    pub open_count: u32,
}

/// Slot for a service we never call. Keeps the table layout intact.
type Unused = *const c_void;

/// Boot Services Table
///
/// Every slot is present in UEFI table order; the ones the chain loader
/// does not use are left untyped.
#[repr(C)]
pub struct BootServices {
    pub header: TableHeader,

    // Task priority
    _raise_tpl: Unused,
    _restore_tpl: Unused,

    // Memory
    _allocate_pages: Unused,
    _free_pages: Unused,
    _get_memory_map: Unused,
    pub allocate_pool: unsafe extern "efiapi" fn(
        pool_type: u32,
        size: usize,
        buffer: *mut *mut u8,
    ) -> EfiStatus,
    pub free_pool: unsafe extern "efiapi" fn(buffer: *mut u8) -> EfiStatus,

    // Events and timers
    _create_event: Unused,
    _set_timer: Unused,
    pub wait_for_event: unsafe extern "efiapi" fn(
        number_of_events: usize,
        event: *const Event,
        index: *mut usize,
    ) -> EfiStatus,
    _signal_event: Unused,
    _close_event: Unused,
    _check_event: Unused,

    // Protocol handlers
    _install_protocol_interface: Unused,
    _reinstall_protocol_interface: Unused,
    _uninstall_protocol_interface: Unused,
    _handle_protocol: Unused,
    _reserved: Unused,
    _register_protocol_notify: Unused,
    _locate_handle: Unused,
    _locate_device_path: Unused,
    _install_configuration_table: Unused,

    // Images
    pub load_image: unsafe extern "efiapi" fn(
        boot_policy: bool,
        parent_image_handle: Handle,
        device_path: *const u8,
        source_buffer: *const c_void,
        source_size: usize,
        image_handle: *mut Handle,
    ) -> EfiStatus,
    pub start_image: unsafe extern "efiapi" fn(
        image_handle: Handle,
        exit_data_size: *mut usize,
        exit_data: *mut *mut u16,
    ) -> EfiStatus,
    _exit: Unused,
    pub unload_image: unsafe extern "efiapi" fn(image_handle: Handle) -> EfiStatus,
    _exit_boot_services: Unused,

    // Miscellaneous
    _get_next_monotonic_count: Unused,
    pub stall: unsafe extern "efiapi" fn(microseconds: usize) -> EfiStatus,
    _set_watchdog_timer: Unused,

    // Driver support
    pub connect_controller: unsafe extern "efiapi" fn(
        controller_handle: Handle,
        driver_image_handle: *const Handle,
        remaining_device_path: *const u8,
        recursive: bool,
    ) -> EfiStatus,
    pub disconnect_controller: unsafe extern "efiapi" fn(
        controller_handle: Handle,
        driver_image_handle: Handle,
        child_handle: Handle,
    ) -> EfiStatus,

    // Open and close protocol
    pub open_protocol: unsafe extern "efiapi" fn(
        handle: Handle,
        protocol: *const Guid,
        interface: *mut *mut c_void,
        agent_handle: Handle,
        controller_handle: Handle,
        attributes: u32,
    ) -> EfiStatus,
    _close_protocol: Unused,
    pub open_protocol_information: unsafe extern "efiapi" fn(
        handle: Handle,
        protocol: *const Guid,
        entry_buffer: *mut *mut OpenProtocolInformationEntry,
        entry_count: *mut usize,
    ) -> EfiStatus,

    // Library
    _protocols_per_handle: Unused,
    pub locate_handle_buffer: unsafe extern "efiapi" fn(
        search_type: u32,
        protocol: *const Guid,
        search_key: *const c_void,
        no_handles: *mut usize,
        buffer: *mut *mut Handle,
    ) -> EfiStatus,
    pub locate_protocol: unsafe extern "efiapi" fn(
        protocol: *const Guid,
        registration: *const c_void,
        interface: *mut *mut c_void,
    ) -> EfiStatus,
    _install_multiple_protocol_interfaces: Unused,
    _uninstall_multiple_protocol_interfaces: Unused,

    // CRC and memory utilities
    _calculate_crc32: Unused,
    _copy_mem: Unused,
    _set_mem: Unused,
    _create_event_ex: Unused,
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(core::mem::size_of::<TableHeader>() == 24);
    assert!(core::mem::offset_of!(BootServices, allocate_pool) == 64);
    assert!(core::mem::offset_of!(BootServices, _handle_protocol) == 152);
    assert!(core::mem::offset_of!(BootServices, load_image) == 200);
    assert!(core::mem::offset_of!(BootServices, stall) == 248);
    assert!(core::mem::offset_of!(BootServices, open_protocol) == 280);
    assert!(core::mem::offset_of!(BootServices, locate_handle_buffer) == 312);
    assert!(core::mem::size_of::<BootServices>() == 376);
};
