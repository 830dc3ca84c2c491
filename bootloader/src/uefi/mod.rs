//! Raw UEFI bindings
//!
//! Only the tables and protocols the chain loader touches are declared.
//! Layouts follow the UEFI 2.x specification; everything is `repr(C)`
//! with `extern "efiapi"` function pointers.

use core::ffi::c_void;

pub mod block_io;
pub mod file;
pub mod loaded_image;
pub mod names;
pub mod table;
pub mod text;

/// EFI Handle type
pub type Handle = *mut c_void;

/// EFI Event type
pub type Event = *mut c_void;

/// EFI Status type
pub type EfiStatus = usize;

/// EFI GUID, in its in-memory (mixed-endian) layout
pub type Guid = uguid::Guid;

pub use table::{BootServices, OpenProtocolInformationEntry, SystemTable};

/// `LocateHandleBuffer` search type
pub const BY_PROTOCOL: u32 = 2;

/// `EFI_OPEN_PROTOCOL_GET_PROTOCOL`
pub const OPEN_PROTOCOL_GET_PROTOCOL: u32 = 0x0000_0002;
/// `EFI_OPEN_PROTOCOL_TEST_PROTOCOL`
pub const OPEN_PROTOCOL_TEST_PROTOCOL: u32 = 0x0000_0004;
