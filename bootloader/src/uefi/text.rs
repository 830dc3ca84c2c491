//! Simple Text Input and Output protocols

use super::{EfiStatus, Event};

#[repr(C)]
pub struct SimpleTextOutputProtocol {
    pub reset: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        extended_verification: bool,
    ) -> EfiStatus,
    pub output_string:
        unsafe extern "efiapi" fn(this: *mut SimpleTextOutputProtocol, string: *const u16) -> EfiStatus,
    pub test_string:
        unsafe extern "efiapi" fn(this: *mut SimpleTextOutputProtocol, string: *const u16) -> EfiStatus,
    pub query_mode: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        mode_number: usize,
        columns: *mut usize,
        rows: *mut usize,
    ) -> EfiStatus,
    pub set_mode:
        unsafe extern "efiapi" fn(this: *mut SimpleTextOutputProtocol, mode_number: usize) -> EfiStatus,
    pub set_attribute:
        unsafe extern "efiapi" fn(this: *mut SimpleTextOutputProtocol, attribute: usize) -> EfiStatus,
    pub clear_screen: unsafe extern "efiapi" fn(this: *mut SimpleTextOutputProtocol) -> EfiStatus,
    pub set_cursor_position: unsafe extern "efiapi" fn(
        this: *mut SimpleTextOutputProtocol,
        column: usize,
        row: usize,
    ) -> EfiStatus,
    pub enable_cursor:
        unsafe extern "efiapi" fn(this: *mut SimpleTextOutputProtocol, visible: bool) -> EfiStatus,
    pub mode: *mut SimpleTextOutputMode,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SimpleTextOutputMode {
    pub max_mode: i32,
    pub mode: i32,
    pub attribute: i32,
    pub cursor_column: i32,
    pub cursor_row: i32,
    pub cursor_visible: bool,
}

/// Text attributes (foreground colours on a black background)
pub mod color {
    pub const LIGHTGRAY: usize = 0x07;
    pub const DARKGRAY: usize = 0x08;
    pub const LIGHTRED: usize = 0x0C;
    pub const YELLOW: usize = 0x0E;
    pub const WHITE: usize = 0x0F;
}

#[repr(C)]
pub struct SimpleTextInputProtocol {
    pub reset: unsafe extern "efiapi" fn(
        this: *mut SimpleTextInputProtocol,
        extended_verification: bool,
    ) -> EfiStatus,
    pub read_key_stroke:
        unsafe extern "efiapi" fn(this: *mut SimpleTextInputProtocol, key: *mut InputKey) -> EfiStatus,
    pub wait_for_key: Event,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct InputKey {
    pub scan_code: u16,
    pub unicode_char: u16,
}
