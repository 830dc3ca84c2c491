//! `relay_core::Firmware` over the raw Boot Services table
//!
//! Pool buffers the firmware hands out (handle lists, open-protocol
//! records, text conversions) are copied into `Vec`s/`String`s and freed
//! here before anything reaches the engine.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::ptr;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use relay_core::firmware::{BlockDevice, DirEntry, Directory};
use relay_core::path::ucs2_to_string;
use relay_core::protocol::{FileAttributes, MemoryType, OpenAttributes, OpenInfo, Protocol};
use relay_core::{DevicePath, Firmware, Status};

use crate::uefi::block_io::{BlockIoMedia, BlockIoProtocol};
use crate::uefi::file::{file_info, FileProtocol, SimpleFileSystemProtocol, FILE_MODE_READ};
use crate::uefi::loaded_image::LoadedImageProtocol;
use crate::uefi::names::{ComponentNameProtocol, DevicePathToTextProtocol};
use crate::uefi::{
    BootServices, EfiStatus, Handle, OpenProtocolInformationEntry, SystemTable, BY_PROTOCOL,
    OPEN_PROTOCOL_GET_PROTOCOL, OPEN_PROTOCOL_TEST_PROTOCOL,
};

/// Longest firmware string we are willing to walk.
const MAX_TEXT: usize = 4096;

/// Initial directory read buffer: `EFI_FILE_INFO` plus a 256 unit name.
const DIR_BUFFER: usize = file_info::FILE_NAME + 256 * 2;

#[inline]
fn check(status: EfiStatus) -> Result<(), Status> {
    Status(status).to_result()
}

/// Copies a NUL-terminated firmware string.
///
/// # Safety
/// `text` must be null or point at a NUL-terminated UCS-2 string.
unsafe fn read_ucs2(text: *const u16) -> Option<String> {
    if text.is_null() {
        return None;
    }
    let mut len = 0;
    while len < MAX_TEXT && *text.add(len) != 0 {
        len += 1;
    }
    Some(ucs2_to_string(core::slice::from_raw_parts(text, len)))
}

pub struct UefiFirmware {
    image: Handle,
    st: &'static SystemTable,
    bs: &'static BootServices,
}

impl UefiFirmware {
    /// # Safety
    /// `st` must be the system table passed to the image entry point, and
    /// boot services must still be active.
    pub unsafe fn new(image: Handle, st: *const SystemTable) -> Option<Self> {
        let st = st.as_ref()?;
        let bs = st.boot_services.as_ref()?;
        Some(Self { image, st, bs })
    }

    /// Opens `protocol` on `handle` on behalf of our image.
    fn open<T>(&self, handle: Handle, protocol: Protocol) -> Result<*mut T, Status> {
        let guid = protocol.guid();
        let mut interface: *mut c_void = ptr::null_mut();
        // SAFETY: boot services are active for the lifetime of `self`.
        let status = unsafe {
            (self.bs.open_protocol)(
                handle,
                &guid,
                &mut interface,
                self.image,
                ptr::null_mut(),
                OPEN_PROTOCOL_GET_PROTOCOL,
            )
        };
        check(status)?;
        if interface.is_null() {
            return Err(Status::UNSUPPORTED);
        }
        Ok(interface.cast())
    }

    fn free_pool<T>(&self, buffer: *mut T) {
        if !buffer.is_null() {
            // SAFETY: `buffer` was allocated by the firmware from pool.
            unsafe {
                (self.bs.free_pool)(buffer.cast());
            }
        }
    }

    fn loaded_image(&self, image: Handle) -> Result<&LoadedImageProtocol, Status> {
        let li: *mut LoadedImageProtocol = self.open(image, Protocol::LoadedImage)?;
        // SAFETY: firmware-owned, lives as long as the image.
        Ok(unsafe { &*li })
    }

    /// Firmware vendor string and revision, for the banner.
    pub fn firmware_vendor(&self) -> (String, u32) {
        // SAFETY: the vendor string is always NUL-terminated.
        let vendor = unsafe { read_ucs2(self.st.firmware_vendor) }.unwrap_or_default();
        (vendor, self.st.firmware_revision)
    }

    /// UEFI specification revision as `(major, minor)`.
    pub fn uefi_revision(&self) -> (u32, u32) {
        let revision = self.st.header.revision;
        (revision >> 16, revision & 0xFFFF)
    }
}

impl Firmware for UefiFirmware {
    type Handle = Handle;
    type Block = UefiBlock;
    type Dir = UefiDir;

    fn image_handle(&self) -> Handle {
        self.image
    }

    fn image_device(&self) -> Result<Handle, Status> {
        let device = self.loaded_image(self.image)?.device_handle;
        if device.is_null() {
            Err(Status::NOT_FOUND)
        } else {
            Ok(device)
        }
    }

    fn locate_handles(&self, protocol: Protocol) -> Result<Vec<Handle>, Status> {
        let guid = protocol.guid();
        let mut count = 0usize;
        let mut buffer: *mut Handle = ptr::null_mut();
        // SAFETY: boot services are active; the buffer is freed below.
        let status = unsafe {
            (self.bs.locate_handle_buffer)(BY_PROTOCOL, &guid, ptr::null(), &mut count, &mut buffer)
        };
        check(status)?;
        if buffer.is_null() {
            return Ok(Vec::new());
        }
        // SAFETY: the firmware returned `count` handles at `buffer`.
        let handles = unsafe { core::slice::from_raw_parts(buffer, count) }.to_vec();
        self.free_pool(buffer);
        Ok(handles)
    }

    fn device_path(&self, handle: Handle) -> Result<&DevicePath, Status> {
        let path: *mut u8 = self.open(handle, Protocol::DevicePath)?;
        // SAFETY: the protocol interface is the device path itself and stays
        // installed for the rest of boot.
        unsafe { DevicePath::from_ptr(path) }.map_err(|_| Status::INVALID_PARAMETER)
    }

    fn open_block_device(&self, handle: Handle) -> Result<UefiBlock, Status> {
        let protocol: *mut BlockIoProtocol = self.open(handle, Protocol::BlockIo)?;
        // SAFETY: interface returned by OpenProtocol; media is mandatory.
        let media = unsafe { (*protocol).media.as_ref() }.ok_or(Status::DEVICE_ERROR)?;
        if !media.media_present {
            return Err(Status::NO_MEDIA);
        }
        Ok(UefiBlock {
            protocol,
            media: *media,
        })
    }

    fn test_protocol(&self, handle: Handle, protocol: Protocol) -> Result<(), Status> {
        let guid = protocol.guid();
        // SAFETY: TEST_PROTOCOL takes no interface pointer.
        let status = unsafe {
            (self.bs.open_protocol)(
                handle,
                &guid,
                ptr::null_mut(),
                self.image,
                ptr::null_mut(),
                OPEN_PROTOCOL_TEST_PROTOCOL,
            )
        };
        check(status)
    }

    fn open_protocol_information(
        &self,
        handle: Handle,
        protocol: Protocol,
    ) -> Result<Vec<OpenInfo<Handle>>, Status> {
        let guid = protocol.guid();
        let mut entries: *mut OpenProtocolInformationEntry = ptr::null_mut();
        let mut count = 0usize;
        // SAFETY: boot services are active; the buffer is freed below.
        let status = unsafe {
            (self.bs.open_protocol_information)(handle, &guid, &mut entries, &mut count)
        };
        check(status)?;
        if entries.is_null() {
            return Ok(Vec::new());
        }
        // SAFETY: the firmware returned `count` entries at `entries`.
        let infos = unsafe { core::slice::from_raw_parts(entries, count) }
            .iter()
            .map(|e| OpenInfo {
                agent: e.agent_handle,
                controller: (!e.controller_handle.is_null()).then_some(e.controller_handle),
                attributes: OpenAttributes::from_bits_retain(e.attributes),
                open_count: e.open_count,
            })
            .collect();
        self.free_pool(entries);
        Ok(infos)
    }

    fn open_volume(&self, handle: Handle) -> Result<UefiDir, Status> {
        let sfs: *mut SimpleFileSystemProtocol = self.open(handle, Protocol::SimpleFileSystem)?;
        let mut root: *mut FileProtocol = ptr::null_mut();
        // SAFETY: `sfs` is a live Simple File System interface.
        check(unsafe { ((*sfs).open_volume)(sfs, &mut root) })?;
        if root.is_null() {
            return Err(Status::DEVICE_ERROR);
        }
        Ok(UefiDir { file: root })
    }

    fn load_image(&self, path: &DevicePath) -> Result<Handle, Status> {
        let mut image: Handle = ptr::null_mut();
        // SAFETY: `path` is a well-formed device path; LoadImage copies it.
        let status = unsafe {
            (self.bs.load_image)(false, self.image, path.as_ptr(), ptr::null(), 0, &mut image)
        };
        check(status)?;
        Ok(image)
    }

    fn image_code_type(&self, image: Handle) -> Result<MemoryType, Status> {
        Ok(MemoryType(self.loaded_image(image)?.image_code_type))
    }

    fn start_image(&self, image: Handle) -> Result<(), Status> {
        let mut exit_data_size = 0usize;
        let mut exit_data: *mut u16 = ptr::null_mut();
        // SAFETY: `image` came from LoadImage.
        let status = unsafe { (self.bs.start_image)(image, &mut exit_data_size, &mut exit_data) };
        self.free_pool(exit_data);
        check(status)
    }

    fn unload_image(&self, image: Handle) -> Result<(), Status> {
        // SAFETY: `image` came from LoadImage.
        check(unsafe { (self.bs.unload_image)(image) })
    }

    fn connect_controller(
        &self,
        controller: Handle,
        driver: Option<Handle>,
        recursive: bool,
    ) -> Result<(), Status> {
        // NULL-terminated list of driver image handles.
        let drivers = [driver.unwrap_or(ptr::null_mut()), ptr::null_mut()];
        let list = if driver.is_some() {
            drivers.as_ptr()
        } else {
            ptr::null()
        };
        // SAFETY: `list` is null or NULL-terminated and outlives the call.
        check(unsafe { (self.bs.connect_controller)(controller, list, ptr::null(), recursive) })
    }

    fn disconnect_controller(&self, controller: Handle, driver: Option<Handle>) -> Result<(), Status> {
        // SAFETY: plain handles; null means "all".
        check(unsafe {
            (self.bs.disconnect_controller)(
                controller,
                driver.unwrap_or(ptr::null_mut()),
                ptr::null_mut(),
            )
        })
    }

    fn stall(&self, microseconds: usize) {
        // SAFETY: boot services are active.
        unsafe {
            (self.bs.stall)(microseconds);
        }
    }

    fn wait_for_key(&self) {
        let con_in = self.st.con_in;
        if con_in.is_null() {
            return;
        }
        // SAFETY: console input comes from the system table.
        unsafe {
            // Drop keys typed before the failure so they cannot dismiss it.
            let _ = ((*con_in).reset)(con_in, false);
            let event = (*con_in).wait_for_key;
            let mut key = crate::uefi::text::InputKey::default();
            loop {
                let mut index = 0usize;
                if check((self.bs.wait_for_event)(1, &event, &mut index)).is_err() {
                    return;
                }
                match Status(((*con_in).read_key_stroke)(con_in, &mut key)) {
                    Status::NOT_READY => continue,
                    _ => return,
                }
            }
        }
    }

    fn component_name(&self, agent: Handle, protocol: Protocol) -> Option<String> {
        let language: &[u8] = match protocol {
            Protocol::ComponentName2 => b"en\0",
            Protocol::ComponentName => b"eng\0",
            _ => return None,
        };
        let cn: *mut ComponentNameProtocol = self.open(agent, protocol).ok()?;
        let mut name: *const u16 = ptr::null();
        // SAFETY: `cn` is a live Component Name (2) interface; the returned
        // name is owned by the driver.
        unsafe {
            check(((*cn).get_driver_name)(cn, language.as_ptr(), &mut name)).ok()?;
            read_ucs2(name)
        }
    }

    fn device_path_text(&self, path: &DevicePath) -> Option<String> {
        let guid = Protocol::DevicePathToText.guid();
        let mut interface: *mut c_void = ptr::null_mut();
        // SAFETY: boot services are active; the returned text is pool
        // memory freed below.
        unsafe {
            check((self.bs.locate_protocol)(&guid, ptr::null(), &mut interface)).ok()?;
            let to_text = interface.cast::<DevicePathToTextProtocol>().as_ref()?;
            let text = (to_text.convert_device_path_to_text)(path.as_ptr(), false, false);
            let converted = read_ucs2(text);
            self.free_pool(text);
            converted
        }
    }
}

/// Block I/O opened on a handle.
pub struct UefiBlock {
    protocol: *mut BlockIoProtocol,
    media: BlockIoMedia,
}

impl UefiBlock {
    fn io_align(&self) -> usize {
        (self.media.io_align as usize).max(1)
    }
}

impl BlockIo for UefiBlock {
    type Error = Status;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.media.block_size).unwrap_or(BlockSize::BS_512)
    }

    fn num_blocks(&mut self) -> Result<u64, Status> {
        Ok(self.media.last_block + 1)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Status> {
        let align = self.io_align();
        let media_id = self.media.media_id;

        if (dst.as_ptr() as usize) % align == 0 {
            // SAFETY: `dst` is valid for `dst.len()` bytes and suitably aligned.
            return check(unsafe {
                ((*self.protocol).read_blocks)(
                    self.protocol,
                    media_id,
                    start_lba.0,
                    dst.len(),
                    dst.as_mut_ptr(),
                )
            });
        }

        // Bounce through a buffer that satisfies the controller's alignment.
        let mut bounce = vec![0u8; dst.len() + align];
        let offset = bounce.as_ptr().align_offset(align);
        let aligned = &mut bounce[offset..offset + dst.len()];
        // SAFETY: `aligned` is valid for `dst.len()` bytes and aligned.
        check(unsafe {
            ((*self.protocol).read_blocks)(
                self.protocol,
                media_id,
                start_lba.0,
                aligned.len(),
                aligned.as_mut_ptr(),
            )
        })?;
        dst.copy_from_slice(aligned);
        Ok(())
    }

    /// The chain loader only ever reads.
    fn write_blocks(&mut self, _start_lba: Lba, _src: &[u8]) -> Result<(), Status> {
        Err(Status::WRITE_PROTECTED)
    }

    fn flush(&mut self) -> Result<(), Status> {
        Ok(())
    }
}

impl BlockDevice for UefiBlock {
    fn is_logical_partition(&self) -> bool {
        self.media.logical_partition
    }
}

/// An open directory. Closed on drop.
pub struct UefiDir {
    file: *mut FileProtocol,
}

impl Directory for UefiDir {
    fn open(&self, path: &[u16]) -> Result<Self, Status> {
        let mut name = Vec::with_capacity(path.len() + 1);
        name.extend_from_slice(path);
        name.push(0);

        let mut file: *mut FileProtocol = ptr::null_mut();
        // SAFETY: `self.file` is open; `name` is NUL-terminated.
        check(unsafe {
            ((*self.file).open)(self.file, &mut file, name.as_ptr(), FILE_MODE_READ, 0)
        })?;
        if file.is_null() {
            return Err(Status::DEVICE_ERROR);
        }
        Ok(Self { file })
    }

    fn set_position(&mut self, position: u64) -> Result<(), Status> {
        // SAFETY: `self.file` is open.
        check(unsafe { ((*self.file).set_position)(self.file, position) })
    }

    fn read_entry(&mut self) -> Result<Option<DirEntry>, Status> {
        // u64 backing keeps EFI_FILE_INFO naturally aligned.
        let mut buffer: Vec<u64> = vec![0; DIR_BUFFER.div_ceil(8)];
        loop {
            let mut size = buffer.len() * 8;
            // SAFETY: `buffer` holds `size` writable bytes.
            let status = Status(unsafe {
                ((*self.file).read)(self.file, &mut size, buffer.as_mut_ptr().cast())
            });
            if status == Status::BUFFER_TOO_SMALL {
                buffer.resize(size.div_ceil(8), 0);
                continue;
            }
            status.to_result()?;
            if size == 0 {
                return Ok(None);
            }
            return parse_file_info(&buffer, size).map(Some);
        }
    }
}

impl Drop for UefiDir {
    fn drop(&mut self) {
        // SAFETY: `self.file` is open and not used after this.
        unsafe {
            ((*self.file).close)(self.file);
        }
    }
}

/// Decodes one `EFI_FILE_INFO` record of `size` bytes.
fn parse_file_info(buffer: &[u64], size: usize) -> Result<DirEntry, Status> {
    // SAFETY: `buffer` is `buffer.len() * 8` initialised bytes.
    let bytes = unsafe { core::slice::from_raw_parts(buffer.as_ptr().cast::<u8>(), buffer.len() * 8) };
    let bytes = bytes.get(..size).ok_or(Status::BAD_BUFFER_SIZE)?;

    let field = |offset: usize| -> Result<u64, Status> {
        let raw = bytes.get(offset..offset + 8).ok_or(Status::VOLUME_CORRUPTED)?;
        let mut le = [0u8; 8];
        le.copy_from_slice(raw);
        Ok(u64::from_le_bytes(le))
    };
    let record_size = field(file_info::SIZE)? as usize;
    let attributes = FileAttributes::from_bits_retain(field(file_info::ATTRIBUTE)?);

    let name_bytes = bytes
        .get(file_info::FILE_NAME..record_size.min(size))
        .ok_or(Status::VOLUME_CORRUPTED)?;
    let name = name_bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();

    Ok(DirEntry { name, attributes })
}
