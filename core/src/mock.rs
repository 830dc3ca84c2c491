//! Scripted firmware for host tests.
//!
//! Handles are indices into a table built up front; anything that changes
//! while the engine runs (connections, loaded images, the call journal)
//! sits behind a `RefCell`.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use crate::device_path::{node_type, sub_type, DevicePath, DevicePathBuf};
use crate::firmware::{BlockDevice, DirEntry, Directory, Firmware};
use crate::path::{ucs2_to_string, SEPARATOR};
use crate::protocol::{FileAttributes, MemoryType, OpenAttributes, OpenInfo, Protocol};
use crate::status::Status;

pub type Handle = usize;

/// Handle of the running image.
pub const SELF_IMAGE: Handle = 0;

/// Everything observable the engine did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadBlocks { handle: Handle, lba: u64, len: usize },
    LoadImage { file: String, device: Option<Handle> },
    StartImage(Handle),
    UnloadImage(Handle),
    Connect { controller: Handle, driver: Option<Handle>, recursive: bool },
    Disconnect { controller: Handle, driver: Option<Handle> },
    OpenVolume(Handle),
    Stall(usize),
    WaitForKey,
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

#[derive(Debug, Clone, Copy)]
pub struct ImageSpec {
    pub code_type: MemoryType,
    pub exit_status: Status,
}

impl ImageSpec {
    pub fn driver() -> Self {
        Self {
            code_type: MemoryType::BOOT_SERVICES_CODE,
            exit_status: Status::SUCCESS,
        }
    }

    pub fn application() -> Self {
        Self {
            code_type: MemoryType::LOADER_CODE,
            exit_status: Status::SUCCESS,
        }
    }
}

/// A file or directory in a scripted volume.
#[derive(Debug, Clone)]
pub struct MockNode {
    pub name: Vec<u16>,
    pub directory: bool,
    pub children: Vec<MockNode>,
}

impl MockNode {
    pub fn dir(name: &str, children: Vec<MockNode>) -> Self {
        Self {
            name: name.encode_utf16().collect(),
            directory: true,
            children,
        }
    }

    pub fn file(name: &str) -> Self {
        Self {
            name: name.encode_utf16().collect(),
            directory: false,
            children: Vec::new(),
        }
    }

    pub fn root(children: Vec<MockNode>) -> Self {
        Self::dir("", children)
    }

    fn child(&self, name: &[u16]) -> Option<&MockNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// An open directory: the volume root plus the exact-case route to it.
pub struct MockDir {
    root: Rc<MockNode>,
    route: Vec<Vec<u16>>,
    position: usize,
    reads: Rc<Cell<usize>>,
}

impl MockDir {
    fn node(&self) -> Option<&MockNode> {
        self.route
            .iter()
            .try_fold(&*self.root, |node, name| node.child(name))
    }
}

impl Directory for MockDir {
    /// Exact-case lookup, like a case-sensitive filesystem driver.
    fn open(&self, path: &[u16]) -> Result<Self, Status> {
        let mut route = if path.first() == Some(&SEPARATOR) {
            Vec::new()
        } else {
            self.route.clone()
        };
        for name in path.split(|&u| u == SEPARATOR).filter(|n| !n.is_empty()) {
            route.push(name.to_vec());
        }
        let dir = Self {
            root: Rc::clone(&self.root),
            route,
            position: 0,
            reads: Rc::clone(&self.reads),
        };
        match dir.node() {
            Some(_) => Ok(dir),
            None => Err(Status::NOT_FOUND),
        }
    }

    fn set_position(&mut self, position: u64) -> Result<(), Status> {
        self.position = position as usize;
        Ok(())
    }

    fn read_entry(&mut self) -> Result<Option<DirEntry>, Status> {
        self.reads.set(self.reads.get() + 1);
        let node = self.node().ok_or(Status::NOT_FOUND)?;
        if !node.directory {
            return Err(Status::INVALID_PARAMETER);
        }
        let entry = node.children.get(self.position).map(|c| DirEntry {
            name: c.name.clone(),
            attributes: if c.directory {
                FileAttributes::DIRECTORY
            } else {
                FileAttributes::ARCHIVE
            },
        });
        if entry.is_some() {
            self.position += 1;
        }
        Ok(entry)
    }
}

pub fn root_dir(root: MockNode) -> MockDir {
    MockDir {
        root: Rc::new(root),
        route: Vec::new(),
        position: 0,
        reads: Rc::new(Cell::new(0)),
    }
}

/// Block I/O over an in-memory disk image.
pub struct MockBlock {
    handle: Handle,
    data: Vec<u8>,
    block_size: u32,
    logical: bool,
    read_error: Option<Status>,
    journal: Journal,
}

impl BlockIo for MockBlock {
    type Error = Status;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size).unwrap_or(BlockSize::BS_512)
    }

    fn num_blocks(&mut self) -> Result<u64, Status> {
        Ok((self.data.len() / self.block_size as usize) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Status> {
        self.journal.borrow_mut().push(Call::ReadBlocks {
            handle: self.handle,
            lba: start_lba.0,
            len: dst.len(),
        });
        if let Some(status) = self.read_error {
            return Err(status);
        }
        let start = start_lba.0 as usize * self.block_size as usize;
        let src = self
            .data
            .get(start..start + dst.len())
            .ok_or(Status::DEVICE_ERROR)?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn write_blocks(&mut self, _start_lba: Lba, _src: &[u8]) -> Result<(), Status> {
        Err(Status::WRITE_PROTECTED)
    }

    fn flush(&mut self) -> Result<(), Status> {
        Ok(())
    }
}

impl BlockDevice for MockBlock {
    fn is_logical_partition(&self) -> bool {
        self.logical
    }
}

#[derive(Clone)]
struct DiskSpec {
    data: Vec<u8>,
    block_size: u32,
    logical: bool,
    read_error: Option<Status>,
}

/// One entry of the handle database.
#[derive(Clone, Default)]
pub struct HandleEntry {
    device_path: Option<DevicePathBuf>,
    protocols: Vec<Protocol>,
    disk: Option<DiskSpec>,
    volume: Option<Rc<MockNode>>,
    images: Vec<(String, ImageSpec)>,
    holders: Vec<(Protocol, OpenInfo<Handle>)>,
    open_info_error: Option<Status>,
    disconnect_error: Option<Status>,
    sfs_probe_error: Option<Status>,
    names: Vec<(Protocol, String)>,
}

impl HandleEntry {
    pub fn new(device_path: DevicePathBuf) -> Self {
        Self {
            device_path: Some(device_path),
            protocols: vec![Protocol::DevicePath],
            ..Self::default()
        }
    }

    /// A handle with no device path, such as a driver image.
    pub fn bare() -> Self {
        Self::default()
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocols.push(protocol);
        self
    }

    /// Block I/O plus Disk I/O over `sector0` padded to a few blocks.
    pub fn disk(mut self, logical: bool, sector0: &[u8]) -> Self {
        let mut data = vec![0u8; 512 * 4];
        data[..sector0.len()].copy_from_slice(sector0);
        self.disk = Some(DiskSpec {
            data,
            block_size: 512,
            logical,
            read_error: None,
        });
        self.protocols.push(Protocol::BlockIo);
        self.protocols.push(Protocol::DiskIo);
        self
    }

    pub fn block_size(mut self, block_size: u32) -> Self {
        if let Some(disk) = self.disk.as_mut() {
            disk.block_size = block_size;
            disk.data.resize(block_size as usize * 4, 0);
        }
        self
    }

    pub fn read_error(mut self, status: Status) -> Self {
        if let Some(disk) = self.disk.as_mut() {
            disk.read_error = Some(status);
        }
        self
    }

    /// A mounted filesystem (Simple File System present from the start).
    pub fn volume(mut self, root: MockNode) -> Self {
        self.volume = Some(Rc::new(root));
        self.protocols.push(Protocol::SimpleFileSystem);
        self
    }

    /// Filesystem contents that only appear once a driver is connected.
    pub fn unmounted(mut self, root: MockNode) -> Self {
        self.volume = Some(Rc::new(root));
        self
    }

    pub fn image(mut self, file: &str, spec: ImageSpec) -> Self {
        self.images.push((file.to_string(), spec));
        self
    }

    pub fn held_by(mut self, protocol: Protocol, agent: Handle, attributes: OpenAttributes) -> Self {
        self.holders.push((
            protocol,
            OpenInfo {
                agent,
                controller: None,
                attributes,
                open_count: 1,
            },
        ));
        self
    }

    pub fn open_info_error(mut self, status: Status) -> Self {
        self.open_info_error = Some(status);
        self
    }

    pub fn disconnect_error(mut self, status: Status) -> Self {
        self.disconnect_error = Some(status);
        self
    }

    pub fn sfs_probe_error(mut self, status: Status) -> Self {
        self.sfs_probe_error = Some(status);
        self
    }

    pub fn named(mut self, protocol: Protocol, name: &str) -> Self {
        self.names.push((protocol, name.to_string()));
        self
    }
}

#[derive(Default)]
struct State {
    loaded: Vec<ImageSpec>,
    connected: Vec<Handle>,
    volume_failures: u32,
}

pub struct MockFirmware {
    handles: Vec<HandleEntry>,
    image_device: Option<Handle>,
    connect_error: Option<Status>,
    path_to_text: bool,
    state: RefCell<State>,
    pub journal: Journal,
}

impl MockFirmware {
    pub fn new() -> Self {
        Self {
            handles: vec![HandleEntry::bare().protocol(Protocol::LoadedImage)],
            image_device: None,
            connect_error: None,
            path_to_text: false,
            state: RefCell::new(State::default()),
            journal: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn add(&mut self, entry: HandleEntry) -> Handle {
        self.handles.push(entry);
        self.handles.len() - 1
    }

    pub fn set_image_device(&mut self, handle: Handle) {
        self.image_device = Some(handle);
    }

    pub fn fail_connect(&mut self, status: Status) {
        self.connect_error = Some(status);
    }

    /// Fails the next `count` volume opens with `NOT_READY`.
    pub fn fail_volume_opens(&mut self, count: u32) {
        self.state.borrow_mut().volume_failures = count;
    }

    pub fn enable_path_to_text(&mut self) {
        self.path_to_text = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.journal.borrow().iter().filter(|c| pred(c)).count()
    }

    fn entry(&self, handle: Handle) -> Result<&HandleEntry, Status> {
        self.handles.get(handle).ok_or(Status::INVALID_PARAMETER)
    }

    fn has(&self, handle: Handle, protocol: Protocol) -> bool {
        let Some(entry) = self.handles.get(handle) else {
            return false;
        };
        entry.protocols.contains(&protocol)
            || (protocol == Protocol::SimpleFileSystem
                && entry.volume.is_some()
                && self.state.borrow().connected.contains(&handle))
    }

    fn record(&self, call: Call) {
        self.journal.borrow_mut().push(call);
    }
}

impl Firmware for MockFirmware {
    type Handle = Handle;
    type Block = MockBlock;
    type Dir = MockDir;

    fn image_handle(&self) -> Handle {
        SELF_IMAGE
    }

    fn image_device(&self) -> Result<Handle, Status> {
        self.image_device.ok_or(Status::UNSUPPORTED)
    }

    fn locate_handles(&self, protocol: Protocol) -> Result<Vec<Handle>, Status> {
        let found: Vec<Handle> = (0..self.handles.len())
            .filter(|&h| self.has(h, protocol))
            .collect();
        if found.is_empty() {
            Err(Status::NOT_FOUND)
        } else {
            Ok(found)
        }
    }

    fn device_path(&self, handle: Handle) -> Result<&DevicePath, Status> {
        self.entry(handle)?
            .device_path
            .as_deref()
            .ok_or(Status::UNSUPPORTED)
    }

    fn open_block_device(&self, handle: Handle) -> Result<MockBlock, Status> {
        let disk = self.entry(handle)?.disk.clone().ok_or(Status::UNSUPPORTED)?;
        Ok(MockBlock {
            handle,
            data: disk.data,
            block_size: disk.block_size,
            logical: disk.logical,
            read_error: disk.read_error,
            journal: Rc::clone(&self.journal),
        })
    }

    fn test_protocol(&self, handle: Handle, protocol: Protocol) -> Result<(), Status> {
        let entry = self.entry(handle)?;
        if protocol == Protocol::SimpleFileSystem {
            if let Some(status) = entry.sfs_probe_error {
                return Err(status);
            }
        }
        if self.has(handle, protocol) {
            Ok(())
        } else {
            Err(Status::UNSUPPORTED)
        }
    }

    fn open_protocol_information(
        &self,
        handle: Handle,
        protocol: Protocol,
    ) -> Result<Vec<OpenInfo<Handle>>, Status> {
        let entry = self.entry(handle)?;
        if let Some(status) = entry.open_info_error {
            return Err(status);
        }
        if !self.has(handle, protocol) {
            return Err(Status::NOT_FOUND);
        }
        Ok(entry
            .holders
            .iter()
            .filter(|(p, _)| *p == protocol)
            .map(|(_, info)| *info)
            .collect())
    }

    fn open_volume(&self, handle: Handle) -> Result<MockDir, Status> {
        self.record(Call::OpenVolume(handle));
        if !self.has(handle, Protocol::SimpleFileSystem) {
            return Err(Status::UNSUPPORTED);
        }
        {
            let mut state = self.state.borrow_mut();
            if state.volume_failures > 0 {
                state.volume_failures -= 1;
                return Err(Status::NOT_READY);
            }
        }
        let root = self.entry(handle)?.volume.clone().ok_or(Status::NO_MEDIA)?;
        Ok(MockDir {
            root,
            route: Vec::new(),
            position: 0,
            reads: Rc::new(Cell::new(0)),
        })
    }

    fn load_image(&self, path: &DevicePath) -> Result<Handle, Status> {
        let file_node = path
            .nodes()
            .filter(|n| !n.is_end())
            .last()
            .filter(|n| n.node_type() == node_type::MEDIA && n.sub_type() == sub_type::FILE_PATH)
            .ok_or(Status::INVALID_PARAMETER)?;
        let units: Vec<u16> = file_node
            .payload()
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let file = ucs2_to_string(&units);
        let device_path = path.parent().ok_or(Status::INVALID_PARAMETER)?;
        let device = self.handles.iter().position(|e| {
            e.device_path
                .as_deref()
                .is_some_and(|p| p.as_bytes() == device_path.as_bytes())
        });
        self.record(Call::LoadImage {
            file: file.clone(),
            device,
        });

        let entry = self.entry(device.ok_or(Status::NOT_FOUND)?)?;
        let spec = entry
            .images
            .iter()
            .find(|(name, _)| *name == file)
            .map(|(_, spec)| *spec)
            .ok_or(Status::NOT_FOUND)?;
        let mut state = self.state.borrow_mut();
        state.loaded.push(spec);
        Ok(self.handles.len() + state.loaded.len() - 1)
    }

    fn image_code_type(&self, image: Handle) -> Result<MemoryType, Status> {
        let index = image
            .checked_sub(self.handles.len())
            .ok_or(Status::UNSUPPORTED)?;
        self.state
            .borrow()
            .loaded
            .get(index)
            .map(|spec| spec.code_type)
            .ok_or(Status::INVALID_PARAMETER)
    }

    fn start_image(&self, image: Handle) -> Result<(), Status> {
        self.record(Call::StartImage(image));
        let index = image
            .checked_sub(self.handles.len())
            .ok_or(Status::INVALID_PARAMETER)?;
        let status = self
            .state
            .borrow()
            .loaded
            .get(index)
            .map(|spec| spec.exit_status)
            .ok_or(Status::INVALID_PARAMETER)?;
        status.to_result()
    }

    fn unload_image(&self, image: Handle) -> Result<(), Status> {
        self.record(Call::UnloadImage(image));
        Ok(())
    }

    fn connect_controller(
        &self,
        controller: Handle,
        driver: Option<Handle>,
        recursive: bool,
    ) -> Result<(), Status> {
        self.record(Call::Connect {
            controller,
            driver,
            recursive,
        });
        if let Some(status) = self.connect_error {
            return Err(status);
        }
        self.state.borrow_mut().connected.push(controller);
        Ok(())
    }

    fn disconnect_controller(&self, controller: Handle, driver: Option<Handle>) -> Result<(), Status> {
        self.record(Call::Disconnect { controller, driver });
        match self.entry(controller)?.disconnect_error {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn stall(&self, microseconds: usize) {
        self.record(Call::Stall(microseconds));
    }

    fn wait_for_key(&self) {
        self.record(Call::WaitForKey);
    }

    fn component_name(&self, agent: Handle, protocol: Protocol) -> Option<String> {
        self.handles
            .get(agent)?
            .names
            .iter()
            .find(|(p, _)| *p == protocol)
            .map(|(_, name)| name.clone())
    }

    fn device_path_text(&self, path: &DevicePath) -> Option<String> {
        self.path_to_text
            .then(|| alloc::format!("Path({} nodes)", path.node_count()))
    }
}

/// Boot sector with the NTFS OEM id.
pub fn ntfs_sector() -> Vec<u8> {
    let mut sector = vec![0u8; 512];
    sector[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    sector[3..11].copy_from_slice(b"NTFS    ");
    sector[510] = 0x55;
    sector[511] = 0xAA;
    sector
}

/// Boot sector of a FAT32 volume.
pub fn fat_sector() -> Vec<u8> {
    let mut sector = vec![0u8; 512];
    sector[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
    sector[3..11].copy_from_slice(b"MSDOS5.0");
    sector[82..90].copy_from_slice(b"FAT32   ");
    sector[510] = 0x55;
    sector[511] = 0xAA;
    sector
}

/// PciRoot(0)/Pci(disk,0)/Usb(0,0)
pub fn disk_path(disk: u8) -> DevicePathBuf {
    let mut p = DevicePathBuf::end();
    p.push_node(node_type::ACPI, 0x01, &[0xD0, 0x41, 0x03, 0x0A, 0, 0, 0, 0]);
    p.push_node(node_type::HARDWARE, 0x01, &[0x00, disk]);
    p.push_node(node_type::MESSAGING, 0x05, &[0x00, 0x00]);
    p
}

/// `disk_path(disk)/HD(partition,...)`
pub fn partition_path(disk: u8, partition: u8) -> DevicePathBuf {
    let mut p = disk_path(disk);
    let mut hd = [0u8; 38];
    hd[0] = partition;
    p.push_node(node_type::MEDIA, sub_type::HARD_DRIVE, &hd);
    p
}

/// A USB stick: whole disk, FAT boot partition carrying `driver_file`,
/// NTFS partition holding `ntfs_root` once the driver is connected.
pub struct Stick {
    pub disk: Handle,
    pub boot: Handle,
    pub ntfs: Handle,
}

pub fn usb_stick(fw: &mut MockFirmware, driver_file: &str, ntfs_root: MockNode) -> Stick {
    let disk = fw.add(HandleEntry::new(disk_path(1)).disk(false, &fat_sector()));
    let boot = fw.add(
        HandleEntry::new(partition_path(1, 1))
            .disk(true, &fat_sector())
            .volume(MockNode::root(Vec::new()))
            .image(driver_file, ImageSpec::driver()),
    );
    let ntfs = fw.add(
        HandleEntry::new(partition_path(1, 2))
            .disk(true, &ntfs_sector())
            .unmounted(ntfs_root),
    );
    fw.set_image_device(boot);
    Stick { disk, boot, ntfs }
}
