//! Firmware capabilities ("protocols") the engine asks handles about.

use bitflags::bitflags;
use core::fmt;
use uguid::{guid, Guid};

/// The protocols the chain loader enumerates, opens or probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Raw block access (`EFI_BLOCK_IO_PROTOCOL`).
    BlockIo,
    /// Byte-granular access layered on Block I/O (`EFI_DISK_IO_PROTOCOL`).
    /// Partition and filesystem drivers open this one `BY_DRIVER`.
    DiskIo,
    /// A mounted filesystem (`EFI_SIMPLE_FILE_SYSTEM_PROTOCOL`).
    SimpleFileSystem,
    LoadedImage,
    DevicePath,
    DevicePathToText,
    ComponentName,
    ComponentName2,
}

impl Protocol {
    pub const fn guid(self) -> Guid {
        match self {
            Self::BlockIo => guid!("964e5b21-6459-11d2-8e39-00a0c969723b"),
            Self::DiskIo => guid!("ce345171-ba0b-11d2-8e4f-00a0c969723b"),
            Self::SimpleFileSystem => guid!("964e5b22-6459-11d2-8e39-00a0c969723b"),
            Self::LoadedImage => guid!("5b1b31a1-9562-11d2-8e3f-00a0c969723b"),
            Self::DevicePath => guid!("09576e91-6d3f-11d2-8e39-00a0c969723b"),
            Self::DevicePathToText => guid!("8b843e20-8132-4852-90cc-551a4e4a7f1c"),
            Self::ComponentName => guid!("107a772c-d5e1-11d4-9a46-0090273fc14d"),
            Self::ComponentName2 => guid!("6a7a5cff-e8d9-4f70-bada-75ab3025ce14"),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::BlockIo => "Block I/O",
            Self::DiskIo => "Disk I/O",
            Self::SimpleFileSystem => "Simple File System",
            Self::LoadedImage => "Loaded Image",
            Self::DevicePath => "Device Path",
            Self::DevicePathToText => "Device Path To Text",
            Self::ComponentName => "Component Name",
            Self::ComponentName2 => "Component Name 2",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// `EFI_OPEN_PROTOCOL_*` attributes, as reported by
    /// `OpenProtocolInformation`.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenAttributes: u32 {
        const BY_HANDLE_PROTOCOL = 0x0000_0001;
        const GET_PROTOCOL = 0x0000_0002;
        const TEST_PROTOCOL = 0x0000_0004;
        const BY_CHILD_CONTROLLER = 0x0000_0008;
        const BY_DRIVER = 0x0000_0010;
        const EXCLUSIVE = 0x0000_0020;
    }
}

bitflags! {
    /// `EFI_FILE_*` attribute bits of a directory entry.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileAttributes: u64 {
        const READ_ONLY = 0x0000_0000_0000_0001;
        const HIDDEN = 0x0000_0000_0000_0002;
        const SYSTEM = 0x0000_0000_0000_0004;
        const RESERVED = 0x0000_0000_0000_0008;
        const DIRECTORY = 0x0000_0000_0000_0010;
        const ARCHIVE = 0x0000_0000_0000_0020;
    }
}

/// One opener of a protocol on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInfo<H> {
    /// The image that opened the protocol.
    pub agent: H,
    /// The controller it was opened for, if any.
    pub controller: Option<H>,
    pub attributes: OpenAttributes,
    pub open_count: u32,
}

impl<H> OpenInfo<H> {
    /// Drivers that bind to a controller open its protocols `BY_DRIVER`.
    pub fn is_driver_hold(&self) -> bool {
        self.attributes.contains(OpenAttributes::BY_DRIVER)
    }
}

/// `EFI_MEMORY_TYPE`, as reported in `LoadedImage.ImageCodeType`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryType(pub u32);

impl MemoryType {
    pub const RESERVED: Self = Self(0);
    pub const LOADER_CODE: Self = Self(1);
    pub const LOADER_DATA: Self = Self(2);
    pub const BOOT_SERVICES_CODE: Self = Self(3);
    pub const BOOT_SERVICES_DATA: Self = Self(4);
    pub const RUNTIME_SERVICES_CODE: Self = Self(5);
    pub const RUNTIME_SERVICES_DATA: Self = Self(6);

    pub fn name(self) -> &'static str {
        match self {
            Self::RESERVED => "Reserved",
            Self::LOADER_CODE => "LoaderCode",
            Self::LOADER_DATA => "LoaderData",
            Self::BOOT_SERVICES_CODE => "BootServicesCode",
            Self::BOOT_SERVICES_DATA => "BootServicesData",
            Self::RUNTIME_SERVICES_CODE => "RuntimeServicesCode",
            Self::RUNTIME_SERVICES_DATA => "RuntimeServicesData",
            _ => "Other",
        }
    }
}

impl fmt::Debug for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryType({}, {})", self.0, self.name())
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
