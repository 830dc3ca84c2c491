//! Device path algebra.
//!
//! A device path is a packed run of variable-length nodes, each starting
//! with a 4-byte header `(type, sub_type, length_le16)`, terminated by an
//! End-Entire node (`0x7F/0xFF`). The partition we booted from and the NTFS
//! partition we are looking for share a parent (the disk) when they live on
//! the same physical device; [`DevicePath::parent`] and [`compare_paths`]
//! are what answers that question.
//!
//! [`DevicePath`] is the borrowed, validated form (firmware-owned paths are
//! wrapped in place). [`DevicePathBuf`] owns a duplicated path and releases
//! it when dropped.

use alloc::borrow::{Borrow, ToOwned};
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::ops::Deref;

use thiserror::Error;

/// Size of a node header.
pub const NODE_HEADER_LEN: usize = 4;

/// Upper bound when walking a firmware-owned path of unknown length.
pub const MAX_DEVICE_PATH_LEN: usize = 64 * 1024;

/// Device path node type constants.
pub mod node_type {
    pub const HARDWARE: u8 = 0x01;
    pub const ACPI: u8 = 0x02;
    pub const MESSAGING: u8 = 0x03;
    pub const MEDIA: u8 = 0x04;
    pub const BIOS_BOOT_SPEC: u8 = 0x05;
    pub const END: u8 = 0x7F;
}

/// Sub-type constants for the node types we build or inspect.
pub mod sub_type {
    /// End This Instance (only meaningful with `node_type::END`).
    pub const END_INSTANCE: u8 = 0x01;
    /// End Entire Device Path (only meaningful with `node_type::END`).
    pub const END_ENTIRE: u8 = 0xFF;
    /// Media / Hard Drive (partition).
    pub const HARD_DRIVE: u8 = 0x01;
    /// Media / File Path.
    pub const FILE_PATH: u8 = 0x04;
}

const END_ENTIRE_NODE: [u8; NODE_HEADER_LEN] =
    [node_type::END, sub_type::END_ENTIRE, NODE_HEADER_LEN as u8, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DevicePathError {
    #[error("device path node at offset {offset} is truncated")]
    Truncated { offset: usize },
    #[error("device path node at offset {offset} declares invalid length {length}")]
    BadNodeLength { offset: usize, length: u16 },
    #[error("device path has no end node")]
    MissingEnd,
    #[error("device path pointer is null")]
    Null,
}

/// A single node of a device path, header included.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Node<'a> {
    bytes: &'a [u8],
}

impl<'a> Node<'a> {
    pub fn node_type(&self) -> u8 {
        self.bytes[0]
    }

    pub fn sub_type(&self) -> u8 {
        self.bytes[1]
    }

    /// Declared length, header included.
    pub fn length(&self) -> u16 {
        u16::from_le_bytes([self.bytes[2], self.bytes[3]])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[NODE_HEADER_LEN..]
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn is_end(&self) -> bool {
        self.node_type() == node_type::END && self.sub_type() == sub_type::END_ENTIRE
    }

    /// Orders by `(type, sub_type, length, raw bytes)`.
    fn structural_cmp(&self, other: &Node<'_>) -> Ordering {
        self.node_type()
            .cmp(&other.node_type())
            .then(self.sub_type().cmp(&other.sub_type()))
            .then(self.length().cmp(&other.length()))
            .then_with(|| self.bytes.cmp(other.bytes))
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ty: {:#04x}, sub_type: {:#04x}, len: {}}}",
            self.node_type(),
            self.sub_type(),
            self.length()
        )
    }
}

/// Iterator over the nodes of a path, terminal node included.
pub struct Nodes<'a> {
    rest: &'a [u8],
    done: bool,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.rest.len() < NODE_HEADER_LEN {
            return None;
        }
        let len = u16::from_le_bytes([self.rest[2], self.rest[3]]) as usize;
        let (bytes, rest) = self.rest.split_at(len);
        let node = Node { bytes };
        self.done = node.is_end();
        self.rest = rest;
        Some(node)
    }
}

/// Walks `bytes` and returns the length of the well-formed path it starts
/// with, terminal node included.
fn validated_len(bytes: &[u8]) -> Result<usize, DevicePathError> {
    let mut offset = 0;
    loop {
        let header = bytes
            .get(offset..offset + NODE_HEADER_LEN)
            .ok_or(DevicePathError::Truncated { offset })?;
        let length = u16::from_le_bytes([header[2], header[3]]);
        let len = length as usize;
        let is_end = header[0] == node_type::END && header[1] == sub_type::END_ENTIRE;

        if len < NODE_HEADER_LEN || (is_end && len != NODE_HEADER_LEN) {
            return Err(DevicePathError::BadNodeLength { offset, length });
        }
        if offset + len > bytes.len() {
            return Err(DevicePathError::Truncated { offset });
        }

        offset += len;
        if is_end {
            return Ok(offset);
        }
        if offset >= MAX_DEVICE_PATH_LEN {
            return Err(DevicePathError::MissingEnd);
        }
    }
}

/// A borrowed, well-formed device path.
///
/// Always ends with exactly one End-Entire node; bytes after it are not part
/// of the path.
#[repr(transparent)]
pub struct DevicePath {
    bytes: [u8],
}

impl DevicePath {
    /// Validates `bytes` and borrows the path it starts with.
    pub fn new(bytes: &[u8]) -> Result<&Self, DevicePathError> {
        let len = validated_len(bytes)?;
        Ok(Self::from_validated(&bytes[..len]))
    }

    /// Wraps a firmware-owned device path in place.
    ///
    /// # Safety
    /// `ptr` must be null or point at a device path that stays mapped and
    /// unmodified for `'a`. Node headers are read one at a time, so the walk
    /// never reads past the first End-Entire node.
    pub unsafe fn from_ptr<'a>(ptr: *const u8) -> Result<&'a Self, DevicePathError> {
        if ptr.is_null() {
            return Err(DevicePathError::Null);
        }
        let mut offset = 0usize;
        loop {
            let header = core::slice::from_raw_parts(ptr.add(offset), NODE_HEADER_LEN);
            let length = u16::from_le_bytes([header[2], header[3]]);
            if (length as usize) < NODE_HEADER_LEN {
                return Err(DevicePathError::BadNodeLength { offset, length });
            }
            let is_end = header[0] == node_type::END && header[1] == sub_type::END_ENTIRE;
            offset += length as usize;
            if is_end {
                break;
            }
            if offset >= MAX_DEVICE_PATH_LEN {
                return Err(DevicePathError::MissingEnd);
            }
        }
        Self::new(core::slice::from_raw_parts(ptr, offset))
    }

    fn from_validated(bytes: &[u8]) -> &Self {
        // SAFETY: `DevicePath` is a `repr(transparent)` wrapper around `[u8]`.
        unsafe { &*(bytes as *const [u8] as *const DevicePath) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            rest: &self.bytes,
            done: false,
        }
    }

    /// Number of nodes before the terminal node.
    pub fn node_count(&self) -> usize {
        self.nodes().filter(|n| !n.is_end()).count()
    }

    /// `true` if the path holds nothing but the terminal node.
    pub fn is_empty(&self) -> bool {
        self.bytes.len() == NODE_HEADER_LEN
    }

    /// The path one level up the device hierarchy.
    ///
    /// Duplicates the path, then turns its last non-terminal node into the
    /// terminal node. Returns `None` for a path with no non-terminal node.
    pub fn parent(&self) -> Option<DevicePathBuf> {
        let last = self
            .nodes()
            .take_while(|n| !n.is_end())
            .fold(None, |_, n| Some(n.as_bytes().as_ptr() as usize))?;
        let offset = last - self.bytes.as_ptr() as usize;

        let mut dup = self.to_owned();
        dup.bytes[offset..offset + NODE_HEADER_LEN].copy_from_slice(&END_ENTIRE_NODE);
        dup.bytes.truncate(offset + NODE_HEADER_LEN);
        Some(dup)
    }

    /// Appends a Media/File-Path node for `file` (UCS-2, no terminator).
    ///
    /// Produces the locator `LoadImage` needs for a file on this device.
    pub fn with_file_path(&self, file: &[u16]) -> DevicePathBuf {
        let node_len = NODE_HEADER_LEN + (file.len() + 1) * 2;
        let body = self.bytes.len() - NODE_HEADER_LEN;

        let mut bytes = Vec::with_capacity(body + node_len + NODE_HEADER_LEN);
        bytes.extend_from_slice(&self.bytes[..body]);
        bytes.extend_from_slice(&[node_type::MEDIA, sub_type::FILE_PATH]);
        bytes.extend_from_slice(&(node_len as u16).to_le_bytes());
        for unit in file.iter().copied().chain(core::iter::once(0)) {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.extend_from_slice(&END_ENTIRE_NODE);
        DevicePathBuf { bytes }
    }

    /// Hex dump of every non-terminal node, for firmware without a
    /// DevicePathToText protocol.
    pub fn to_hex(&self) -> String {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let body = &self.bytes[..self.bytes.len() - NODE_HEADER_LEN];
        let mut out = String::with_capacity(body.len() * 2);
        for b in body {
            out.push(DIGITS[(b >> 4) as usize] as char);
            out.push(DIGITS[(b & 0xF) as usize] as char);
        }
        out
    }
}

impl ToOwned for DevicePath {
    type Owned = DevicePathBuf;

    fn to_owned(&self) -> DevicePathBuf {
        DevicePathBuf {
            bytes: self.bytes.to_vec(),
        }
    }
}

impl fmt::Debug for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes()).finish()
    }
}

/// An owned, well-formed device path.
#[derive(Clone)]
pub struct DevicePathBuf {
    bytes: Vec<u8>,
}

impl DevicePathBuf {
    /// Validates and takes ownership of `bytes`.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Result<Self, DevicePathError> {
        let len = validated_len(&bytes)?;
        bytes.truncate(len);
        Ok(Self { bytes })
    }

    /// A path holding only the terminal node.
    pub fn end() -> Self {
        Self {
            bytes: END_ENTIRE_NODE.to_vec(),
        }
    }

    /// Appends a node built from its parts.
    pub fn push_node(&mut self, ty: u8, sub: u8, payload: &[u8]) {
        let end = self.bytes.len() - NODE_HEADER_LEN;
        self.bytes.truncate(end);
        let len = (NODE_HEADER_LEN + payload.len()) as u16;
        self.bytes.extend_from_slice(&[ty, sub]);
        self.bytes.extend_from_slice(&len.to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self.bytes.extend_from_slice(&END_ENTIRE_NODE);
    }
}

impl Deref for DevicePathBuf {
    type Target = DevicePath;

    fn deref(&self) -> &DevicePath {
        DevicePath::from_validated(&self.bytes)
    }
}

impl Borrow<DevicePath> for DevicePathBuf {
    fn borrow(&self) -> &DevicePath {
        self
    }
}

impl AsRef<DevicePath> for DevicePathBuf {
    fn as_ref(&self) -> &DevicePath {
        self
    }
}

impl fmt::Debug for DevicePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Structural comparison of two device paths.
///
/// Walks both paths node by node until the terminal node. A missing path on
/// either side never compares equal, so the result is `None`.
pub fn compare_paths(a: Option<&DevicePath>, b: Option<&DevicePath>) -> Option<Ordering> {
    let (a, b) = (a?, b?);
    for (na, nb) in a.nodes().zip(b.nodes()) {
        match na.structural_cmp(&nb) {
            Ordering::Equal if na.is_end() => return Some(Ordering::Equal),
            Ordering::Equal => {}
            other => return Some(other),
        }
    }
    // Both paths are validated, so the terminal nodes always meet above.
    Some(a.as_bytes().cmp(b.as_bytes()))
}

/// `true` only if both paths exist and are structurally identical.
pub fn paths_equal(a: Option<&DevicePath>, b: Option<&DevicePath>) -> bool {
    compare_paths(a, b) == Some(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// PciRoot(0)/Pci(1,1)/Usb(0,0)/HD(n,...)
    fn usb_partition(n: u8) -> DevicePathBuf {
        let mut p = DevicePathBuf::end();
        p.push_node(node_type::ACPI, 0x01, &[0xD0, 0x41, 0x03, 0x0A, 0, 0, 0, 0]);
        p.push_node(node_type::HARDWARE, 0x01, &[0x01, 0x01]);
        p.push_node(node_type::MESSAGING, 0x05, &[0x00, 0x00]);
        p.push_node(node_type::MEDIA, sub_type::HARD_DRIVE, &[n; 38]);
        p
    }

    #[test]
    fn test_compare_identical_paths() {
        let p = usb_partition(1);
        assert_eq!(compare_paths(Some(&p), Some(&p)), Some(Ordering::Equal));
        assert!(paths_equal(Some(&p), Some(&usb_partition(1))));
    }

    #[test]
    fn test_compare_missing_path_is_never_equal() {
        let p = usb_partition(1);
        assert_eq!(compare_paths(None, Some(&p)), None);
        assert_eq!(compare_paths(Some(&p), None), None);
        assert_eq!(compare_paths(None, None), None);
        assert!(!paths_equal(None, None));
    }

    #[test]
    fn test_compare_different_partitions() {
        let a = usb_partition(1);
        let b = usb_partition(2);
        assert_eq!(compare_paths(Some(&a), Some(&b)), Some(Ordering::Less));
        assert_eq!(compare_paths(Some(&b), Some(&a)), Some(Ordering::Greater));
    }

    #[test]
    fn test_compare_orders_type_before_length() {
        let mut a = DevicePathBuf::end();
        a.push_node(node_type::HARDWARE, 0x01, &[0; 8]);
        let mut b = DevicePathBuf::end();
        b.push_node(node_type::ACPI, 0x01, &[0; 2]);
        assert_eq!(compare_paths(Some(&a), Some(&b)), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_prefix_path_differs() {
        let full = usb_partition(1);
        let parent = full.parent().unwrap();
        assert!(!paths_equal(Some(&full), Some(&parent)));
    }

    #[test]
    fn test_parent_drops_one_node() {
        let p = usb_partition(3);
        let parent = p.parent().unwrap();
        assert_eq!(p.node_count(), 4);
        assert_eq!(parent.node_count(), 3);
        assert!(parent.nodes().last().unwrap().is_end());
        assert_eq!(
            parent.as_bytes().len(),
            p.as_bytes().len() - (NODE_HEADER_LEN + 38)
        );
    }

    #[test]
    fn test_parent_of_siblings_match() {
        let a = usb_partition(1).parent().unwrap();
        let b = usb_partition(2).parent().unwrap();
        assert!(paths_equal(Some(&a), Some(&b)));
        assert!(paths_equal(Some(&a), Some(&a)));
    }

    #[test]
    fn test_parent_of_empty_path() {
        assert!(DevicePathBuf::end().parent().is_none());
        let mut single = DevicePathBuf::end();
        single.push_node(node_type::HARDWARE, 0x01, &[1, 2]);
        let parent = single.parent().unwrap();
        assert!(parent.is_empty());
        assert!(parent.parent().is_none());
    }

    #[test]
    fn test_new_rejects_malformed() {
        assert_eq!(
            DevicePath::new(&[0x01, 0x01, 0x06]).unwrap_err(),
            DevicePathError::Truncated { offset: 0 }
        );
        assert_eq!(
            DevicePath::new(&[0x01, 0x01, 0x02, 0x00]).unwrap_err(),
            DevicePathError::BadNodeLength { offset: 0, length: 2 }
        );
        assert_eq!(
            DevicePath::new(&[0x01, 0x01, 0x08, 0x00, 0, 0]).unwrap_err(),
            DevicePathError::Truncated { offset: 0 }
        );
        assert_eq!(
            DevicePath::new(&[0x01, 0x01, 0x04, 0x00]).unwrap_err(),
            DevicePathError::Truncated { offset: 4 }
        );
    }

    #[test]
    fn test_new_stops_at_end_node() {
        let p = usb_partition(1);
        let mut bytes = p.as_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA; 16]);
        let parsed = DevicePath::new(&bytes).unwrap();
        assert_eq!(parsed.as_bytes(), p.as_bytes());
    }

    #[test]
    fn test_from_ptr_walks_to_end() {
        let p = usb_partition(7);
        let wrapped = unsafe { DevicePath::from_ptr(p.as_ptr()) }.unwrap();
        assert!(paths_equal(Some(wrapped), Some(&p)));
        assert_eq!(
            unsafe { DevicePath::from_ptr(core::ptr::null()) }.unwrap_err(),
            DevicePathError::Null
        );
    }

    #[test]
    fn test_with_file_path() {
        let dev = usb_partition(1);
        let file: Vec<u16> = "\\a.efi".encode_utf16().collect();
        let full = dev.with_file_path(&file);
        assert_eq!(full.node_count(), 5);

        let node = full.nodes().nth(4).unwrap();
        assert_eq!(node.node_type(), node_type::MEDIA);
        assert_eq!(node.sub_type(), sub_type::FILE_PATH);
        assert_eq!(node.length() as usize, NODE_HEADER_LEN + 7 * 2);
        assert_eq!(&node.payload()[..4], &[b'\\', 0, b'a', 0]);
        assert_eq!(&node.payload()[12..], &[0, 0]);

        let parent = full.parent().unwrap();
        assert!(paths_equal(Some(&parent), Some(&dev)));
    }

    #[test]
    fn test_to_hex() {
        let mut p = DevicePathBuf::end();
        p.push_node(node_type::HARDWARE, 0x01, &[0xAB, 0x0F]);
        assert_eq!(p.to_hex(), "01010600AB0F");
        assert_eq!(DevicePathBuf::end().to_hex(), "");
    }
}
