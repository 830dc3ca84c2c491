//! Absolute UCS-2 file paths, as firmware filesystems take them.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use crate::error::{RelayError, Result};

/// Longest path or entry name, in code units, terminator included.
pub const PATH_MAX: usize = 512;

pub const SEPARATOR: u16 = b'\\' as u16;

/// An absolute, backslash-delimited UCS-2 path.
///
/// Held without its NUL terminator; [`EfiPath::to_nul_terminated`] adds it
/// at the firmware boundary. Separators are fixed once the path is built,
/// only segment contents may be rewritten.
#[derive(Clone, PartialEq, Eq)]
pub struct EfiPath {
    units: Vec<u16>,
}

impl EfiPath {
    /// Builds a path from UCS-2 code units.
    ///
    /// Must start with `\`. Empty segments (`\\`, trailing `\`) are rejected
    /// except for the root path itself.
    pub fn from_units(units: &[u16]) -> Result<Self> {
        if units.len() >= PATH_MAX {
            return Err(RelayError::PathTooLong { max: PATH_MAX });
        }
        if units.first() != Some(&SEPARATOR) {
            return Err(RelayError::InvalidPath);
        }
        if units.contains(&0) {
            return Err(RelayError::InvalidPath);
        }
        let path = Self {
            units: units.to_vec(),
        };
        if !path.is_root() && path.segments().any(|r| r.is_empty()) {
            return Err(RelayError::InvalidPath);
        }
        Ok(path)
    }

    pub fn root() -> Self {
        Self {
            units: alloc::vec![SEPARATOR],
        }
    }

    pub fn is_root(&self) -> bool {
        self.units.len() == 1
    }

    pub fn as_units(&self) -> &[u16] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Code unit ranges of each segment, left to right.
    pub fn segments(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let starts = self
            .units
            .iter()
            .enumerate()
            .filter(|(_, &u)| u == SEPARATOR)
            .map(|(i, _)| i + 1);
        starts.map(move |start| {
            let end = self.units[start..]
                .iter()
                .position(|&u| u == SEPARATOR)
                .map_or(self.units.len(), |p| start + p);
            start..end
        })
    }

    pub fn segment(&self, range: Range<usize>) -> &[u16] {
        &self.units[range]
    }

    /// The prefix up to, not including, the separator before `range`.
    ///
    /// Returns the root path for a first-level segment.
    pub fn prefix(&self, range: &Range<usize>) -> &[u16] {
        match range.start {
            0 | 1 => &self.units[..1],
            start => &self.units[..start - 1],
        }
    }

    /// Overwrites a segment with a name of the same length.
    pub fn replace_segment(&mut self, range: Range<usize>, name: &[u16]) {
        self.units[range].copy_from_slice(name);
    }

    pub fn to_nul_terminated(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.units.len() + 1);
        out.extend_from_slice(&self.units);
        out.push(0);
        out
    }
}

impl core::str::FromStr for EfiPath {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        let units: Vec<u16> = s.encode_utf16().collect();
        Self::from_units(&units)
    }
}

impl fmt::Display for EfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.units.iter().copied()) {
            fmt::Write::write_char(f, c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for EfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EfiPath(\"{}\")", self)
    }
}

/// Folds `A-Z` to `a-z`; every other code unit is left alone.
#[inline]
pub fn ascii_fold(unit: u16) -> u16 {
    if (b'A' as u16..=b'Z' as u16).contains(&unit) {
        unit + (b'a' - b'A') as u16
    } else {
        unit
    }
}

/// ASCII-only case-insensitive comparison of two UCS-2 names.
pub fn eq_ignore_ascii_case(a: &[u16], b: &[u16]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| ascii_fold(x) == ascii_fold(y))
}

/// Lossy UCS-2 to `String`, for log lines.
pub fn ucs2_to_string(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    char::decode_utf16(units[..end].iter().copied())
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn u(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_parse_and_segments() {
        let p: EfiPath = "\\efi\\boot\\bootx64.efi".parse().unwrap();
        let segs: Vec<_> = p.segments().map(|r| p.segment(r).to_vec()).collect();
        assert_eq!(segs, [u("efi"), u("boot"), u("bootx64.efi")]);
        assert_eq!(p.to_string(), "\\efi\\boot\\bootx64.efi");
        assert_eq!(p.to_nul_terminated().last(), Some(&0));
    }

    #[test]
    fn test_root_path() {
        let p: EfiPath = "\\".parse().unwrap();
        assert!(p.is_root());
        assert_eq!(p, EfiPath::root());
    }

    #[test]
    fn test_rejects_relative_and_empty_segments() {
        assert_eq!("efi\\boot".parse::<EfiPath>(), Err(RelayError::InvalidPath));
        assert_eq!("".parse::<EfiPath>(), Err(RelayError::InvalidPath));
        assert_eq!("\\efi\\\\boot".parse::<EfiPath>(), Err(RelayError::InvalidPath));
        assert_eq!("\\efi\\".parse::<EfiPath>(), Err(RelayError::InvalidPath));
    }

    #[test]
    fn test_rejects_overlong_path() {
        let mut s = String::from("\\");
        s.push_str(&"a".repeat(PATH_MAX));
        assert_eq!(
            s.parse::<EfiPath>(),
            Err(RelayError::PathTooLong { max: PATH_MAX })
        );
    }

    #[test]
    fn test_prefix() {
        let p: EfiPath = "\\efi\\rufus\\ntfs_x64.efi".parse().unwrap();
        let ranges: Vec<_> = p.segments().collect();
        assert_eq!(p.prefix(&ranges[0]), u("\\").as_slice());
        assert_eq!(p.prefix(&ranges[1]), u("\\efi").as_slice());
        assert_eq!(p.prefix(&ranges[2]), u("\\efi\\rufus").as_slice());
    }

    #[test]
    fn test_ascii_fold_only() {
        assert!(eq_ignore_ascii_case(&u("BOOTX64.EFI"), &u("bootx64.efi")));
        assert!(!eq_ignore_ascii_case(&u("boot"), &u("boot2")));
        // Latin-1 letters are not folded.
        assert!(!eq_ignore_ascii_case(&u("É"), &u("é")));
        assert_eq!(ascii_fold(b'[' as u16), b'[' as u16);
        assert_eq!(ascii_fold(b'@' as u16), b'@' as u16);
    }

    #[test]
    fn test_ucs2_to_string_stops_at_nul() {
        let mut v = u("ntfs");
        v.push(0);
        v.extend(u("junk"));
        assert_eq!(ucs2_to_string(&v), "ntfs");
    }
}
