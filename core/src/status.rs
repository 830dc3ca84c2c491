//! Firmware status codes.
//!
//! [`Status`] mirrors `EFI_STATUS`: zero is success, the high bit marks an
//! error, anything else is a warning. Every boundary call in
//! [`Firmware`](crate::firmware::Firmware) reports one of these.

use core::fmt;

/// The high bit of `usize`, set on every error code.
const ERROR_BIT: usize = 1 << (usize::BITS - 1);

/// A firmware status code.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub usize);

impl Status {
    pub const SUCCESS: Self = Self(0);

    pub const WARN_UNKNOWN_GLYPH: Self = Self(1);
    pub const WARN_BUFFER_TOO_SMALL: Self = Self(4);

    pub const LOAD_ERROR: Self = Self(ERROR_BIT | 1);
    pub const INVALID_PARAMETER: Self = Self(ERROR_BIT | 2);
    pub const UNSUPPORTED: Self = Self(ERROR_BIT | 3);
    pub const BAD_BUFFER_SIZE: Self = Self(ERROR_BIT | 4);
    pub const BUFFER_TOO_SMALL: Self = Self(ERROR_BIT | 5);
    pub const NOT_READY: Self = Self(ERROR_BIT | 6);
    pub const DEVICE_ERROR: Self = Self(ERROR_BIT | 7);
    pub const WRITE_PROTECTED: Self = Self(ERROR_BIT | 8);
    pub const OUT_OF_RESOURCES: Self = Self(ERROR_BIT | 9);
    pub const VOLUME_CORRUPTED: Self = Self(ERROR_BIT | 0x0a);
    pub const VOLUME_FULL: Self = Self(ERROR_BIT | 0x0b);
    pub const NO_MEDIA: Self = Self(ERROR_BIT | 0x0c);
    pub const MEDIA_CHANGED: Self = Self(ERROR_BIT | 0x0d);
    pub const NOT_FOUND: Self = Self(ERROR_BIT | 0x0e);
    pub const ACCESS_DENIED: Self = Self(ERROR_BIT | 0x0f);
    pub const NO_MAPPING: Self = Self(ERROR_BIT | 0x11);
    pub const TIMEOUT: Self = Self(ERROR_BIT | 0x12);
    pub const NOT_STARTED: Self = Self(ERROR_BIT | 0x13);
    pub const ALREADY_STARTED: Self = Self(ERROR_BIT | 0x14);
    pub const ABORTED: Self = Self(ERROR_BIT | 0x15);
    pub const INCOMPATIBLE_VERSION: Self = Self(ERROR_BIT | 0x19);
    pub const SECURITY_VIOLATION: Self = Self(ERROR_BIT | 0x1a);
    pub const END_OF_FILE: Self = Self(ERROR_BIT | 0x1f);

    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 & ERROR_BIT != 0
    }

    #[inline]
    pub const fn is_warning(self) -> bool {
        self.0 != 0 && !self.is_error()
    }

    /// Warnings count as success, the firmware already did the work.
    #[inline]
    pub fn to_result(self) -> Result<(), Status> {
        if self.is_error() {
            Err(self)
        } else {
            Ok(())
        }
    }

    /// The code with the error bit stripped, as shown in diagnostics.
    #[inline]
    pub const fn code(self) -> usize {
        self.0 & 0x7FFF_FFFF
    }

    /// Human readable name, matching the firmware's `%r` formatting.
    pub fn name(self) -> &'static str {
        match self {
            Self::SUCCESS => "Success",
            Self::WARN_UNKNOWN_GLYPH => "Warning Unknown Glyph",
            Self::WARN_BUFFER_TOO_SMALL => "Warning Buffer Too Small",
            Self::LOAD_ERROR => "Load Error",
            Self::INVALID_PARAMETER => "Invalid Parameter",
            Self::UNSUPPORTED => "Unsupported",
            Self::BAD_BUFFER_SIZE => "Bad Buffer Size",
            Self::BUFFER_TOO_SMALL => "Buffer Too Small",
            Self::NOT_READY => "Not Ready",
            Self::DEVICE_ERROR => "Device Error",
            Self::WRITE_PROTECTED => "Write Protected",
            Self::OUT_OF_RESOURCES => "Out of Resources",
            Self::VOLUME_CORRUPTED => "Volume Corrupt",
            Self::VOLUME_FULL => "Volume Full",
            Self::NO_MEDIA => "No Media",
            Self::MEDIA_CHANGED => "Media changed",
            Self::NOT_FOUND => "Not Found",
            Self::ACCESS_DENIED => "Access Denied",
            Self::NO_MAPPING => "No mapping",
            Self::TIMEOUT => "Time out",
            Self::NOT_STARTED => "Not started",
            Self::ALREADY_STARTED => "Already started",
            Self::ABORTED => "Aborted",
            Self::INCOMPATIBLE_VERSION => "Incompatible Version",
            Self::SECURITY_VIOLATION => "Security Violation",
            Self::END_OF_FILE => "End of File",
            _ if self.is_error() => "Unknown Error",
            _ => "Unknown Warning",
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({:#x}, {})", self.0, self.name())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
