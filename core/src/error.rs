//! Error type for the chain-load engine.

use alloc::string::String;

use thiserror::Error;

use crate::device_path::DevicePathError;
use crate::protocol::MemoryType;
use crate::status::Status;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// A firmware call failed; `op` names the operation.
    #[error("{op} failed: {status} ({code})", code = .status.code())]
    Firmware { op: &'static str, status: Status },

    #[error("could not locate driver '{path}' on any filesystem")]
    DriverNotFound { path: String },

    #[error("could not locate an NTFS partition on the boot device")]
    PartitionNotFound,

    #[error("'{path}' does not exist on the target volume")]
    PathNotFound { path: String },

    #[error("invalid path")]
    InvalidPath,

    #[error("path or file name exceeds {max} characters")]
    PathTooLong { max: usize },

    #[error("driver image is of type {0}, expected BootServicesCode")]
    WrongImageType(MemoryType),

    #[error("malformed device path: {0}")]
    DevicePath(#[from] DevicePathError),
}

impl RelayError {
    /// Tags a firmware status with the operation that produced it.
    pub fn firmware(op: &'static str) -> impl FnOnce(Status) -> Self {
        move |status| Self::Firmware { op, status }
    }

    /// The firmware status this error is reported as on exit.
    pub fn status(&self) -> Status {
        match self {
            Self::Firmware { status, .. } => *status,
            Self::DriverNotFound { .. } | Self::PartitionNotFound | Self::PathNotFound { .. } => {
                Status::NOT_FOUND
            }
            Self::InvalidPath | Self::DevicePath(_) => Status::INVALID_PARAMETER,
            Self::PathTooLong { .. } => Status::BAD_BUFFER_SIZE,
            Self::WrongImageType(_) => Status::LOAD_ERROR,
        }
    }
}

pub type Result<T> = core::result::Result<T, RelayError>;
