//! Relay core - boot-device resolution and chain-load engine
//!
//! Everything that needs a decision lives here: device path algebra,
//! NTFS partition discovery, driver activation and blocking-driver
//! remediation, case-folding path resolution and the orchestrator that
//! strings them together.
//!
//! The engine talks to firmware only through [`firmware::Firmware`], so the
//! whole chain-load sequence runs against a scripted mock on the host. The
//! `relay-bootloader` crate provides the real UEFI implementation.
//!
//! ```text
//! handles ──► device paths ──► partition handle ──► volume ──► exact path ──► loader
//!   (discovery)   (device_path)      (driver)        (resolver)   (orchestrator)
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod device_path;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod firmware;
pub mod orchestrator;
pub mod path;
pub mod protocol;
pub mod resolver;
pub mod status;

#[cfg(test)]
pub(crate) mod mock;

pub use config::RelayConfig;
pub use device_path::{DevicePath, DevicePathBuf};
pub use error::{RelayError, Result};
pub use firmware::Firmware;
pub use orchestrator::{Chainloader, Outcome, Stage};
pub use path::EfiPath;
pub use status::Status;
