//! Relay - UEFI NTFS chain loader
//!
//! Runs from the FAT boot partition of a dual-partition stick, brings up
//! the NTFS driver shipped next to it, and hands control to the real boot
//! manager on the sibling NTFS partition.

#![no_std]
#![no_main]

extern crate alloc;

mod console;
mod firmware;
mod uefi;
mod uefi_allocator;

use core::panic::PanicInfo;

use log::{error, info};
use relay_core::config::ARCH;
use relay_core::{Chainloader, RelayConfig, Status};

use crate::firmware::UefiFirmware;
use crate::uefi::{EfiStatus, Handle, SystemTable};

#[no_mangle]
pub extern "efiapi" fn efi_main(image: Handle, st: *mut SystemTable) -> EfiStatus {
    // SAFETY: `st` is the system table the firmware handed us.
    let Some(system) = (unsafe { st.as_ref() }) else {
        return Status::INVALID_PARAMETER.0;
    };
    uefi_allocator::set_boot_services(system.boot_services);
    console::init(system.con_out);

    // SAFETY: boot services are active until we return.
    let Some(fw) = (unsafe { UefiFirmware::new(image, st) }) else {
        return Status::INVALID_PARAMETER.0;
    };

    let (vendor, revision) = fw.firmware_vendor();
    let (major, minor) = fw.uefi_revision();
    console::print(format_args!(
        "\nRelay {} ({}-bit {})\n",
        env!("CARGO_PKG_VERSION"),
        usize::BITS,
        ARCH,
    ));
    info!(
        "Firmware: {} 0x{:08x} (UEFI {}.{})",
        vendor, revision, major, minor / 10
    );

    let config = RelayConfig::default().with_same_device_only(!cfg!(feature = "relaxed-topology"));
    Chainloader::new(&fw, config).run().0
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{}", info);
    loop {
        core::hint::spin_loop();
    }
}
