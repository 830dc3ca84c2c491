//! Chain loader configuration.

macro_rules! arch_paths {
    ($arch:literal) => {
        /// UEFI architecture suffix of this build.
        pub const ARCH: &str = $arch;
        /// NTFS driver, on the boot (FAT) partition.
        pub const DRIVER_PATH: &str = concat!("\\efi\\rufus\\ntfs_", $arch, ".efi");
        /// Final boot loader, on the target (NTFS) partition.
        pub const LOADER_PATH: &str = concat!("\\efi\\boot\\boot", $arch, ".efi");
    };
}

#[cfg(target_arch = "x86_64")]
arch_paths!("x64");
#[cfg(target_arch = "x86")]
arch_paths!("ia32");
#[cfg(target_arch = "aarch64")]
arch_paths!("aa64");
#[cfg(target_arch = "arm")]
arch_paths!("arm");
#[cfg(target_arch = "riscv64")]
arch_paths!("riscv64");
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "riscv64"
)))]
compile_error!("unsupported target architecture");

/// Extra attempts at opening the target volume after the first one.
pub const NUM_RETRIES: u32 = 1;

/// Pause between volume open attempts, in microseconds.
pub const RETRY_DELAY_US: usize = 3_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub driver_path: &'static str,
    pub loader_path: &'static str,
    pub volume_open_retries: u32,
    pub retry_delay_us: usize,
    /// Only accept an NTFS partition on the disk we booted from.
    pub same_device_only: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            driver_path: DRIVER_PATH,
            loader_path: LOADER_PATH,
            volume_open_retries: NUM_RETRIES,
            retry_delay_us: RETRY_DELAY_US,
            same_device_only: true,
        }
    }
}

impl RelayConfig {
    pub fn with_same_device_only(mut self, same_device_only: bool) -> Self {
        self.same_device_only = same_device_only;
        self
    }
}
