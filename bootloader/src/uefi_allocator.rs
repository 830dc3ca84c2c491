//! Pool Global Allocator
//!
//! Backs `alloc` with UEFI's allocate_pool/free_pool. The chain loader
//! never calls ExitBootServices, so boot services stay valid for the whole
//! run; allocations made before `set_boot_services` fail with null.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::uefi::BootServices;

/// UEFI Boot Services pointer - set by efi_main
static BOOT_SERVICES: AtomicPtr<BootServices> = AtomicPtr::new(ptr::null_mut());

/// EFI_LOADER_DATA memory type
const EFI_LOADER_DATA: u32 = 2;

/// Alignment allocate_pool guarantees
const POOL_ALIGN: usize = 8;

/// Set the boot services pointer (call once at start of efi_main)
pub fn set_boot_services(bs: *mut BootServices) {
    BOOT_SERVICES.store(bs, Ordering::SeqCst);
}

/// Boot services, once `set_boot_services` has run.
pub fn boot_services() -> Option<&'static BootServices> {
    let bs = BOOT_SERVICES.load(Ordering::SeqCst);
    // SAFETY: only ever set from the system table handed to efi_main, which
    // stays valid while boot services are active.
    unsafe { bs.as_ref() }
}

pub struct PoolAllocator;

unsafe impl GlobalAlloc for PoolAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let Some(bs) = boot_services() else {
            return ptr::null_mut();
        };
        let align = layout.align();
        let size = layout.size();

        if align <= POOL_ALIGN {
            let mut buffer: *mut u8 = ptr::null_mut();
            let status = (bs.allocate_pool)(EFI_LOADER_DATA, size, &mut buffer);
            if status == 0 {
                buffer
            } else {
                ptr::null_mut()
            }
        } else {
            // Over-allocate and stash the pool pointer just below the
            // aligned block.
            let total_size = size + align + core::mem::size_of::<usize>();
            let mut buffer: *mut u8 = ptr::null_mut();
            let status = (bs.allocate_pool)(EFI_LOADER_DATA, total_size, &mut buffer);
            if status != 0 {
                return ptr::null_mut();
            }

            let raw_addr = buffer as usize;
            let aligned_addr = (raw_addr + core::mem::size_of::<usize>() + align - 1) & !(align - 1);
            let original_ptr_location = (aligned_addr - core::mem::size_of::<usize>()) as *mut usize;
            original_ptr_location.write_unaligned(raw_addr);

            aligned_addr as *mut u8
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ptr.is_null() {
            return;
        }
        let Some(bs) = boot_services() else {
            return;
        };

        if layout.align() <= POOL_ALIGN {
            let _ = (bs.free_pool)(ptr);
        } else {
            let original_ptr_location = (ptr as usize - core::mem::size_of::<usize>()) as *const usize;
            let original_ptr = original_ptr_location.read_unaligned() as *mut u8;
            let _ = (bs.free_pool)(original_ptr);
        }
    }
}

#[global_allocator]
static ALLOCATOR: PoolAllocator = PoolAllocator;
