//! Case-folding path resolution.
//!
//! FAT is case-insensitive, NTFS drivers usually are not. The loader path
//! we are given is all lowercase while the file on the NTFS volume may be
//! `\EFI\Boot\BOOTX64.EFI`. Each segment is looked up in its parent
//! directory ignoring ASCII case and overwritten with the on-disk spelling.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::ops::Range;

use log::debug;

use crate::error::{RelayError, Result};
use crate::firmware::Directory;
use crate::path::{eq_ignore_ascii_case, EfiPath};

/// Rewrites `path` in place to the exact case found under `root`.
///
/// Parents are resolved before children, so each directory is opened with
/// its already-corrected path. On failure `path` keeps the segments fixed
/// so far and is still well formed.
pub fn resolve_path_case<D: Directory>(root: &mut D, path: &mut EfiPath) -> Result<()> {
    if path.is_root() {
        return Ok(());
    }

    let segments: Vec<Range<usize>> = path.segments().collect();
    for range in segments {
        let mut opened;
        let dir = if range.start == 1 {
            &mut *root
        } else {
            opened = root
                .open(path.prefix(&range))
                .map_err(RelayError::firmware("Open(directory)"))?;
            &mut opened
        };

        let name = find_entry(dir, path.segment(range.clone()))?.ok_or_else(|| {
            RelayError::PathNotFound {
                path: path.to_string(),
            }
        })?;
        path.replace_segment(range, &name);
    }

    debug!("Resolved path: {}", path);
    Ok(())
}

/// Scans `dir` from the start for `name`, ignoring ASCII case.
fn find_entry<D: Directory>(dir: &mut D, name: &[u16]) -> Result<Option<Vec<u16>>> {
    dir.set_position(0)
        .map_err(RelayError::firmware("SetPosition"))?;

    while let Some(entry) = dir.read_entry().map_err(RelayError::firmware("Read(directory)"))? {
        // Lengths must match, so names longer than any segment never do.
        if eq_ignore_ascii_case(&entry.name, name) {
            return Ok(Some(entry.name));
        }
    }
    Ok(None)
}
