//! Safe wrappers for platform-specific unsafe operations.
//!
//! Every `unsafe` block in the codebase lives here. Call sites use the safe
//! public API and never touch `unsafe` directly.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

fn to_cstring(path: &Path) -> Option<CString> {
    CString::new(path.as_os_str().as_bytes()).ok()
}

/// Return available disk space in megabytes for the filesystem containing `path`.
///
/// Returns `None` if the `statvfs` call fails (e.g. path does not exist).
pub fn available_disk_mb(path: &Path) -> Option<u64> {
    let c_path = to_cstring(path)?;
    // SAFETY: statvfs is a standard POSIX call; we pass a valid CStr and a
    // zeroed struct, then check the return value before reading fields.
    unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return None;
        }
        #[allow(clippy::unnecessary_cast)]
        Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64) / (1024 * 1024))
    }
}

/// Whether the calling process may create files inside `dir`.
///
/// Uses `access(W_OK | X_OK)`, which honours the real uid and ACLs.
pub fn is_writable_dir(dir: &Path) -> bool {
    let Some(c_path) = to_cstring(dir) else {
        return false;
    };
    // SAFETY: access is a read-only POSIX call taking a valid C string.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK | libc::X_OK) == 0 }
}
