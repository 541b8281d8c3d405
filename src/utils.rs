//! File and path helpers shared by the download engine

use crate::config::FileCollisionAction;
use crate::error::{DownloadError, Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Where a download should be written, after applying the collision policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Write to this path (possibly replacing an existing file)
    Write(PathBuf),
    /// Leave the existing file alone
    Skip(PathBuf),
}

/// Apply `action` to the desired output `path`
///
/// ```
/// use zenodo_dl::utils::{resolve_destination, Destination};
/// use zenodo_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/nonexistent/dir/data.csv");
/// let dest = resolve_destination(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(dest, Destination::Write(path.to_path_buf()));
/// ```
pub fn resolve_destination(path: &Path, action: FileCollisionAction) -> Result<Destination> {
    if !path.exists() {
        return Ok(Destination::Write(path.to_path_buf()));
    }

    match action {
        FileCollisionAction::Overwrite => Ok(Destination::Write(path.to_path_buf())),
        FileCollisionAction::Skip => Ok(Destination::Skip(path.to_path_buf())),
        FileCollisionAction::Rename => {
            let invalid = |reason: &str| {
                Error::Download(DownloadError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: reason.to_string(),
                })
            };
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| invalid("cannot extract file stem"))?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path
                .parent()
                .ok_or_else(|| invalid("cannot extract parent directory"))?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let candidate = match extension {
                    Some(ext) => parent.join(format!("{} ({}).{}", stem, i, ext)),
                    None => parent.join(format!("{} ({})", stem, i)),
                };
                if !candidate.exists() {
                    return Ok(Destination::Write(candidate));
                }
            }

            Err(DownloadError::FileCollision {
                path: path.to_path_buf(),
                reason: format!("no free name after {} attempts", MAX_RENAME_ATTEMPTS),
            }
            .into())
        }
    }
}

/// Reduce a remote file name to a single safe path component
///
/// Directory parts are dropped and `.`/`..` or empty names are rejected, so a
/// name from the server can never escape the output directory.
pub fn local_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// File name from a `Content-Disposition` header value
///
/// Prefers the RFC 5987 `filename*=` form over plain `filename=`. The result
/// is passed through [`local_file_name`].
pub fn content_disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;

    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // charset'lang'percent-encoded
            let encoded = encoded.rsplit('\'').next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded) {
                return local_file_name(&decoded);
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            plain = Some(name.trim_matches('"').to_string());
        }
    }

    plain.as_deref().and_then(local_file_name)
}

/// Get available disk space for a given path
///
/// Uses `statvfs` on Unix and `GetDiskFreeSpaceExW` on Windows.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zeroed and
        // only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            // f_bavail: blocks available to unprivileged users
            #[allow(clippy::useless_conversion)]
            Ok(u64::from(stat.f_bavail).saturating_mul(u64::from(stat.f_frsize)))
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and every out pointer refers to
        // a live u64 that is only read after a successful call.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut total_bytes: u64 = 0;
            let mut total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut total_bytes as *mut u64 as *mut _,
                &mut total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "disk space checking is not supported on this platform",
        ))
    }
}

/// Fail with `InsufficientSpace` if `dir` cannot hold `required` more bytes
///
/// `dir` may not exist yet; the nearest existing ancestor is checked instead.
pub fn ensure_space(dir: &Path, required: u64) -> Result<()> {
    let check_path = dir
        .ancestors()
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let available = get_available_space(&check_path).map_err(|e| {
        Error::DiskSpaceCheckFailed(format!(
            "failed to check disk space for '{}': {}",
            check_path.display(),
            e
        ))
    })?;

    if available < required {
        return Err(Error::InsufficientSpace {
            required,
            available,
        });
    }
    Ok(())
}
