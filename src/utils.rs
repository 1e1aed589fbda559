//! Utility functions for artifact naming and disk space checks

use crate::types::SongRef;
use std::path::{Path, PathBuf};

/// Characters that are not allowed in file names on common mobile/desktop filesystems
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Upper bound on a sanitized path component, in characters
const MAX_COMPONENT_CHARS: usize = 120;

/// Make `raw` safe to use as a single path component
///
/// Path separators, reserved characters and control characters become `_`, leading and
/// trailing whitespace and dots are trimmed, and the result is never empty.
pub fn sanitize_component(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_matches('.').trim();
    let truncated: String = trimmed.chars().take(MAX_COMPONENT_CHARS).collect();

    if truncated.is_empty() {
        "_".to_string()
    } else {
        truncated
    }
}

/// Tag embedded in every artifact file name to tie it to its song
fn song_marker(song_id: &str) -> String {
    format!("[{}]", sanitize_component(song_id))
}

/// File stem shared by all artifacts of a song: `"{artist} - {title} [{song_id}]"`
pub fn song_file_stem(song: &SongRef) -> String {
    let name = sanitize_component(&format!("{} - {}", song.artist, song.title));
    format!("{} {}", name, song_marker(&song.song_id))
}

/// Where a song's audio file lives
pub fn audio_path(download_dir: &Path, song: &SongRef, extension: &str) -> PathBuf {
    download_dir.join(format!("{}.{}", song_file_stem(song), extension))
}

/// Staging path an audio fetch writes to before it is moved into place
///
/// The `.part` suffix keeps an interrupted fetch from matching [`is_audio_for_song`].
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Where a song's cover image lives
pub fn cover_path(download_dir: &Path, song: &SongRef) -> PathBuf {
    download_dir.join(format!("{}.jpg", song_file_stem(song)))
}

/// Where a song's lyric file lives
pub fn lyric_path(download_dir: &Path, song: &SongRef) -> PathBuf {
    download_dir.join(format!("{}.lrc", song_file_stem(song)))
}

/// Whether `path` is the audio artifact of `song_id`
pub fn is_audio_for_song(path: &Path, song_id: &str, extension: &str) -> bool {
    let matches_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

    matches_extension
        && path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(&format!(" {}", song_marker(song_id))))
}

/// Get available disk space for a given path
///
/// Uses platform-specific APIs to query filesystem statistics:
/// - Linux: statvfs
/// - macOS: statvfs
/// - Windows: GetDiskFreeSpaceExW
///
/// # Arguments
///
/// * `path` - The path to check (typically the download directory)
///
/// # Returns
///
/// Returns the available disk space in bytes, or an IO error if the check fails.
///
/// # Examples
///
/// ```ignore
/// let available = get_available_space(Path::new("/sdcard/Music"))?;
/// println!("Available space: {} GB", available / (1024 * 1024 * 1024));
/// ```
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        // Convert path to C string for statvfs call
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: This is safe because:
        // 1. c_path is a valid, null-terminated C string created from the input path
        // 2. stat is properly initialized with zeroed memory before the call
        // 3. We check the return value and propagate any OS errors
        // 4. The statvfs struct is only read after a successful call
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // Available space = available blocks * block size
            // f_bavail is available blocks for unprivileged users
            // f_frsize is the fragment size (preferred over f_bsize)
            let available_bytes = stat.f_bavail.saturating_mul(stat.f_frsize);
            Ok(available_bytes)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        // Convert path to wide string for Windows API
        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0)) // null terminator
            .collect();

        // SAFETY: This is safe because:
        // 1. wide_path is a valid, null-terminated wide string
        // 2. All output pointers point to valid, properly aligned u64 variables
        // 3. We check the return value and propagate any OS errors
        // 4. The output variables are only read after a successful call
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut _total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut _total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Unsupported platform - return an error
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}
