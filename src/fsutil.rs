//! Directory primitives used by the pipeline.
//!
//! Output roots must be fully cleared and recreated before the first artifact
//! is written; [`reset_dir`] does both and only returns once the directory is
//! empty and present. Artifacts are written through [`write_atomically`] so
//! a failed write never leaves a truncated file at the conventional path.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Recursively delete `dir` (if present) and recreate it empty.
pub fn reset_dir(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::create_dir_all(dir)
}

/// Create `dir` and any missing parents. Existing contents are left alone.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Copy `source` to `output` byte-for-byte, overwriting any existing file.
pub fn copy_file(source: &Path, output: &Path) -> io::Result<u64> {
    std::fs::copy(source, output)
}

/// Hidden sibling `path` is written to before being renamed into place.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}

/// Let `write` produce the file at [`partial_path`], then rename it to `path`.
///
/// If `write` or the rename fails the partial file is removed and `path` is
/// left as it was.
pub fn write_atomically<E, F>(path: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&Path) -> Result<(), E>,
    E: From<io::Error>,
{
    let partial = partial_path(path);
    let result = write(&partial).and_then(|()| std::fs::rename(&partial, path).map_err(E::from));
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}
