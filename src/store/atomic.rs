use std::fs::{self, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;

use super::error::StoreError;

/// Replace `path` with `contents` in one step. The bytes go to a temporary
/// file in the same directory first, so a crash or a full disk leaves either
/// the old file or the new one, never a truncated mix.
///
/// A symlinked `path` is followed, so the file it points at gets the new
/// contents and the link stays in place. An existing file keeps its
/// permissions; a new one gets the usual umask-filtered defaults.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let target = follow_symlink(path);
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(StoreError::at(&parent))?;

    let existing = fs::metadata(&target).ok().map(|meta| meta.permissions());
    let mut builder = Builder::new();
    if let Some(permissions) = new_file_permissions() {
        builder.permissions(permissions);
    }
    let mut staged = builder
        .tempfile_in(&parent)
        .map_err(StoreError::at(&parent))?;
    if let Some(permissions) = existing {
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(StoreError::at(&target))?;
    }

    staged.write_all(contents).map_err(StoreError::at(&target))?;
    staged.as_file().sync_all().map_err(StoreError::at(&target))?;
    staged
        .persist(&target)
        .map_err(|err| StoreError::at(&target)(err.error))?;
    Ok(())
}

/// Where a write to `path` has to land. Dangling links are followed one hop so
/// the link is not replaced by a regular file.
fn follow_symlink(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    let is_link = fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    if !is_link {
        return path.to_path_buf();
    }
    match fs::read_link(path) {
        Ok(link) if link.is_absolute() => link,
        Ok(link) => path.parent().unwrap_or(Path::new(".")).join(link),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn replaces_existing_contents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("data.json");
        fs::write(&target, "old contents that are longer").unwrap();

        write_atomic(&target, b"new").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn leaves_no_staging_files_behind() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("data.json");

        write_atomic(&target, b"[]").unwrap();
        write_atomic(&target, b"[1]").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("data.json")]);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b").join("data.json");

        write_atomic(&target, b"[]").unwrap();

        assert!(target.is_file());
    }

    #[test]
    fn failed_replace_keeps_the_target_untouched() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("data.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), "still here").unwrap();

        let err = write_atomic(&target, b"[]").unwrap_err();

        assert!(matches!(err, StoreError::Filesystem { .. }));
        assert_eq!(
            fs::read_to_string(target.join("keep.txt")).unwrap(),
            "still here"
        );
    }

    #[cfg(unix)]
    #[test]
    fn writes_through_a_symlink() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("nas").join("zaehler.json");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::write(&real, "[]").unwrap();
        let link = dir.path().join("link.json");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        write_atomic(&link, b"[1]").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "[1]");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_creates_its_target() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("later").join("zaehler.json");
        let link = dir.path().join("link.json");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        write_atomic(&link, b"[]").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "[]");
    }

    #[cfg(unix)]
    #[test]
    fn existing_permissions_survive_a_rewrite() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("data.json");
        fs::write(&target, "[]").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o664)).unwrap();

        write_atomic(&target, b"[1]").unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    #[cfg(unix)]
    #[test]
    fn new_files_get_the_same_mode_as_a_plain_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain.csv");
        fs::write(&plain, "x").unwrap();
        let staged = dir.path().join("export.csv");

        write_atomic(&staged, b"x").unwrap();

        let mode_of = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode_of(&staged), mode_of(&plain));
    }
}
