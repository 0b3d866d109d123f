use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `text` to a sibling temp file and renames it over `path`.
///
/// The previous file at `path` is untouched unless the rename succeeds.
pub(crate) fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    if let Err(error) = write_and_sync(&tmp_path, text.as_bytes()) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

/// Removes `path`. Returns `Ok(false)` if nothing was there.
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn replaces_existing_file_and_leaves_no_temp() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("saves").join("slot.json");

        write_text_atomic(&path, "first").expect("first write");
        write_text_atomic(&path, "second").expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn failed_write_keeps_previous_contents() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        write_text_atomic(&path, "keep me").expect("write");

        // A directory squatting on the temp path makes the write fail.
        fs::create_dir_all(temp_path_for(&path)).expect("block temp path");
        assert!(write_text_atomic(&path, "lost").is_err());

        assert_eq!(fs::read_to_string(&path).expect("read"), "keep me");
    }

    #[test]
    fn remove_if_exists_reports_absence() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        assert!(!remove_if_exists(&path).expect("remove missing"));
        fs::write(&path, "x").expect("write");
        assert!(remove_if_exists(&path).expect("remove present"));
        assert!(!path.exists());
    }
}
