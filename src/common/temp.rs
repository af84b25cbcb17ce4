//! Temporary artifacts that are renamed into place once complete.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Sibling path an artifact is written to before the final rename.
///
/// Same directory as the destination so the rename stays on one filesystem.
pub fn temp_artifact_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".tmp");
    output.with_file_name(name)
}

/// Remove a half-written artifact. Missing files are not an error.
pub fn discard_temp_artifact(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary artifact");
        }
    }
}

/// Produce an artifact at `temp`, then rename it over `output`.
///
/// If `write` or the rename fails, `temp` is removed and whatever was at
/// `output` before is left untouched.
pub fn replace_atomically<T>(
    output: &Path,
    temp: &Path,
    write: impl FnOnce(&Path) -> Result<T>,
) -> Result<T> {
    let value = match write(temp) {
        Ok(value) => value,
        Err(e) => {
            discard_temp_artifact(temp);
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(temp, output) {
        discard_temp_artifact(temp);
        return Err(e).with_context(|| format!("Failed to move {} into place", output.display()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_artifact_path_is_sibling() {
        let tmp = temp_artifact_path(Path::new("sysroot/boot/seraph.initrd"));
        assert_eq!(tmp, PathBuf::from("sysroot/boot/seraph.initrd.tmp"));
    }

    #[test]
    fn test_discard_missing_is_quiet() {
        discard_temp_artifact(Path::new("/nonexistent/seraph.initrd.tmp"));
    }

    #[test]
    fn test_replace_atomically_renames_on_success() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("seraph.initrd");
        let temp = temp_artifact_path(&output);

        let n = replace_atomically(&output, &temp, |dest| {
            fs::write(dest, "new")?;
            Ok(3)
        })
        .unwrap();

        assert_eq!(n, 3);
        assert_eq!(fs::read_to_string(&output).unwrap(), "new");
        assert!(!temp.exists());
    }

    #[test]
    fn test_failure_mid_write_keeps_previous_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("seraph.initrd");
        let temp = temp_artifact_path(&output);
        fs::write(&output, "previous image").unwrap();

        let result: Result<()> = replace_atomically(&output, &temp, |dest| {
            fs::write(dest, "half an arch")?;
            assert!(dest.exists());
            anyhow::bail!("disk full")
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous image");
        assert!(!temp.exists());
    }

    #[test]
    fn test_failed_rename_discards_temp() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let output = dir.path().join("seraph.initrd");
        fs::create_dir_all(output.join("occupied")).unwrap();
        let temp = dir.path().join("seraph.initrd.tmp");

        let result = replace_atomically(&output, &temp, |dest| {
            fs::write(dest, "image")?;
            Ok(())
        });

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("into place"), "{:#}", err);
        assert!(!temp.exists());
        assert!(output.join("occupied").is_dir());
    }
}
