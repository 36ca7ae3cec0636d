// Publisher: atomic replace of the published activity record.
// Content is written to a uniquely named temporary in the target's directory,
// then renamed over the target, so readers see either the old or the new value.

use crate::error::{ActivityError, Result};
use crate::models::ActivityValue;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::instrument;

pub const DEFAULT_RECORD_PATH: &str = "/dev/shm/net_activity";
pub const DEFAULT_RECORD_MODE: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct Publisher {
    target: PathBuf,
    mode: u32,
}

impl Publisher {
    pub fn new(target: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            target: target.into(),
            mode,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Creates the record's directory if it does not exist yet.
    pub fn prepare(&self) -> Result<()> {
        let dir = staging_dir(&self.target);
        std::fs::create_dir_all(dir).map_err(|source| self.write_failure(source))
    }

    /// Exposes the record at `link` through a symbolic link, replacing a stale one.
    /// Anything at `link` that is not a symlink is left alone and reported.
    #[cfg(unix)]
    pub fn ensure_link(&self, link: &Path) -> Result<()> {
        let link_failure = |source| ActivityError::WriteFailure {
            path: link.to_path_buf(),
            source,
        };
        match std::fs::symlink_metadata(link) {
            Ok(meta) if meta.file_type().is_symlink() => {
                if std::fs::read_link(link).map_err(link_failure)? == self.target {
                    return Ok(());
                }
                std::fs::remove_file(link).map_err(link_failure)?;
            }
            Ok(meta) => {
                let what = if meta.is_dir() { "a directory" } else { "not a symlink" };
                return Err(link_failure(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("link path exists and is {}", what),
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(link_failure(e)),
        }
        if let Some(parent) = link.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(link_failure)?;
        }
        std::os::unix::fs::symlink(&self.target, link).map_err(link_failure)?;
        tracing::info!(link = %link.display(), target = %self.target.display(), "record link created");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn ensure_link(&self, link: &Path) -> Result<()> {
        Err(ActivityError::WriteFailure {
            path: link.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Unsupported, "symbolic links need unix"),
        })
    }

    /// Blocking publish. On error the previously published record is unchanged.
    pub fn publish_blocking(&self, value: ActivityValue) -> Result<()> {
        let contents = format!("{}\n", value);
        replace_atomically(&self.target, self.mode, contents.as_bytes(), |file, bytes| {
            file.write_all(bytes)?;
            file.flush()
        })
        .map_err(|source| self.write_failure(source))
    }

    #[instrument(skip(self), fields(operation = "publish"))]
    pub async fn publish(&self, value: ActivityValue) -> Result<()> {
        let publisher = self.clone();
        tokio::task::spawn_blocking(move || publisher.publish_blocking(value))
            .await
            .map_err(|e| self.write_failure(io::Error::other(format!("publish task join: {}", e))))?
    }

    fn write_failure(&self, source: io::Error) -> ActivityError {
        ActivityError::WriteFailure {
            path: self.target.clone(),
            source,
        }
    }
}

/// Directory that holds both the temporary and the target (same filesystem).
fn staging_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn replace_atomically<F>(target: &Path, mode: u32, contents: &[u8], write: F) -> io::Result<()>
where
    F: FnOnce(&mut NamedTempFile, &[u8]) -> io::Result<()>,
{
    let prefix = format!(
        ".{}.",
        target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "record".into())
    );
    // Dropping the temporary on any early return removes it.
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(staging_dir(target))?;
    write(&mut tmp, contents)?;
    set_mode(tmp.as_file(), mode)?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &std::fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &std::fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temporaries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
            .collect()
    }

    #[test]
    fn failed_write_keeps_previous_record() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("net_activity");
        let publisher = Publisher::new(&target, DEFAULT_RECORD_MODE);
        publisher.publish_blocking(42).unwrap();

        // Half the content lands, then the device runs out of space.
        let result = replace_atomically(&target, DEFAULT_RECORD_MODE, b"123456\n", |file, bytes| {
            file.write_all(&bytes[..3])?;
            Err(io::Error::other("no space left on device"))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "42\n");
        assert!(leftover_temporaries(dir.path()).is_empty());
    }

    #[test]
    fn staging_dir_of_bare_file_name_is_cwd() {
        assert_eq!(staging_dir(Path::new("net_activity")), Path::new("."));
        assert_eq!(
            staging_dir(Path::new("/dev/shm/net_activity")),
            Path::new("/dev/shm")
        );
    }

    #[cfg(unix)]
    #[test]
    fn temporary_is_named_after_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("net_activity");
        let mut seen = None;
        let _ = replace_atomically(&target, DEFAULT_RECORD_MODE, b"1\n", |file, _| {
            seen = file
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            Err(io::Error::other("stop before rename"))
        });
        let name = seen.unwrap();
        assert!(name.starts_with(".net_activity."));
        assert!(name.ends_with(".tmp"));
        assert!(!target.exists());
    }
}
