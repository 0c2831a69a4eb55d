use crate::error::PayloadLoadError;
use bytes::Bytes;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// In-memory zip writer shared by directory loading and multi-file uploads
pub struct ZipBuilder {
    label: PathBuf,
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl ZipBuilder {
    /// `label` names the source in error messages
    pub fn new(label: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    /// Add one file; `name` is the forward-slash path inside the archive
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<(), PayloadLoadError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        self.writer
            .start_file(name, options)
            .map_err(|source| PayloadLoadError::Archive {
                path: self.label.clone(),
                source,
            })?;
        self.writer
            .write_all(data)
            .map_err(|e| PayloadLoadError::io(self.label.clone(), e))?;

        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn finish(self) -> Result<Bytes, PayloadLoadError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|source| PayloadLoadError::Archive {
                path: self.label,
                source,
            })?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

/// Pack every regular file below `root` into a zip archive
///
/// Entries are stored under their path relative to `root`. Symbolic links
/// below the root are skipped, never followed, so link cycles cannot
/// recurse. This is blocking I/O; run it off the async executor.
pub fn archive_directory(root: &Path) -> Result<Bytes, PayloadLoadError> {
    let mut builder = ZipBuilder::new(root);

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PayloadLoadError::io(path, e.into())
        })?;

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            tracing::debug!("Skipping symbolic link {}", entry.path().display());
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let data =
            std::fs::read(entry.path()).map_err(|e| PayloadLoadError::io(entry.path(), e))?;
        builder.add_file(&name, &data)?;
    }

    tracing::debug!(
        "Archived {} files from {}",
        builder.entries(),
        root.display()
    );
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_entry(archive: &mut ZipArchive<Cursor<Bytes>>, name: &str) -> String {
        let mut contents = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
    }

    #[test]
    fn test_builder_round_trip() {
        let mut builder = ZipBuilder::new("upload");
        builder.add_file("index.js", b"console.log(1);").unwrap();
        builder.add_file("src/main.js", b"console.log(2);").unwrap();
        assert_eq!(builder.entries(), 2);

        let bytes = builder.finish().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(read_entry(&mut archive, "src/main.js"), "console.log(2);");
    }

    #[test]
    fn test_archive_directory_uses_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("root.txt"), "root file").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/nested.txt"), "nested file").unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let bytes = archive_directory(dir.path()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        assert_eq!(archive.len(), 2);
        assert_eq!(read_entry(&mut archive, "root.txt"), "root file");
        assert_eq!(read_entry(&mut archive, "nested/nested.txt"), "nested file");
    }

    #[test]
    fn test_empty_directory_still_produces_archive() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = archive_directory(dir.path()).unwrap();

        assert!(!bytes.is_empty());
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symbolic_links_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.txt"), "real").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        // a link back to the root would loop forever if followed
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("real.txt"),
            dir.path().join("alias.txt"),
        )
        .unwrap();

        let bytes = archive_directory(dir.path()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, vec!["real.txt"]);
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        let err = archive_directory(&missing).unwrap_err();
        assert!(matches!(err, PayloadLoadError::Io { .. }));
    }
}
