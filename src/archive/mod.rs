//! Archiver
//!
//! Turns a directory into a single uncompressed tar archive in the scratch
//! directory, under a unique random file name so concurrent sessions never
//! collide. The directory's base name becomes the archive's top-level entry,
//! so extraction reproduces the directory under its original name.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::upload::UploadError;

/// Compress a directory into a tar archive in `scratch_dir`.
///
/// Creates the scratch directory if it does not exist. Returns the path of
/// the archive file.
pub fn compress_dir(dir: &Path, scratch_dir: &Path) -> Result<PathBuf, UploadError> {
    if !dir.is_dir() {
        return Err(UploadError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source directory not found: {}", dir.display()),
        )));
    }

    let arc_name = dir
        .file_name()
        .ok_or_else(|| {
            UploadError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot derive archive entry name from {}", dir.display()),
            ))
        })?
        .to_os_string();

    std::fs::create_dir_all(scratch_dir)?;

    let output_path = scratch_dir.join(format!("{}.tar", uuid::Uuid::new_v4()));
    debug!(source = %dir.display(), archive = %output_path.display(), "Creating archive");

    let file = File::create(&output_path)?;
    let mut builder = tar::Builder::new(file);
    builder.append_dir_all(&arc_name, dir)?;
    builder.into_inner()?.sync_all()?;

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_file(dir: &Path, name: &str, content: &[u8]) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_archive_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("exp01");
        std::fs::create_dir(&source).unwrap();
        write_file(&source, "results.csv", b"epoch,loss\n1,0.5\n");
        std::fs::create_dir(source.join("weights")).unwrap();
        write_file(&source.join("weights"), "best.pt", &[0xde, 0xad, 0xbe, 0xef]);

        let scratch = root.path().join("scratch");
        let tar_path = compress_dir(&source, &scratch).unwrap();
        assert!(tar_path.exists());

        let mut archive = tar::Archive::new(File::open(&tar_path).unwrap());
        let mut seen = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_path_buf();
            // Top-level entry name is the source directory's base name
            assert!(path.starts_with("exp01"), "unexpected entry {path:?}");
            if path == Path::new("exp01/weights/best.pt") {
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                assert_eq!(content, vec![0xde, 0xad, 0xbe, 0xef]);
            }
            seen.push(path);
        }
        assert!(seen.contains(&PathBuf::from("exp01/results.csv")));
        assert!(seen.contains(&PathBuf::from("exp01/weights/best.pt")));
    }

    #[test]
    fn test_empty_directory_still_archives() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("empty_exp");
        std::fs::create_dir(&source).unwrap();

        let tar_path = compress_dir(&source, &root.path().join("scratch")).unwrap();
        // A near-empty archive still carries header/terminator bytes
        assert!(std::fs::metadata(&tar_path).unwrap().len() > 0);
    }

    #[test]
    fn test_missing_source_fails() {
        let root = tempfile::tempdir().unwrap();
        let result = compress_dir(&root.path().join("nope"), &root.path().join("scratch"));
        assert!(matches!(result, Err(UploadError::Io(_))));
    }

    #[test]
    fn test_unique_archive_names() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("exp");
        std::fs::create_dir(&source).unwrap();
        let scratch = root.path().join("scratch");

        let a = compress_dir(&source, &scratch).unwrap();
        let b = compress_dir(&source, &scratch).unwrap();
        assert_ne!(a, b);
    }
}
