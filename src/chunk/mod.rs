//! Chunker
//!
//! Splits an archive file into fixed-size sequential part files. Parts are
//! numbered from 1 with no gaps, named `{file}.part{n}` next to the source
//! file, and concatenating them in index order reproduces the source exactly.
//! The last part may be shorter than the fixed size.
//!
//! A failed split may leave partially written parts behind; cleanup of those
//! is the caller's responsibility (the pipeline keeps temp files on failure
//! anyway).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::upload::{Part, UploadError};

/// Default part size: 10 MiB
pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;

/// Split `file` into parts of at most `part_size` bytes.
///
/// Returns the ordered part list. A zero-byte file yields zero parts; the
/// upload session rejects that case since zero-part uploads are invalid.
pub fn split(file: &Path, part_size: u64) -> Result<Vec<Part>, UploadError> {
    let mut reader = File::open(file)?;
    let mut parts = Vec::new();
    let mut number: u32 = 1;

    loop {
        let mut buf = Vec::new();
        let read = (&mut reader).take(part_size).read_to_end(&mut buf)?;
        if read == 0 {
            break;
        }

        let part_path = part_path_for(file, number);
        std::fs::write(&part_path, &buf)?;
        debug!(part = number, bytes = read, path = %part_path.display(), "Wrote part");

        parts.push(Part {
            number,
            path: part_path,
        });
        number += 1;
    }

    Ok(parts)
}

/// Deterministic part file name: `{file}.part{n}`
fn part_path_for(file: &Path, number: u32) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(format!(".part{number}"));
    PathBuf::from(name)
}
