//! Streaming ZIP archives of a codebase tree.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::io::DuplexStream;
use tokio_util::io::{ReaderStream, SyncIoBridge};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::storage::relative_slash_path;
use crate::{Result, VaultError};

/// Files at or above this size are written as ZIP64 entries.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Buffer between the blocking archive writer and the async response body.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Write a ZIP archive of everything under `root` into `writer`.
///
/// Directories become `name/` entries, regular files keep their
/// root-relative path. The root itself is never emitted and symlinks are
/// skipped. Nothing is written if `root` is not a directory.
pub fn write_archive<W: Write>(root: &Path, writer: W) -> Result<W> {
    if !root.is_dir() {
        return Err(VaultError::NotFound("Codebase".to_string()));
    }

    let mut zip = ZipWriter::new_stream(writer);
    let dir_options = SimpleFileOptions::default();
    let file_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let Some(name) = relative_slash_path(root, entry.path()) else {
            continue;
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(name, dir_options)?;
        } else if file_type.is_file() {
            let size = entry.metadata().map_err(io::Error::from)?.len();
            zip.start_file(name, file_options.large_file(size >= ZIP64_THRESHOLD))?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
        }
    }

    Ok(zip.finish()?.into_inner())
}

/// Archive `root` on a blocking thread and stream the bytes back.
///
/// Must be called from within a tokio runtime. A failure after the stream
/// has started is logged and ends the stream early.
pub fn stream_archive(root: PathBuf) -> ReaderStream<DuplexStream> {
    let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
    let bridge = SyncIoBridge::new(writer);

    tokio::task::spawn_blocking(move || {
        let result = write_archive(&root, bridge).and_then(|mut bridge| {
            bridge.flush()?;
            bridge.shutdown()?;
            Ok(())
        });
        if let Err(e) = result {
            tracing::error!(root = %root.display(), error = %e, "Archive stream aborted");
        }
    });

    ReaderStream::new(reader)
}
