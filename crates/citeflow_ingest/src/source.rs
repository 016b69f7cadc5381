//! Input discovery and transparent gzip decoding.

use crate::driver::InputFile;
use crate::error::IngestError;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use walkdir::WalkDir;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const INPUT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Enumerate the input files under `root`.
///
/// A directory is walked recursively and filtered by name suffix; entries are
/// named by their `/`-separated path relative to `root` and sorted by that
/// name. A file root is returned as-is, named by its file name.
pub fn discover_inputs(root: &Path, extensions: &[String]) -> Result<Vec<InputFile>, IngestError> {
    if !root.exists() {
        return Err(IngestError::NotFound(root.to_path_buf()));
    }

    if root.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.to_string_lossy().to_string());
        return Ok(vec![InputFile::new(name, root)]);
    }

    let mut inputs = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| IngestError::Discovery {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }
        let Ok(rel_path) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = rel_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        inputs.push(InputFile::new(name, entry.path()));
    }

    inputs.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(root = %root.display(), count = inputs.len(), "Discovered inputs");
    Ok(inputs)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.').to_lowercase();
        !ext.is_empty() && name.ends_with(&format!(".{}", ext))
    })
}

/// Open `path` for reading, decompressing when it starts with the gzip magic.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    decode_stream(BufReader::with_capacity(INPUT_BUFFER_CAPACITY, file))
}

/// Wrap `reader` in a multi-member gzip decoder if its first bytes are the
/// gzip magic. Nothing is consumed by the sniff.
pub fn decode_stream<R>(mut reader: R) -> io::Result<Box<dyn BufRead + Send>>
where
    R: BufRead + Send + 'static,
{
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(BufReader::with_capacity(
            INPUT_BUFFER_CAPACITY,
            MultiGzDecoder::new(reader),
        )))
    } else {
        Ok(Box::new(reader))
    }
}
