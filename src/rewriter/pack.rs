use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use super::RewriteError;

/// Tars and gzips `root`'s contents with paths relative to it, preserving
/// the archive's top-level layout (spec §4.5 step 5).
pub fn tar_gzip(root: &Path) -> Result<Vec<u8>, RewriteError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|err| RewriteError::Repack(err.to_string()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        builder
            .append_path_with_name(entry.path(), relative)
            .map_err(|err| RewriteError::Repack(err.to_string()))?;
    }

    let encoder = builder.into_inner().map_err(|err| RewriteError::Repack(err.to_string()))?;
    encoder.finish().map_err(|err| RewriteError::Repack(err.to_string()))
}
