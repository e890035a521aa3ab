//! Module Rewriter (spec §4.5): extracts a module's gzip tarball, rewrites
//! `module { source = "…" }` blocks that name a registry-style address so
//! they point at the mirror instead of the upstream registry, and repacks.
//!
//! Only registry-style sources (`namespace/name/system` or
//! `hostname/namespace/name/system`) are rewritten. Relative paths, URL
//! schemes, ssh-style git remotes, and sources already targeting the mirror
//! are left untouched. `.tf` files that fail to parse are logged and left
//! byte-identical rather than failing the whole item.

mod classify;
mod pack;

use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use walkdir::WalkDir;

pub use classify::{classify_source, SourceClass};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("archive entry path escapes extraction root: {0}")]
    PathEscape(String),

    #[error("archive entry exceeds the per-file extraction cap: {0}")]
    FileTooLarge(String),

    #[error("archive extraction failed: {0}")]
    Extract(String),

    #[error("archive repack failed: {0}")]
    Repack(String),
}

impl From<RewriteError> for crate::Error {
    fn from(err: RewriteError) -> Self {
        crate::Error::InvalidInput(err.to_string())
    }
}

/// Default cap on any single file extracted from a module archive. Guards
/// against a module archive that tries to exhaust scratch disk space.
pub const DEFAULT_MAX_EXTRACT_FILE_BYTES: u64 = 256 * 1024 * 1024;

/// Rewrites every `.tf` file's registry-style `module.source` addresses to
/// point at `mirror_hostname`, returning a fresh gzip tarball. When
/// `mirror_hostname` is empty the rewriter is a pass-through and the input
/// bytes are returned unchanged (spec §4.5).
pub fn rewrite_module_archive(tarball: &[u8], mirror_hostname: &str) -> Result<Vec<u8>, RewriteError> {
    rewrite_module_archive_with_cap(tarball, mirror_hostname, DEFAULT_MAX_EXTRACT_FILE_BYTES)
}

pub fn rewrite_module_archive_with_cap(
    tarball: &[u8],
    mirror_hostname: &str,
    max_extract_file_bytes: u64,
) -> Result<Vec<u8>, RewriteError> {
    if mirror_hostname.is_empty() {
        return Ok(tarball.to_vec());
    }

    let scratch = tempfile::tempdir().map_err(|err| RewriteError::Extract(err.to_string()))?;
    extract(tarball, scratch.path(), max_extract_file_bytes)?;

    for entry in WalkDir::new(scratch.path()).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("tf") {
            continue;
        }
        rewrite_tf_file(entry.path(), mirror_hostname);
    }

    pack::tar_gzip(scratch.path())
}

fn rewrite_tf_file(path: &Path, mirror_hostname: &str) {
    let Ok(text) = std::fs::read_to_string(path) else {
        tracing::warn!(path = %path.display(), "module rewriter: could not read .tf file, skipping");
        return;
    };

    let mut body: hcl_edit::structure::Body = match text.parse() {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "module rewriter: could not parse .tf file, leaving untouched");
            return;
        }
    };

    let mut changed = false;
    for block in body.blocks_mut() {
        if block.ident.as_str() != "module" {
            continue;
        }
        let Some(attr) = block.body.get_attribute_mut("source") else { continue };
        let Some(source) = attr.value.as_str() else { continue };

        match classify_source(source, mirror_hostname) {
            SourceClass::Registry { namespace, name, system } => {
                let rewritten = format!("{mirror_hostname}/{namespace}/{name}/{system}");
                *attr.value_mut() = hcl_edit::expr::Expression::from(rewritten);
                changed = true;
            }
            SourceClass::Relative | SourceClass::UrlScheme | SourceClass::SshGit | SourceClass::AlreadyMirror => {}
        }
    }

    if changed {
        if let Err(err) = std::fs::write(path, body.to_string()) {
            tracing::warn!(path = %path.display(), error = %err, "module rewriter: failed to write rewritten .tf file");
        }
    }
}

fn extract(tarball: &[u8], dest: &Path, max_file_bytes: u64) -> Result<(), RewriteError> {
    let decoder = GzDecoder::new(tarball);
    let mut archive = Archive::new(decoder);

    for entry in archive.entries().map_err(|err| RewriteError::Extract(err.to_string()))? {
        let mut entry = entry.map_err(|err| RewriteError::Extract(err.to_string()))?;
        let path = entry.path().map_err(|err| RewriteError::Extract(err.to_string()))?;

        if path.components().any(|component| matches!(component, std::path::Component::ParentDir)) {
            return Err(RewriteError::PathEscape(path.display().to_string()));
        }

        let size = entry.header().size().map_err(|err| RewriteError::Extract(err.to_string()))?;
        if size > max_file_bytes {
            return Err(RewriteError::FileTooLarge(path.display().to_string()));
        }

        entry.unpack_in(dest).map_err(|err| RewriteError::Extract(err.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }

        let encoder = builder.into_inner().unwrap();
        encoder.finish().unwrap()
    }

    fn read_file_from_archive(tarball: &[u8], name: &str) -> String {
        let decoder = GzDecoder::new(tarball);
        let mut archive = Archive::new(decoder);
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().to_str() == Some(name) {
                let mut content = String::new();
                std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
                return content;
            }
        }
        panic!("{name} not found in archive");
    }

    #[test]
    fn rewrites_registry_style_source_and_leaves_relative_alone() {
        let main_tf = r#"
module "x" {
  source = "hashicorp/consul/aws"
}

module "y" {
  source = "./local"
}
"#;
        let tarball = build_archive(&[("main.tf", main_tf)]);
        let rewritten = rewrite_module_archive(&tarball, "m.example").unwrap();
        let content = read_file_from_archive(&rewritten, "main.tf");

        assert!(content.contains(r#"source = "m.example/hashicorp/consul/aws""#));
        assert!(content.contains(r#"source = "./local""#));
    }

    #[test]
    fn empty_mirror_hostname_is_a_pass_through() {
        let tarball = build_archive(&[("main.tf", r#"module "x" { source = "hashicorp/consul/aws" }"#)]);
        let rewritten = rewrite_module_archive(&tarball, "").unwrap();
        assert_eq!(rewritten, tarball);
    }

    #[test]
    fn leaves_unparsable_tf_file_untouched() {
        let tarball = build_archive(&[("main.tf", "not { valid hcl ]")]);
        let rewritten = rewrite_module_archive(&tarball, "m.example").unwrap();
        let content = read_file_from_archive(&rewritten, "main.tf");
        assert_eq!(content, "not { valid hcl ]");
    }

    #[test]
    fn rejects_path_escaping_entries() {
        let tarball = build_archive(&[("../escape.tf", "x")]);
        let result = rewrite_module_archive(&tarball, "m.example");
        assert!(matches!(result, Err(RewriteError::PathEscape(_))));
    }
}
