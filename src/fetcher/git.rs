use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::Path;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::FetchError;

/// A parsed `git::<transport>://...` module source: the clone URL, an
/// optional `ref` (tag or branch), and an optional subdirectory within the
/// repository the module actually lives in (the `//subdir` suffix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub clone_url: String,
    pub git_ref: Option<String>,
    pub subdir: Option<String>,
}

/// Parses a Terraform-style git module source. Recognized forms:
/// `git::https://host/repo.git`, `git::ssh://...`, with an optional
/// `?ref=<tag-or-branch>` query and an optional `//subdir` path suffix.
/// Returns `None` if `source_url` does not use the `git::` prefix.
pub fn parse_git_source(source_url: &str) -> Option<GitSource> {
    let rest = source_url.strip_prefix("git::")?;

    let (path_and_query, git_ref) = match rest.split_once("?ref=") {
        Some((before, after)) => (before, Some(after.to_string())),
        None => (rest, None),
    };

    // A `//` right after the scheme (`https://host`) is not a subdir
    // separator; only a second `//` further into the path is. Search past
    // the scheme boundary, if any, before looking for the subdir split.
    let search_from = path_and_query.find("://").map(|i| i + 3).unwrap_or(0);
    let (clone_url, subdir) = match path_and_query[search_from..].find("//") {
        Some(offset) => {
            let split_at = search_from + offset;
            (path_and_query[..split_at].to_string(), Some(path_and_query[split_at + 2..].to_string()))
        }
        None => (path_and_query.to_string(), None),
    };

    Some(GitSource { clone_url, git_ref, subdir })
}

/// Clones `source` at its pinned ref (shallow, tag first then falling back
/// to a branch checkout) into a temp directory, then tars up the working
/// tree rooted at its subdir (if any), excluding `.git`, gzip-compressed.
pub async fn fetch_tarball(source: &GitSource, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
    let workdir = tempfile::tempdir().map_err(|err| FetchError::UpstreamIO(err.to_string()))?;
    let clone_path = workdir.path().join("repo");

    clone(source, &clone_path, cancel).await?;

    let root = match &source.subdir {
        Some(subdir) => clone_path.join(subdir),
        None => clone_path.clone(),
    };

    if !root.exists() {
        return Err(FetchError::NotFound);
    }

    tar_gzip(&root)
}

async fn clone(source: &GitSource, dest: &Path, cancel: &CancellationToken) -> Result<(), FetchError> {
    let shallow = run_git(
        Command::new("git").args([
            "clone",
            "--depth",
            "1",
            "--quiet",
            &source.clone_url,
            dest.to_str().unwrap_or_default(),
        ]),
        cancel,
    )
    .await;

    if shallow.is_ok() {
        if let Some(git_ref) = &source.git_ref {
            return checkout(dest, git_ref, cancel).await;
        }
        return Ok(());
    }

    // Shallow clone can fail to resolve an arbitrary ref; fall back to a
    // full clone and an explicit checkout.
    run_git(
        Command::new("git").args(["clone", "--quiet", &source.clone_url, dest.to_str().unwrap_or_default()]),
        cancel,
    )
    .await?;

    if let Some(git_ref) = &source.git_ref {
        checkout(dest, git_ref, cancel).await?;
    }

    Ok(())
}

async fn checkout(repo: &Path, git_ref: &str, cancel: &CancellationToken) -> Result<(), FetchError> {
    run_git(Command::new("git").current_dir(repo).args(["checkout", "--quiet", git_ref]), cancel).await
}

async fn run_git(command: &mut Command, cancel: &CancellationToken) -> Result<(), FetchError> {
    let output = tokio::select! {
        output = command.output() => output.map_err(|err| FetchError::UpstreamIO(err.to_string()))?,
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
    };

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") || stderr.contains("does not exist") || stderr.contains("Repository not found")
        {
            Err(FetchError::NotFound)
        } else {
            Err(FetchError::UpstreamIO(stderr.trim().to_string()))
        }
    }
}

fn tar_gzip(root: &Path) -> Result<Vec<u8>, FetchError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in walkdir::WalkDir::new(root).into_iter().filter_entry(|e| e.file_name() != ".git") {
        let entry = entry.map_err(|err| FetchError::UpstreamIO(err.to_string()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        builder
            .append_path_with_name(entry.path(), relative)
            .map_err(|err| FetchError::UpstreamIO(err.to_string()))?;
    }

    let encoder = builder.into_inner().map_err(|err| FetchError::UpstreamIO(err.to_string()))?;
    encoder.finish().map_err(|err| FetchError::UpstreamIO(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_https_source() {
        let parsed = parse_git_source("git::https://example.com/org/repo.git").unwrap();
        assert_eq!(parsed.clone_url, "https://example.com/org/repo.git");
        assert_eq!(parsed.git_ref, None);
        assert_eq!(parsed.subdir, None);
    }

    #[test]
    fn parses_ref_and_subdir() {
        let parsed =
            parse_git_source("git::https://example.com/org/repo.git//modules/vpc?ref=v1.2.0").unwrap();
        assert_eq!(parsed.clone_url, "https://example.com/org/repo.git");
        assert_eq!(parsed.git_ref, Some("v1.2.0".to_string()));
        assert_eq!(parsed.subdir, Some("modules/vpc".to_string()));
    }

    #[test]
    fn non_git_sources_return_none() {
        assert!(parse_git_source("https://example.com/module.tar.gz").is_none());
    }

    #[test]
    fn parses_ssh_transport() {
        let parsed = parse_git_source("git::ssh://git@example.com/org/repo.git?ref=main").unwrap();
        assert_eq!(parsed.clone_url, "ssh://git@example.com/org/repo.git");
        assert_eq!(parsed.git_ref, Some("main".to_string()));
    }
}
