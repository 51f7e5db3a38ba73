//! Pinned source archive acquisition.
//!
//! This module downloads a forge archive snapshot, verifies its bytes
//! against the pinned digest before anything is written or unpacked, and
//! extracts the source tree into the run's scratch directory.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::recipe::{ArchiveKind, Sha256Digest, SourceSpec};
use crate::util::hash::hash_bytes;

/// Digest mismatch between fetched bytes and the pinned value.
///
/// Always fatal: it signals either supply-chain tampering or a stale pin,
/// and must never be retried.
#[derive(Debug, thiserror::Error)]
#[error("digest mismatch for {url}: expected {expected}, got {actual}")]
pub struct IntegrityError {
  pub url: String,
  pub expected: String,
  pub actual: String,
}

/// Transient acquisition failures, retriable by the executor.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  /// HTTP request failed or returned a non-success status.
  #[error("fetch failed for {url}: {message}")]
  Http { url: String, message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to unpack {path}: {message}")]
  Unpack { path: String, message: String },
}

/// Archive URL for a pinned source snapshot.
///
/// Forges serve repository snapshots at
/// `<base>/<owner>/<repo>/archive/<rev>.<ext>`; `rev` is a fixed tag, so
/// the same URL always names the same bytes.
pub fn archive_url(base: &str, source: &SourceSpec) -> String {
  format!(
    "{}/{}/{}/archive/{}.{}",
    base.trim_end_matches('/'),
    source.owner,
    source.repo,
    source.rev,
    source.archive.extension()
  )
}

/// Download the archive bytes.
///
/// Single attempt; retry policy belongs to the executor so transient
/// failures are never masked here. There is no fallback to cached or
/// alternate sources.
pub async fn fetch_archive(url: &str) -> Result<Vec<u8>, FetchError> {
  info!(url = %url, "fetching source archive");

  let response = reqwest::get(url).await.map_err(|e| FetchError::Http {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  if !response.status().is_success() {
    return Err(FetchError::Http {
      url: url.to_string(),
      message: format!("HTTP {}", response.status()),
    });
  }

  let bytes = response.bytes().await.map_err(|e| FetchError::Http {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  debug!(size = bytes.len(), "archive downloaded");
  Ok(bytes.to_vec())
}

/// Compare fetched bytes against the pinned digest.
///
/// Fails closed: on mismatch the caller must abort before any unpack or
/// build step runs.
pub fn verify_digest(bytes: &[u8], pinned: &Sha256Digest, url: &str) -> Result<(), IntegrityError> {
  let actual = hash_bytes(bytes);
  if actual.0 != pinned.0 {
    return Err(IntegrityError {
      url: url.to_string(),
      expected: pinned.0.clone(),
      actual: actual.0,
    });
  }
  debug!(digest = %pinned.0, "archive digest verified");
  Ok(())
}

/// Write verified archive bytes into the scratch directory and unpack them.
///
/// Forge snapshots wrap everything in a single `<repo>-<rev>/` directory;
/// that first component is stripped so the source tree lands directly at
/// `dest`.
pub async fn unpack_source(
  bytes: &[u8],
  kind: ArchiveKind,
  scratch: &Path,
  dest: &Path,
) -> Result<(), FetchError> {
  fs::create_dir_all(scratch).await?;
  let archive_path = scratch.join(format!("source.{}", kind.extension()));

  let mut file = fs::File::create(&archive_path).await?;
  file.write_all(bytes).await?;
  file.flush().await?;

  fs::create_dir_all(dest).await?;
  match kind {
    ArchiveKind::TarGz => unpack_tar_gz(&archive_path, dest)?,
    ArchiveKind::Tar => unpack_tar(&archive_path, dest)?,
    ArchiveKind::Zip => unpack_zip(&archive_path, dest)?,
  }

  info!(path = %dest.display(), "source tree unpacked");
  Ok(())
}

/// Drop the snapshot's single top-level directory from an entry path.
fn stripped_path(path: &Path) -> Option<PathBuf> {
  let stripped: PathBuf = path.components().skip(1).collect();
  if stripped.as_os_str().is_empty() {
    None
  } else {
    Some(stripped)
  }
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), FetchError> {
  let file = File::open(archive_path)?;
  let decoder = GzDecoder::new(BufReader::new(file));
  unpack_tar_entries(Archive::new(decoder), dest)
}

fn unpack_tar(archive_path: &Path, dest: &Path) -> Result<(), FetchError> {
  let file = File::open(archive_path)?;
  unpack_tar_entries(Archive::new(BufReader::new(file)), dest)
}

fn unpack_tar_entries<R: std::io::Read>(mut archive: Archive<R>, dest: &Path) -> Result<(), FetchError> {
  for entry in archive.entries()? {
    let mut entry = entry?;
    let path = entry.path()?;

    let Some(stripped) = stripped_path(&path) else {
      continue;
    };

    let dest_path = dest.join(&stripped);
    if let Some(parent) = dest_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    entry.unpack(&dest_path)?;
  }
  Ok(())
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<(), FetchError> {
  let file = File::open(archive_path)?;
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| FetchError::Unpack {
    path: archive_path.display().to_string(),
    message: e.to_string(),
  })?;

  for i in 0..archive.len() {
    let mut file = archive.by_index(i).map_err(|e| FetchError::Unpack {
      path: archive_path.display().to_string(),
      message: e.to_string(),
    })?;

    let path = file.enclosed_name().ok_or_else(|| FetchError::Unpack {
      path: archive_path.display().to_string(),
      message: format!("unsafe entry name: {}", file.name()),
    })?;

    let Some(stripped) = stripped_path(&path) else {
      continue;
    };

    let dest_path = dest.join(&stripped);
    if file.is_dir() {
      std::fs::create_dir_all(&dest_path)?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let mut outfile = File::create(&dest_path)?;
    std::io::copy(&mut file, &mut outfile)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = file.unix_mode() {
        std::fs::set_permissions(&dest_path, std::fs::Permissions::from_mode(mode))?;
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::recipe::ArchiveKind;
  use flate2::Compression;
  use flate2::write::GzEncoder;
  use std::io::Write;
  use tempfile::TempDir;

  fn source_spec() -> SourceSpec {
    SourceSpec {
      owner: "hetznercloud".to_string(),
      repo: "cli".to_string(),
      rev: "v1.16.1".to_string(),
      archive: ArchiveKind::TarGz,
    }
  }

  /// Build a gzipped tarball with the given `(path, content)` entries.
  fn make_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in entries {
      let mut header = tar::Header::new_gnu();
      header.set_size(content.len() as u64);
      header.set_mode(0o644);
      header.set_cksum();
      builder.append_data(&mut header, path, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
  }

  fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, content) in entries {
      writer.start_file(*path, options).unwrap();
      writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
  }

  #[test]
  fn archive_url_pins_owner_repo_rev() {
    let url = archive_url("https://github.com", &source_spec());
    assert_eq!(url, "https://github.com/hetznercloud/cli/archive/v1.16.1.tar.gz");
  }

  #[test]
  fn archive_url_tolerates_trailing_slash() {
    let url = archive_url("https://github.com/", &source_spec());
    assert_eq!(url, "https://github.com/hetznercloud/cli/archive/v1.16.1.tar.gz");
  }

  #[test]
  fn archive_url_uses_archive_kind_extension() {
    let mut source = source_spec();
    source.archive = ArchiveKind::Zip;
    let url = archive_url("https://github.com", &source);
    assert!(url.ends_with("/archive/v1.16.1.zip"));
  }

  #[test]
  fn verify_digest_accepts_matching_bytes() {
    let bytes = b"archive contents";
    let pinned = Sha256Digest(hash_bytes(bytes).0);
    assert!(verify_digest(bytes, &pinned, "https://example.com/a.tar.gz").is_ok());
  }

  #[test]
  fn verify_digest_fails_closed_on_mismatch() {
    let pinned = Sha256Digest(hash_bytes(b"expected contents").0);
    let err = verify_digest(b"tampered contents", &pinned, "https://example.com/a.tar.gz").unwrap_err();

    assert_eq!(err.expected, pinned.0);
    assert_eq!(err.actual, hash_bytes(b"tampered contents").0);
    assert_eq!(err.url, "https://example.com/a.tar.gz");
  }

  #[tokio::test]
  async fn unpack_strips_first_component() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("src");
    let bytes = make_tar_gz(&[
      ("cli-1.16.1/main.go", b"package main\n"),
      ("cli-1.16.1/cli/root.go", b"package cli\n"),
    ]);

    unpack_source(&bytes, ArchiveKind::TarGz, temp.path(), &dest).await.unwrap();

    assert_eq!(std::fs::read(dest.join("main.go")).unwrap(), b"package main\n");
    assert_eq!(std::fs::read(dest.join("cli/root.go")).unwrap(), b"package cli\n");
    assert!(temp.path().join("source.tar.gz").exists());
  }

  #[tokio::test]
  async fn unpack_zip_strips_first_component() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("src");
    let bytes = make_zip(&[("cli-1.16.1/main.go", b"package main\n".as_slice())]);

    unpack_source(&bytes, ArchiveKind::Zip, temp.path(), &dest).await.unwrap();

    assert_eq!(std::fs::read(dest.join("main.go")).unwrap(), b"package main\n");
  }

  #[tokio::test]
  async fn unpack_rejects_garbage_archive() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("src");

    let result = unpack_source(b"not a tarball", ArchiveKind::TarGz, temp.path(), &dest).await;
    assert!(result.is_err());
  }
}
