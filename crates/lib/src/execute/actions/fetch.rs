//! Archive download with SHA-256 verification.

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::execute::types::StepError;
use crate::util::hash::{sha256_bytes, sha256_file};

/// Download `url` to `dest` unless `dest` already holds the expected content.
///
/// The body is verified before it is written; a mismatching download leaves
/// `dest` untouched. Hex digests compare case-insensitively.
pub async fn download(url: &str, expected_sha256: &str, dest: &Path) -> Result<(), StepError> {
  if dest.is_file() {
    match sha256_file(dest) {
      Ok(actual) if actual.eq_ignore_ascii_case(expected_sha256) => {
        info!(path = %dest.display(), "archive already downloaded");
        return Ok(());
      }
      Ok(actual) => debug!(expected = %expected_sha256, actual = %actual, "cached archive differs, downloading again"),
      Err(err) => debug!(error = %err, "cannot hash cached archive, downloading again"),
    }
  }

  info!(url = %url, "downloading");
  let fetch_failed = |message: String| StepError::FetchFailed {
    url: url.to_string(),
    message,
  };

  let response = reqwest::get(url).await.map_err(|e| fetch_failed(e.to_string()))?;
  if !response.status().is_success() {
    return Err(fetch_failed(format!("HTTP {}", response.status())));
  }
  let bytes = response.bytes().await.map_err(|e| fetch_failed(e.to_string()))?;

  let actual = sha256_bytes(&bytes);
  if !actual.eq_ignore_ascii_case(expected_sha256) {
    return Err(StepError::HashMismatch {
      path: dest.to_path_buf(),
      expected: expected_sha256.to_string(),
      actual,
    });
  }

  let parent = dest.parent().unwrap_or(Path::new("."));
  tokio::fs::create_dir_all(parent)
    .await
    .map_err(|e| StepError::io(parent, e))?;

  // Write next to the destination, then move it in place.
  let partial = dest.with_extension("part");
  let mut file = tokio::fs::File::create(&partial)
    .await
    .map_err(|e| StepError::io(&partial, e))?;
  file.write_all(&bytes).await.map_err(|e| StepError::io(&partial, e))?;
  file.flush().await.map_err(|e| StepError::io(&partial, e))?;
  drop(file);
  tokio::fs::rename(&partial, dest)
    .await
    .map_err(|e| StepError::io(dest, e))?;

  info!(path = %dest.display(), size = bytes.len(), "download complete");
  Ok(())
}
