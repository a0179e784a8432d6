//! Fetching a [`fuzzctl_core::Source`] with integrity verification and retry.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio_stream::StreamExt;

use crate::error::{ObjectStoreError, Result};

/// Downloads `url` to `dest`, retrying transient failures up to `retries` times,
/// then verifies the result against `expected_sha256`.
///
/// The file is written to a sibling temp path and renamed into place only once
/// the hash check passes, so a caller never observes a partially-written or
/// corrupt artifact at `dest`.
pub async fn download_verified(
	client: &reqwest::Client,
	url: &str,
	dest: &Path,
	expected_sha256: &str,
	retries: u32,
) -> Result<PathBuf> {
	let mut last_err = None;
	for attempt in 0..=retries {
		match try_download(client, url, dest, expected_sha256).await {
			Ok(path) => return Ok(path),
			Err(err) => {
				tracing::warn!(url, attempt, error = %err, "download attempt failed");
				last_err = Some(err);
			}
		}
	}
	Err(last_err.expect("loop runs at least once"))
}

async fn try_download(
	client: &reqwest::Client,
	url: &str,
	dest: &Path,
	expected_sha256: &str,
) -> Result<PathBuf> {
	let response = client
		.get(url)
		.send()
		.await
		.and_then(|r| r.error_for_status())
		.map_err(|source| ObjectStoreError::Download {
			url: url.to_string(),
			source,
		})?;

	let tmp_path = dest.with_extension("part");
	if let Some(parent) = tmp_path.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}
	let mut file = tokio::fs::File::create(&tmp_path).await?;
	let mut hasher = Sha256::new();
	let mut stream = response.bytes_stream();

	use tokio::io::AsyncWriteExt;
	while let Some(chunk) = stream.next().await {
		let chunk = chunk.map_err(|source| ObjectStoreError::Download {
			url: url.to_string(),
			source,
		})?;
		hasher.update(&chunk);
		file.write_all(&chunk).await?;
	}
	file.flush().await?;
	drop(file);

	let actual = hex::encode(hasher.finalize());
	if !actual.eq_ignore_ascii_case(expected_sha256) {
		tokio::fs::remove_file(&tmp_path).await.ok();
		return Err(ObjectStoreError::HashMismatch {
			url: url.to_string(),
			expected: expected_sha256.to_string(),
			actual,
		});
	}

	tokio::fs::rename(&tmp_path, dest).await?;
	Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
	use super::*;
	use sha2::{Digest, Sha256};

	#[test]
	fn hash_of_known_bytes_matches_expected() {
		let mut hasher = Sha256::new();
		hasher.update(b"hello");
		let digest = hex::encode(hasher.finalize());
		assert_eq!(
			digest,
			"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
		);
	}
}
