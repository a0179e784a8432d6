//! Archive extraction with magic-byte format detection.
//!
//! Sources are declared by URL, not by a trusted extension; the only safe way
//! to know what `tar::Archive` vs `zip::ZipArchive` to hand the bytes to is to
//! look at the leading bytes.

use std::fs::File;
use std::path::Path;

use crate::error::{ObjectStoreError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
	GzipTar,
	Zip,
}

fn sniff(path: &Path) -> Result<ArchiveFormat> {
	let mut file = File::open(path)?;
	let mut header = [0u8; 4];
	use std::io::Read;
	let read = file.read(&mut header)?;
	if read >= 2 && header[..2] == GZIP_MAGIC {
		Ok(ArchiveFormat::GzipTar)
	} else if read == 4 && header == ZIP_MAGIC {
		Ok(ArchiveFormat::Zip)
	} else {
		Err(ObjectStoreError::UnknownArchiveFormat {
			path: path.display().to_string(),
		})
	}
}

/// Extracts `archive` into `dest`, creating `dest` if it does not exist.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
	std::fs::create_dir_all(dest)?;
	match sniff(archive)? {
		ArchiveFormat::GzipTar => extract_gzip_tar(archive, dest),
		ArchiveFormat::Zip => extract_zip(archive, dest),
	}
}

fn extract_gzip_tar(archive: &Path, dest: &Path) -> Result<()> {
	let file = File::open(archive)?;
	let decoder = flate2::read::GzDecoder::new(file);
	let mut tar = tar::Archive::new(decoder);
	tar.unpack(dest).map_err(ObjectStoreError::Extract)
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
	let file = File::open(archive)?;
	let mut zip = zip::ZipArchive::new(file).map_err(|err| ObjectStoreError::Extract(err.into()))?;
	zip.extract(dest).map_err(|err| ObjectStoreError::Extract(err.into()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn sniff_rejects_plain_text() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("not-an-archive.txt");
		std::fs::write(&path, b"hello world").unwrap();
		assert!(matches!(
			sniff(&path),
			Err(ObjectStoreError::UnknownArchiveFormat { .. })
		));
	}

	#[test]
	fn sniff_detects_gzip_by_magic_bytes() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("a.tar.gz");
		let file = File::create(&path).unwrap();
		let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
		encoder.write_all(b"payload").unwrap();
		encoder.finish().unwrap();
		assert_eq!(sniff(&path).unwrap(), ArchiveFormat::GzipTar);
	}

	#[test]
	fn extract_gzip_tar_round_trips_a_file() {
		let src_dir = tempfile::tempdir().unwrap();
		std::fs::write(src_dir.path().join("seed.txt"), b"seed-data").unwrap();

		let archive_path = tempfile::tempdir().unwrap().path().join("out.tar.gz");
		std::fs::create_dir_all(archive_path.parent().unwrap()).unwrap();
		let file = File::create(&archive_path).unwrap();
		let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
		let mut builder = tar::Builder::new(encoder);
		builder.append_dir_all(".", src_dir.path()).unwrap();
		builder.into_inner().unwrap().finish().unwrap();

		let dest = tempfile::tempdir().unwrap();
		extract_archive(&archive_path, dest.path()).unwrap();
		assert_eq!(
			std::fs::read_to_string(dest.path().join("seed.txt")).unwrap(),
			"seed-data"
		);
	}
}
