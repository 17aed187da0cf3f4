use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::VisionError;

pub fn parse_checksum(content: &str) -> Result<(String, Option<String>), VisionError> {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| VisionError::ChecksumFormat("empty checksum file".to_string()))?;
    let mut parts = line.split_whitespace();
    let digest = parts
        .next()
        .map(|value| value.to_ascii_lowercase())
        .ok_or_else(|| VisionError::ChecksumFormat(line.to_string()))?;
    if digest.len() != 64 || !digest.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(VisionError::ChecksumFormat(line.to_string()));
    }
    let file_name = parts
        .next()
        .map(|value| value.trim_start_matches('*').to_string());
    Ok((digest, file_name))
}

pub fn sha256_file(path: &Path) -> Result<String, VisionError> {
    let mut file = File::open(path)
        .map_err(|err| VisionError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|err| VisionError::Filesystem(format!("read {}: {err}", path.display())))?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn verify(archive: &Path, checksum_file: &Path) -> Result<(), VisionError> {
    let content = std::fs::read_to_string(checksum_file).map_err(|err| {
        VisionError::Filesystem(format!("read {}: {err}", checksum_file.display()))
    })?;
    let (expected, _) = parse_checksum(&content)?;
    let actual = sha256_file(archive)?;
    if actual != expected {
        return Err(VisionError::ChecksumMismatch {
            file: archive
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // sha256("abc")
    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn parses_sha256sum_line() {
        let (digest, name) =
            parse_checksum(&format!("{}  BTCUSDT-trades-2024-01-01.zip\n", ABC.to_uppercase()))
                .unwrap();
        assert_eq!(digest, ABC);
        assert_eq!(name.as_deref(), Some("BTCUSDT-trades-2024-01-01.zip"));
    }

    #[test]
    fn rejects_short_digest() {
        let err = parse_checksum("abc123  file.zip").unwrap_err();
        assert_matches!(err, VisionError::ChecksumFormat(_));
    }

    #[test]
    fn verify_detects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.zip");
        let sum = dir.path().join("a.zip.CHECKSUM");
        std::fs::write(&archive, b"abc").unwrap();
        std::fs::write(&sum, format!("{ABC}  a.zip\n")).unwrap();
        verify(&archive, &sum).unwrap();

        std::fs::write(&archive, b"abd").unwrap();
        let err = verify(&archive, &sum).unwrap_err();
        assert_matches!(err, VisionError::ChecksumMismatch { .. });
    }
}
