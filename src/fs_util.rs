use std::fs;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::VisionError;

pub fn validate_zip(zip_path: &Path) -> Result<(), VisionError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        VisionError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| VisionError::CorruptArchive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| VisionError::CorruptArchive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| VisionError::CorruptArchive(err.to_string()))?;
    }
    Ok(())
}

pub(crate) fn is_zip_name(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".zip")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn valid_archive_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.zip");
        let file = fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("trades.csv", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"1,0.1,2.0,1700000000000,true,true\n").unwrap();
        writer.finish().unwrap();

        validate_zip(&path).unwrap();
    }

    #[test]
    fn truncated_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.zip");
        fs::write(&path, b"PK\x03\x04not really a zip").unwrap();

        let err = validate_zip(&path).unwrap_err();
        assert_matches!(err, VisionError::CorruptArchive(_));
    }

    #[test]
    fn zip_names() {
        assert!(is_zip_name("BTCUSDT-trades-2024-01.zip"));
        assert!(!is_zip_name("BTCUSDT-trades-2024-01.zip.CHECKSUM"));
    }
}
