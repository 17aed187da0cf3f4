use serde::Serialize;
use tracing::{debug, warn};

use crate::checksum;
use crate::domain::{DateWindow, FetchCell, TradingType};
use crate::error::VisionError;
use crate::store::Store;
use crate::vision::VisionClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub prefix: String,
    pub file_name: String,
}

impl RemoteFile {
    pub fn key(&self) -> String {
        format!("{}{}", self.prefix, self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub cell: FetchCell,
    pub file: RemoteFile,
    pub checksum: Option<RemoteFile>,
    pub date_range: Option<DateWindow>,
    pub verify_checksum: bool,
}

impl FetchTask {
    pub fn archive(
        cell: FetchCell,
        trading_type: TradingType,
        date_range: Option<DateWindow>,
        with_checksum: bool,
        verify_checksum: bool,
    ) -> Self {
        let prefix = cell.remote_prefix(trading_type);
        let checksum = with_checksum.then(|| RemoteFile {
            prefix: prefix.clone(),
            file_name: cell.checksum_file_name(),
        });
        let file = RemoteFile {
            prefix,
            file_name: cell.file_name(),
        };
        Self {
            cell,
            file,
            checksum,
            date_range,
            verify_checksum: verify_checksum && with_checksum,
        }
    }

    pub fn checksum_only(
        cell: FetchCell,
        trading_type: TradingType,
        date_range: Option<DateWindow>,
    ) -> Self {
        let file = RemoteFile {
            prefix: cell.remote_prefix(trading_type),
            file_name: cell.checksum_file_name(),
        };
        Self {
            cell,
            file,
            checksum: None,
            date_range,
            verify_checksum: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Downloaded,
    AlreadyPresent,
}

pub fn perform<C: VisionClient + ?Sized>(
    client: &C,
    store: &Store,
    task: &FetchTask,
) -> Result<TransferOutcome, VisionError> {
    let outcome = fetch_file(client, store, &task.file, task.date_range.as_ref())?;
    if let Some(checksum_file) = &task.checksum {
        match fetch_file(client, store, checksum_file, task.date_range.as_ref()) {
            Ok(_) => {}
            // Without verification the archive alone completes the task.
            Err(VisionError::ObjectNotFound(key)) if !task.verify_checksum => {
                warn!(key = %key, "checksum file not published");
                return Ok(outcome);
            }
            Err(err) => return Err(err),
        }
        if task.verify_checksum {
            let archive =
                store.archive_path(&task.file.prefix, task.date_range.as_ref(), &task.file.file_name);
            let sum = store.archive_path(
                &checksum_file.prefix,
                task.date_range.as_ref(),
                &checksum_file.file_name,
            );
            if let Err(err) = checksum::verify(archive.as_std_path(), sum.as_std_path()) {
                Store::remove_file(&archive)?;
                return Err(err);
            }
        }
    }
    Ok(outcome)
}

fn fetch_file<C: VisionClient + ?Sized>(
    client: &C,
    store: &Store,
    file: &RemoteFile,
    date_range: Option<&DateWindow>,
) -> Result<TransferOutcome, VisionError> {
    let dest = store.archive_path(&file.prefix, date_range, &file.file_name);
    if dest.as_std_path().exists() {
        debug!(path = %dest, "already downloaded");
        return Ok(TransferOutcome::AlreadyPresent);
    }
    let staged = Store::stage_file(&dest)?;
    client.download(&file.key(), staged.path())?;
    Store::commit_file(staged, &dest)?;
    debug!(path = %dest, "downloaded");
    Ok(TransferOutcome::Downloaded)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;
    use sha2::{Digest, Sha256};

    use super::*;
    use crate::domain::parse_date;

    #[derive(Default)]
    struct MapClient {
        objects: HashMap<String, Vec<u8>>,
        downloads: Mutex<Vec<String>>,
    }

    impl VisionClient for MapClient {
        fn list_objects(&self, _prefix: &str) -> Result<Vec<String>, VisionError> {
            Ok(self.objects.keys().cloned().collect())
        }

        fn download(&self, key: &str, destination: &Path) -> Result<(), VisionError> {
            self.downloads.lock().unwrap().push(key.to_string());
            let bytes = self
                .objects
                .get(key)
                .ok_or_else(|| VisionError::ObjectNotFound(key.to_string()))?;
            std::fs::write(destination, bytes).unwrap();
            Ok(())
        }
    }

    fn store(dir: &tempfile::TempDir) -> Store {
        Store::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())
    }

    fn daily_task(with_checksum: bool, verify: bool) -> FetchTask {
        let cell = FetchCell::daily("BTCUSDT".parse().unwrap(), parse_date("2024-01-01").unwrap());
        FetchTask::archive(cell, TradingType::Spot, None, with_checksum, verify)
    }

    #[test]
    fn second_run_finds_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = daily_task(false, false);
        let mut client = MapClient::default();
        client.objects.insert(task.file.key(), b"zip".to_vec());

        assert_eq!(
            perform(&client, &store, &task).unwrap(),
            TransferOutcome::Downloaded
        );
        assert_eq!(
            perform(&client, &store, &task).unwrap(),
            TransferOutcome::AlreadyPresent
        );
        assert_eq!(client.downloads.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = daily_task(false, false);
        let client = MapClient::default();

        let err = perform(&client, &store, &task).unwrap_err();
        assert_matches!(err, VisionError::ObjectNotFound(_));
        let dest = store.archive_path(&task.file.prefix, None, &task.file.file_name);
        assert!(!dest.as_std_path().exists());
    }

    #[test]
    fn checksum_mismatch_removes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = daily_task(true, true);
        let checksum_file = task.checksum.clone().unwrap();
        let digest = format!("{:x}", Sha256::digest(b"expected bytes"));

        let mut client = MapClient::default();
        client.objects.insert(task.file.key(), b"tampered bytes".to_vec());
        client.objects.insert(
            checksum_file.key(),
            format!("{digest}  {}\n", task.file.file_name).into_bytes(),
        );

        let err = perform(&client, &store, &task).unwrap_err();
        assert_matches!(err, VisionError::ChecksumMismatch { .. });
        let dest = store.archive_path(&task.file.prefix, None, &task.file.file_name);
        assert!(!dest.as_std_path().exists());
    }

    #[test]
    fn checksum_match_keeps_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = daily_task(true, true);
        let checksum_file = task.checksum.clone().unwrap();
        let digest = format!("{:x}", Sha256::digest(b"archive"));

        let mut client = MapClient::default();
        client.objects.insert(task.file.key(), b"archive".to_vec());
        client.objects.insert(
            checksum_file.key(),
            format!("{digest}  {}\n", task.file.file_name).into_bytes(),
        );

        perform(&client, &store, &task).unwrap();
        let sum = store.archive_path(&checksum_file.prefix, None, &checksum_file.file_name);
        assert!(sum.as_std_path().exists());
    }

    #[test]
    fn missing_checksum_sibling_is_tolerated_without_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = daily_task(true, false);
        let mut client = MapClient::default();
        client.objects.insert(task.file.key(), b"archive".to_vec());

        assert_eq!(
            perform(&client, &store, &task).unwrap(),
            TransferOutcome::Downloaded
        );
        assert_eq!(
            perform(&client, &store, &task).unwrap(),
            TransferOutcome::AlreadyPresent
        );
    }

    #[test]
    fn missing_checksum_sibling_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let task = daily_task(true, true);
        let mut client = MapClient::default();
        client.objects.insert(task.file.key(), b"archive".to_vec());

        let err = perform(&client, &store, &task).unwrap_err();
        assert_matches!(err, VisionError::ObjectNotFound(_));
    }
}
