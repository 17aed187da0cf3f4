use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile};

use crate::domain::{DateWindow, Symbol};
use crate::error::VisionError;

const LEDGER_SUFFIX: &str = "progress.json";

#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn current_dir() -> Result<Self, VisionError> {
        let cwd = std::env::current_dir().map_err(|err| VisionError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| VisionError::Filesystem("invalid working directory path".to_string()))?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<(), VisionError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| VisionError::Filesystem(err.to_string()))
    }

    pub fn archive_dir(&self, remote_prefix: &str, date_range: Option<&DateWindow>) -> Utf8PathBuf {
        let dir = self.root.join(remote_prefix.trim_matches('/'));
        match date_range {
            Some(window) => dir.join(window.dir_name()),
            None => dir,
        }
    }

    pub fn archive_path(
        &self,
        remote_prefix: &str,
        date_range: Option<&DateWindow>,
        file_name: &str,
    ) -> Utf8PathBuf {
        self.archive_dir(remote_prefix, date_range).join(file_name)
    }

    pub fn ledger_path(&self, symbol: &Symbol) -> Utf8PathBuf {
        self.root.join(format!("{}.{LEDGER_SUFFIX}", symbol.as_str()))
    }

    pub fn stage_file(dest: &Utf8Path) -> Result<NamedTempFile, VisionError> {
        let parent = dest
            .parent()
            .ok_or_else(|| VisionError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| VisionError::Filesystem(err.to_string()))?;
        Builder::new()
            .prefix(".vision-trades")
            .suffix(".part")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| VisionError::Filesystem(err.to_string()))
    }

    pub fn commit_file(staged: NamedTempFile, dest: &Utf8Path) -> Result<(), VisionError> {
        staged
            .persist(dest.as_std_path())
            .map_err(|err| VisionError::Filesystem(format!("persist {dest}: {}", err.error)))?;
        Ok(())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), VisionError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| VisionError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| VisionError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| VisionError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn remove_file(path: &Utf8Path) -> Result<(), VisionError> {
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| VisionError::Filesystem(format!("remove {path}: {err}")))?;
        }
        Ok(())
    }
}
