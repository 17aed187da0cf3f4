use std::collections::HashSet;

use tracing::debug;

use crate::error::VisionError;
use crate::vision::VisionClient;

#[derive(Debug, Clone, Default)]
pub struct ListingSnapshot {
    file_names: HashSet<String>,
}

impl ListingSnapshot {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let file_names = keys
            .into_iter()
            .filter_map(|key| {
                let key = key.as_ref();
                let name = key.rsplit('/').next().unwrap_or(key);
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect();
        Self { file_names }
    }

    pub fn exists(&self, file_name: &str) -> bool {
        self.file_names.contains(file_name)
    }

    pub(crate) fn len(&self) -> usize {
        self.file_names.len()
    }
}

pub struct ListingCache<'a, C: VisionClient + ?Sized> {
    client: &'a C,
    prefix: String,
    snapshot: Option<ListingSnapshot>,
}

impl<'a, C: VisionClient + ?Sized> ListingCache<'a, C> {
    pub fn new(client: &'a C, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            snapshot: None,
        }
    }

    pub fn ensure_loaded(&mut self) -> Result<&ListingSnapshot, VisionError> {
        if self.snapshot.is_none() {
            let keys = self.client.list_objects(&self.prefix)?;
            let snapshot = ListingSnapshot::from_keys(&keys);
            debug!(prefix = %self.prefix, objects = snapshot.len(), "remote listing loaded");
            self.snapshot = Some(snapshot);
        }
        Ok(self.snapshot.get_or_insert_with(ListingSnapshot::default))
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct CountingClient {
        calls: Mutex<usize>,
    }

    impl VisionClient for CountingClient {
        fn list_objects(&self, prefix: &str) -> Result<Vec<String>, VisionError> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![format!("{prefix}BTCUSDT-trades-2024-01-01.zip")])
        }

        fn download(&self, key: &str, _destination: &Path) -> Result<(), VisionError> {
            Err(VisionError::ObjectNotFound(key.to_string()))
        }
    }

    #[test]
    fn lists_once_per_cache() {
        let client = CountingClient::default();
        let mut cache = ListingCache::new(&client, "data/spot/daily/trades/BTCUSDT/");
        assert!(!cache.is_loaded());

        for _ in 0..5 {
            let snapshot = cache.ensure_loaded().unwrap();
            assert!(snapshot.exists("BTCUSDT-trades-2024-01-01.zip"));
            assert!(!snapshot.exists("BTCUSDT-trades-2024-01-02.zip"));
        }
        assert_eq!(*client.calls.lock().unwrap(), 1);
    }

    #[test]
    fn snapshot_matches_whole_file_names_only() {
        let snapshot = ListingSnapshot::from_keys([
            "data/spot/daily/trades/BTCUSDT/BTCUSDT-trades-2024-01-01.zip.CHECKSUM",
        ]);
        assert!(!snapshot.exists("BTCUSDT-trades-2024-01-01.zip"));
        assert!(snapshot.exists("BTCUSDT-trades-2024-01-01.zip.CHECKSUM"));
    }
}
