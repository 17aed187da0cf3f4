use std::collections::HashSet;
use std::fs;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Symbol, date_key, parse_date};
use crate::error::VisionError;
use crate::store::Store;

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    processed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressLedger {
    dates: Vec<NaiveDate>,
    index: HashSet<NaiveDate>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.index.contains(&date)
    }

    pub fn record(&mut self, date: NaiveDate) -> bool {
        if !self.index.insert(date) {
            return false;
        }
        self.dates.push(date);
        true
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<NaiveDate> for ProgressLedger {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        let mut ledger = Self::new();
        for date in iter {
            ledger.record(date);
        }
        ledger
    }
}

#[derive(Debug, Clone)]
pub struct LedgerStore {
    store: Store,
}

impl LedgerStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn load(&self, symbol: &Symbol) -> ProgressLedger {
        let path = self.store.ledger_path(symbol);
        if !path.as_std_path().exists() {
            debug!(symbol = %symbol, "no progress ledger yet");
            return ProgressLedger::new();
        }
        let content = match fs::read_to_string(path.as_std_path()) {
            Ok(content) => content,
            Err(err) => {
                warn!(symbol = %symbol, path = %path, error = %err, "unreadable progress ledger, starting fresh");
                return ProgressLedger::new();
            }
        };
        let file: LedgerFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(err) => {
                warn!(symbol = %symbol, path = %path, error = %err, "corrupt progress ledger, starting fresh");
                return ProgressLedger::new();
            }
        };
        file.processed
            .iter()
            .filter_map(|key| match parse_date(key) {
                Ok(date) => Some(date),
                Err(_) => {
                    warn!(symbol = %symbol, key = %key, "dropping malformed ledger entry");
                    None
                }
            })
            .collect()
    }

    pub fn save(&self, symbol: &Symbol, ledger: &ProgressLedger) -> Result<(), VisionError> {
        let file = LedgerFile {
            symbol: Some(symbol.as_str().to_string()),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
            processed: ledger.dates().iter().map(|date| date_key(*date)).collect(),
        };
        let content = serde_json::to_vec_pretty(&file)
            .map_err(|err| VisionError::Filesystem(err.to_string()))?;
        Store::write_bytes_atomic(&self.store.ledger_path(symbol), &content)
    }
}
