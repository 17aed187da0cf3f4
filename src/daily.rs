use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::app::{ProgressEvent, ProgressSink, SymbolReport, start_message};
use crate::domain::{DATA_KIND, DateWindow, FetchCell, Granularity, Symbol, TradingType, resolve_path};
use crate::error::VisionError;
use crate::executor::BoundedExecutor;
use crate::ledger::{LedgerStore, ProgressLedger};
use crate::listing::ListingCache;
use crate::store::Store;
use crate::transfer::{self, FetchTask, TransferOutcome};
use crate::vision::VisionClient;

#[derive(Debug, Clone)]
pub struct DailyRequest<'a> {
    pub trading_type: TradingType,
    pub symbols: &'a [Symbol],
    pub dates: &'a [NaiveDate],
    pub window: DateWindow,
    pub date_range: Option<DateWindow>,
    pub checksum: bool,
    pub verify_checksum: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DailyPlan {
    pub tasks: Vec<FetchTask>,
    pub absent: Vec<NaiveDate>,
    pub outside_window: Vec<NaiveDate>,
    pub previously_processed: usize,
}

pub fn plan_symbol<C: VisionClient + ?Sized>(
    request: &DailyRequest<'_>,
    symbol: &Symbol,
    ledger: &ProgressLedger,
    listing: &mut ListingCache<'_, C>,
) -> Result<DailyPlan, VisionError> {
    let mut plan = DailyPlan::default();
    for &date in request.dates {
        if ledger.contains(date) {
            plan.previously_processed += 1;
            continue;
        }
        let cell = FetchCell::daily(symbol.clone(), date);
        let snapshot = listing.ensure_loaded()?;
        if !snapshot.exists(&cell.file_name()) {
            plan.absent.push(date);
            continue;
        }
        if !request.window.contains(date) {
            plan.outside_window.push(date);
            continue;
        }
        plan.tasks.push(FetchTask::archive(
            cell,
            request.trading_type,
            request.date_range,
            request.checksum,
            request.verify_checksum,
        ));
    }
    Ok(plan)
}

pub struct DailyPlanner<'a, C: VisionClient + ?Sized> {
    client: &'a C,
    store: &'a Store,
    ledgers: LedgerStore,
    executor: BoundedExecutor,
}

impl<'a, C: VisionClient + ?Sized> DailyPlanner<'a, C> {
    pub fn new(client: &'a C, store: &'a Store, executor: BoundedExecutor) -> Self {
        Self {
            client,
            store,
            ledgers: LedgerStore::new(store.clone()),
            executor,
        }
    }

    pub fn run(&self, request: &DailyRequest<'_>, sink: &dyn ProgressSink) -> Vec<SymbolReport> {
        let total = request.symbols.len();
        sink.event(ProgressEvent::message(format!("Found {total} symbols")));

        request
            .symbols
            .iter()
            .enumerate()
            .map(|(index, symbol)| {
                sink.event(ProgressEvent::message(start_message(
                    index,
                    total,
                    Granularity::Daily,
                    symbol,
                )));
                self.run_symbol(request, symbol).unwrap_or_else(|err| {
                    error!(symbol = %symbol, error = %err, "daily pass aborted");
                    SymbolReport::failed_with(symbol, &err)
                })
            })
            .collect()
    }

    pub fn run_symbol(
        &self,
        request: &DailyRequest<'_>,
        symbol: &Symbol,
    ) -> Result<SymbolReport, VisionError> {
        let mut ledger = self.ledgers.load(symbol);
        let prefix = resolve_path(request.trading_type, DATA_KIND, Granularity::Daily, symbol);
        let mut listing = ListingCache::new(self.client, prefix);
        let plan = plan_symbol(request, symbol, &ledger, &mut listing)?;

        let mut report = SymbolReport::new(symbol);
        report.submitted = plan.tasks.len();
        report.confirmed_absent = plan.absent.len();
        report.outside_window = plan.outside_window.len();
        report.previously_processed = plan.previously_processed;

        self.executor.run(
            plan.tasks,
            |task| transfer::perform(self.client, self.store, task),
            |task, result| match result {
                Ok(outcome) => {
                    match outcome {
                        TransferOutcome::Downloaded => report.downloaded += 1,
                        TransferOutcome::AlreadyPresent => report.already_present += 1,
                    }
                    ledger.record(task.cell.anchor_date());
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(symbol = %symbol, file = %task.file.file_name, error = %err, "daily download failed");
                }
            },
        )?;

        for date in plan.absent {
            ledger.record(date);
        }
        self.ledgers.save(symbol, &ledger)?;

        info!(
            symbol = %symbol,
            submitted = report.submitted,
            downloaded = report.downloaded,
            already_present = report.already_present,
            failed = report.failed,
            confirmed_absent = report.confirmed_absent,
            outside_window = report.outside_window,
            processed = ledger.len(),
            "daily pass finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::parse_date;

    struct ListingOnly {
        keys: Vec<String>,
        calls: Mutex<usize>,
    }

    impl VisionClient for ListingOnly {
        fn list_objects(&self, _prefix: &str) -> Result<Vec<String>, VisionError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.keys.clone())
        }

        fn download(&self, key: &str, _destination: &Path) -> Result<(), VisionError> {
            Err(VisionError::ObjectNotFound(key.to_string()))
        }
    }

    fn date(value: &str) -> NaiveDate {
        parse_date(value).unwrap()
    }

    #[test]
    fn plan_separates_present_absent_and_out_of_window() {
        let symbols: Vec<Symbol> = vec!["BTCUSDT".parse().unwrap()];
        let dates = vec![
            date("2024-01-01"),
            date("2024-01-02"),
            date("2024-01-03"),
            date("2024-01-04"),
        ];
        let request = DailyRequest {
            trading_type: TradingType::Spot,
            symbols: &symbols,
            dates: &dates,
            window: DateWindow::new(date("2024-01-01"), date("2024-01-03")).unwrap(),
            date_range: None,
            checksum: true,
            verify_checksum: false,
        };
        let client = ListingOnly {
            keys: vec![
                "data/spot/daily/trades/BTCUSDT/BTCUSDT-trades-2024-01-02.zip".to_string(),
                "data/spot/daily/trades/BTCUSDT/BTCUSDT-trades-2024-01-03.zip".to_string(),
                "data/spot/daily/trades/BTCUSDT/BTCUSDT-trades-2024-01-04.zip".to_string(),
            ],
            calls: Mutex::new(0),
        };
        let ledger: ProgressLedger = [date("2024-01-03")].into_iter().collect();
        let mut listing = ListingCache::new(&client, "data/spot/daily/trades/BTCUSDT/");

        let plan = plan_symbol(&request, &symbols[0], &ledger, &mut listing).unwrap();

        let planned: HashSet<_> = plan.tasks.iter().map(|task| task.cell.anchor_date()).collect();
        assert_eq!(planned, HashSet::from([date("2024-01-02")]));
        assert!(plan.tasks[0].checksum.is_some());
        assert_eq!(plan.absent, vec![date("2024-01-01")]);
        assert_eq!(plan.outside_window, vec![date("2024-01-04")]);
        assert_eq!(plan.previously_processed, 1);
        assert_eq!(*client.calls.lock().unwrap(), 1);
    }

    #[test]
    fn fully_processed_symbol_is_never_listed() {
        let symbols: Vec<Symbol> = vec!["BTCUSDT".parse().unwrap()];
        let dates = vec![date("2024-01-01"), date("2024-01-02")];
        let request = DailyRequest {
            trading_type: TradingType::Spot,
            symbols: &symbols,
            dates: &dates,
            window: DateWindow::new(date("2024-01-01"), date("2024-01-02")).unwrap(),
            date_range: None,
            checksum: false,
            verify_checksum: false,
        };
        let client = ListingOnly {
            keys: Vec::new(),
            calls: Mutex::new(0),
        };
        let ledger: ProgressLedger = dates.iter().copied().collect();
        let mut listing = ListingCache::new(&client, "data/spot/daily/trades/BTCUSDT/");

        let plan = plan_symbol(&request, &symbols[0], &ledger, &mut listing).unwrap();

        assert!(plan.tasks.is_empty());
        assert!(!listing.is_loaded());
        assert_eq!(*client.calls.lock().unwrap(), 0);
    }
}
