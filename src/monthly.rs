use tracing::{error, info, warn};

use crate::app::{ProgressEvent, ProgressSink, SymbolReport, start_message};
use crate::domain::{DateWindow, FetchCell, Granularity, Symbol, TradingType};
use crate::error::VisionError;
use crate::executor::BoundedExecutor;
use crate::store::Store;
use crate::transfer::{self, FetchTask, TransferOutcome};
use crate::vision::VisionClient;

#[derive(Debug, Clone)]
pub struct MonthlyRequest<'a> {
    pub trading_type: TradingType,
    pub symbols: &'a [Symbol],
    pub years: &'a [i32],
    pub months: &'a [u32],
    pub window: DateWindow,
    pub date_range: Option<DateWindow>,
    pub checksum: bool,
    pub verify_checksum: bool,
}

pub fn plan_symbol(request: &MonthlyRequest<'_>, symbol: &Symbol) -> Vec<FetchTask> {
    let mut tasks = Vec::new();
    for &year in request.years {
        for &month in request.months {
            let cell = match FetchCell::monthly(symbol.clone(), year, month) {
                Ok(cell) => cell,
                Err(err) => {
                    warn!(symbol = %symbol, year, month, error = %err, "skipping monthly cell");
                    continue;
                }
            };
            if !request.window.contains(cell.anchor_date()) {
                continue;
            }
            // Verification needs the archive and its checksum in one task.
            if request.checksum && request.verify_checksum {
                tasks.push(FetchTask::archive(
                    cell,
                    request.trading_type,
                    request.date_range,
                    true,
                    true,
                ));
                continue;
            }
            if request.checksum {
                tasks.push(FetchTask::checksum_only(
                    cell.clone(),
                    request.trading_type,
                    request.date_range,
                ));
            }
            tasks.push(FetchTask::archive(
                cell,
                request.trading_type,
                request.date_range,
                false,
                false,
            ));
        }
    }
    tasks
}

pub struct MonthlyPlanner<'a, C: VisionClient + ?Sized> {
    client: &'a C,
    store: &'a Store,
    executor: BoundedExecutor,
}

impl<'a, C: VisionClient + ?Sized> MonthlyPlanner<'a, C> {
    pub fn new(client: &'a C, store: &'a Store, executor: BoundedExecutor) -> Self {
        Self {
            client,
            store,
            executor,
        }
    }

    pub fn run(&self, request: &MonthlyRequest<'_>, sink: &dyn ProgressSink) -> Vec<SymbolReport> {
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
                    Granularity::Monthly,
                    symbol,
                )));
                self.run_symbol(request, symbol).unwrap_or_else(|err| {
                    error!(symbol = %symbol, error = %err, "monthly pass aborted");
                    SymbolReport::failed_with(symbol, &err)
                })
            })
            .collect()
    }

    pub fn run_symbol(
        &self,
        request: &MonthlyRequest<'_>,
        symbol: &Symbol,
    ) -> Result<SymbolReport, VisionError> {
        let tasks = plan_symbol(request, symbol);
        let mut report = SymbolReport::new(symbol);
        report.submitted = tasks.len();

        self.executor.run(
            tasks,
            |task| transfer::perform(self.client, self.store, task),
            |task, result| match result {
                Ok(TransferOutcome::Downloaded) => report.downloaded += 1,
                Ok(TransferOutcome::AlreadyPresent) => report.already_present += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(symbol = %symbol, file = %task.file.file_name, error = %err, "monthly download failed");
                }
            },
        )?;

        info!(
            symbol = %symbol,
            submitted = report.submitted,
            downloaded = report.downloaded,
            already_present = report.already_present,
            failed = report.failed,
            "monthly pass finished"
        );
        Ok(report)
    }
}
