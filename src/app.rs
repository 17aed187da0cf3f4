use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::daily::{DailyPlanner, DailyRequest};
use crate::domain::{DateWindow, Granularity, Symbol, TradingType, candidate_dates, parse_date};
use crate::error::VisionError;
use crate::exchange::ExchangeClient;
use crate::executor::BoundedExecutor;
use crate::monthly::{MonthlyPlanner, MonthlyRequest};
use crate::store::Store;
use crate::vision::VisionClient;

pub const FIRST_ARCHIVE_YEAR: i32 = 2017;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub submitted: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
    pub confirmed_absent: usize,
    pub outside_window: usize,
    pub previously_processed: usize,
    pub error: Option<String>,
}

impl SymbolReport {
    pub fn new(symbol: &Symbol) -> Self {
        Self {
            symbol: symbol.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn failed_with(symbol: &Symbol, error: &VisionError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(symbol)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub trading_type: Option<TradingType>,
    pub symbols: Option<Vec<String>>,
    pub dates: Option<Vec<String>>,
    pub years: Option<Vec<i32>>,
    pub months: Option<Vec<u32>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub skip_monthly: bool,
    pub skip_daily: bool,
    pub checksum: bool,
    pub verify_checksum: bool,
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub trading_type: TradingType,
    pub symbols: Option<Vec<Symbol>>,
    pub dates: Vec<NaiveDate>,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    pub window: DateWindow,
    pub date_range: Option<DateWindow>,
    pub monthly: bool,
    pub daily: bool,
    pub checksum: bool,
    pub verify_checksum: bool,
}

impl RunPlan {
    pub fn resolve(
        options: RunOptions,
        config: &ResolvedConfig,
        today: NaiveDate,
    ) -> Result<Self, VisionError> {
        let window = DateWindow::resolve(
            options.start_date.as_deref(),
            options.end_date.as_deref(),
            config.start_date,
            today,
        )?;
        let date_range = (options.start_date.is_some() && options.end_date.is_some())
            .then_some(window);

        let symbols = options
            .symbols
            .map(|values| {
                values
                    .iter()
                    .map(|value| value.parse::<Symbol>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let explicit_dates = options.dates.is_some();
        let dates = match options.dates {
            Some(values) => values
                .iter()
                .map(|value| parse_date(value))
                .collect::<Result<Vec<_>, _>>()?,
            None => candidate_dates(config.period_start_date, today),
        };

        let years = options
            .years
            .unwrap_or_else(|| (FIRST_ARCHIVE_YEAR..=today.year()).collect());
        let months = options.months.unwrap_or_else(|| (1..=12).collect());
        if let Some(month) = months.iter().find(|month| !(1..=12).contains(*month)) {
            return Err(VisionError::InvalidMonth(*month));
        }

        Ok(Self {
            trading_type: options.trading_type.unwrap_or(TradingType::Spot),
            symbols,
            dates,
            years,
            months,
            window,
            date_range,
            monthly: !options.skip_monthly && !explicit_dates,
            daily: !options.skip_daily,
            checksum: options.checksum,
            verify_checksum: options.verify_checksum,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub trading_type: TradingType,
    pub window: DateWindow,
    pub symbols: usize,
    pub monthly: Vec<SymbolReport>,
    pub daily: Vec<SymbolReport>,
    pub elapsed_ms: u128,
}

impl RunResult {
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.monthly
            .iter()
            .chain(self.daily.iter())
            .filter(|report| report.error.is_some())
            .map(|report| report.symbol.as_str())
            .collect()
    }
}

#[derive(Clone)]
pub struct App<V: VisionClient, E: ExchangeClient> {
    store: Store,
    vision: V,
    exchange: E,
    executor: BoundedExecutor,
}

impl<V: VisionClient, E: ExchangeClient> App<V, E> {
    pub fn new(store: Store, vision: V, exchange: E, executor: BoundedExecutor) -> Self {
        Self {
            store,
            vision,
            exchange,
            executor,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn resolve_symbols(
        &self,
        plan: &RunPlan,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Symbol>, VisionError> {
        match &plan.symbols {
            Some(symbols) => {
                sink.event(ProgressEvent::message(format!(
                    "fetching {} symbols from exchange",
                    symbols.len()
                )));
                Ok(symbols.clone())
            }
            None => {
                sink.event(ProgressEvent::message(format!(
                    "fetching all {} symbols from exchange",
                    plan.trading_type
                )));
                self.exchange.symbols(plan.trading_type)
            }
        }
    }

    pub fn run(&self, plan: &RunPlan, sink: &dyn ProgressSink) -> Result<RunResult, VisionError> {
        let start = Instant::now();
        self.store.ensure_root()?;
        let symbols = self.resolve_symbols(plan, sink)?;

        let monthly = if plan.monthly {
            let planner = MonthlyPlanner::new(&self.vision, &self.store, self.executor);
            planner.run(
                &MonthlyRequest {
                    trading_type: plan.trading_type,
                    symbols: &symbols,
                    years: &plan.years,
                    months: &plan.months,
                    window: plan.window,
                    date_range: plan.date_range,
                    checksum: plan.checksum,
                    verify_checksum: plan.verify_checksum,
                },
                sink,
            )
        } else {
            Vec::new()
        };

        let daily = if plan.daily {
            let planner = DailyPlanner::new(&self.vision, &self.store, self.executor);
            planner.run(
                &DailyRequest {
                    trading_type: plan.trading_type,
                    symbols: &symbols,
                    dates: &plan.dates,
                    window: plan.window,
                    date_range: plan.date_range,
                    checksum: plan.checksum,
                    verify_checksum: plan.verify_checksum,
                },
                sink,
            )
        } else {
            Vec::new()
        };

        let elapsed = start.elapsed();
        sink.event(ProgressEvent {
            message: format!("finished {} symbols", symbols.len()),
            elapsed: Some(elapsed),
        });

        Ok(RunResult {
            trading_type: plan.trading_type,
            window: plan.window,
            symbols: symbols.len(),
            monthly,
            daily,
            elapsed_ms: elapsed.as_millis(),
        })
    }
}

pub(crate) fn start_message(index: usize, total: usize, granularity: Granularity, symbol: &Symbol) -> String {
    format!(
        "[{}/{}] - start download {} {} trades",
        index + 1,
        total,
        granularity,
        symbol
    )
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::{Config, ConfigLoader};

    fn config() -> ResolvedConfig {
        ConfigLoader::resolve_config(Config::default()).unwrap()
    }

    fn date(value: &str) -> NaiveDate {
        parse_date(value).unwrap()
    }

    #[test]
    fn defaults_cover_archive_history() {
        let plan = RunPlan::resolve(RunOptions::default(), &config(), date("2024-03-10")).unwrap();
        assert_eq!(plan.trading_type, TradingType::Spot);
        assert_eq!(plan.window.start(), date("2017-01-01"));
        assert_eq!(plan.window.end(), date("2024-03-09"));
        assert_eq!(plan.years.first(), Some(&2017));
        assert_eq!(plan.years.last(), Some(&2024));
        assert_eq!(plan.months.len(), 12);
        assert_eq!(plan.dates.first(), Some(&date("2020-01-01")));
        assert_eq!(plan.dates.last(), Some(&date("2024-03-09")));
        assert!(plan.date_range.is_none());
        assert!(plan.monthly && plan.daily);
    }

    #[test]
    fn explicit_dates_skip_monthly_pass() {
        let options = RunOptions {
            dates: Some(vec!["2024-01-05".to_string()]),
            ..RunOptions::default()
        };
        let plan = RunPlan::resolve(options, &config(), date("2024-03-10")).unwrap();
        assert!(!plan.monthly);
        assert_eq!(plan.dates, vec![date("2024-01-05")]);
    }

    #[test]
    fn explicit_window_sets_date_range() {
        let options = RunOptions {
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
            ..RunOptions::default()
        };
        let plan = RunPlan::resolve(options, &config(), date("2024-03-10")).unwrap();
        assert_eq!(plan.date_range, Some(plan.window));
    }

    #[test]
    fn invalid_month_is_rejected() {
        let options = RunOptions {
            months: Some(vec![1, 13]),
            ..RunOptions::default()
        };
        let err = RunPlan::resolve(options, &config(), date("2024-03-10")).unwrap_err();
        assert_matches!(err, VisionError::InvalidMonth(13));
    }

    #[test]
    fn start_message_format() {
        let symbol: Symbol = "BTCUSDT".parse().unwrap();
        assert_eq!(
            start_message(0, 3, Granularity::Daily, &symbol),
            "[1/3] - start download daily BTCUSDT trades"
        );
    }
}
