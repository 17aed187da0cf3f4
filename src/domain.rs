use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::VisionError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATA_KIND: &str = "trades";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TradingType {
    Spot,
    Um,
    Cm,
}

impl TradingType {
    fn path_root(&self) -> &'static str {
        match self {
            TradingType::Spot => "data/spot",
            TradingType::Um => "data/futures/um",
            TradingType::Cm => "data/futures/cm",
        }
    }
}

impl fmt::Display for TradingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingType::Spot => write!(f, "spot"),
            TradingType::Um => write!(f, "um"),
            TradingType::Cm => write!(f, "cm"),
        }
    }
}

impl FromStr for TradingType {
    type Err = VisionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spot" => Ok(TradingType::Spot),
            "um" => Ok(TradingType::Um),
            "cm" => Ok(TradingType::Cm),
            _ => Err(VisionError::InvalidTradingType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Daily,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Daily => "daily",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = VisionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(VisionError::InvalidSymbol(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, VisionError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| VisionError::InvalidDate(value.to_string()))
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, VisionError> {
        if start > end {
            return Err(VisionError::InvalidWindow {
                start: date_key(start),
                end: date_key(end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        default_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self, VisionError> {
        let start = start.map(parse_date).transpose()?.unwrap_or(default_start);
        let end = match end {
            Some(value) => parse_date(value)?,
            None => yesterday(today),
        };
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn dir_name(&self) -> String {
        format!("{}_{}", date_key(self.start), date_key(self.end))
    }
}

pub fn yesterday(today: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(today)
}

pub fn candidate_dates(from: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|day| *day < today).collect()
}

pub fn resolve_path(
    trading_type: TradingType,
    data_kind: &str,
    granularity: Granularity,
    symbol: &Symbol,
) -> String {
    format!(
        "{}/{}/{}/{}/",
        trading_type.path_root(),
        granularity.as_str(),
        data_kind,
        symbol.as_str()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCell {
    Monthly {
        symbol: Symbol,
        month_start: NaiveDate,
    },
    Daily {
        symbol: Symbol,
        date: NaiveDate,
    },
}

impl FetchCell {
    pub fn monthly(symbol: Symbol, year: i32, month: u32) -> Result<Self, VisionError> {
        if !(1..=12).contains(&month) {
            return Err(VisionError::InvalidMonth(month));
        }
        let month_start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| VisionError::InvalidDate(format!("{year}-{month:02}-01")))?;
        Ok(FetchCell::Monthly {
            symbol,
            month_start,
        })
    }

    pub fn daily(symbol: Symbol, date: NaiveDate) -> Self {
        FetchCell::Daily { symbol, date }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            FetchCell::Monthly { symbol, .. } | FetchCell::Daily { symbol, .. } => symbol,
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            FetchCell::Monthly { .. } => Granularity::Monthly,
            FetchCell::Daily { .. } => Granularity::Daily,
        }
    }

    pub fn anchor_date(&self) -> NaiveDate {
        match self {
            FetchCell::Monthly { month_start, .. } => *month_start,
            FetchCell::Daily { date, .. } => *date,
        }
    }

    pub fn remote_prefix(&self, trading_type: TradingType) -> String {
        resolve_path(trading_type, DATA_KIND, self.granularity(), self.symbol())
    }

    pub fn file_name(&self) -> String {
        match self {
            FetchCell::Monthly {
                symbol,
                month_start,
            } => format!(
                "{}-{DATA_KIND}-{}-{:02}.zip",
                symbol.as_str(),
                month_start.year(),
                month_start.month()
            ),
            FetchCell::Daily { symbol, date } => {
                format!("{}-{DATA_KIND}-{}.zip", symbol.as_str(), date_key(*date))
            }
        }
    }

    pub fn checksum_file_name(&self) -> String {
        format!("{}.CHECKSUM", self.file_name())
    }
}
