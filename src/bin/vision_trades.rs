use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vision_trades::app::{App, RunOptions, RunPlan};
use vision_trades::config::ConfigLoader;
use vision_trades::domain::TradingType;
use vision_trades::error::VisionError;
use vision_trades::exchange::ExchangeHttpClient;
use vision_trades::executor::BoundedExecutor;
use vision_trades::output::{JsonOutput, LogOutput, OutputMode, print_summary};
use vision_trades::store::Store;
use vision_trades::vision::VisionHttpClient;

#[derive(Parser)]
#[command(name = "vision-trades")]
#[command(about = "Resumable bulk download of trade archives from data.binance.vision")]
#[command(version, author)]
struct Cli {
    #[arg(short = 't', long = "type", value_enum, default_value_t = TradingType::Spot)]
    trading_type: TradingType,

    #[arg(short, long, num_args = 1.., help = "Symbols to fetch (default: every exchange symbol)")]
    symbols: Option<Vec<String>>,

    #[arg(short, long, num_args = 1.., help = "Daily dates as YYYY-MM-DD (skips the monthly pass)")]
    dates: Option<Vec<String>>,

    #[arg(short, long, num_args = 1..)]
    years: Option<Vec<i32>>,

    #[arg(short, long, num_args = 1..)]
    months: Option<Vec<u32>>,

    #[arg(long)]
    start_date: Option<String>,

    #[arg(long)]
    end_date: Option<String>,

    #[arg(long)]
    skip_monthly: bool,

    #[arg(long)]
    skip_daily: bool,

    #[arg(short, long, help = "Also download the .CHECKSUM file of every archive")]
    checksum: bool,

    #[arg(long, requires = "checksum", help = "Verify archives against their .CHECKSUM file")]
    verify_checksum: bool,

    #[arg(long, help = "Destination folder (default: $STORE_DIRECTORY, config, cwd)")]
    folder: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "Maximum concurrent downloads")]
    workers: Option<usize>,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<VisionError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &VisionError) -> u8 {
    match error {
        VisionError::InvalidSymbol(_)
        | VisionError::InvalidTradingType(_)
        | VisionError::InvalidDate(_)
        | VisionError::InvalidWindow { .. }
        | VisionError::InvalidMonth(_)
        | VisionError::MissingConfig(_)
        | VisionError::ConfigRead(_)
        | VisionError::ConfigParse(_) => 2,
        err if err.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = match cli.folder.map(Utf8PathBuf::from).or(config.folder.clone()) {
        Some(folder) => Store::new(folder),
        None => Store::current_dir()?,
    };
    let executor = BoundedExecutor::new(cli.workers.unwrap_or(config.max_workers));

    let options = RunOptions {
        trading_type: Some(cli.trading_type),
        symbols: cli.symbols,
        dates: cli.dates,
        years: cli.years,
        months: cli.months,
        start_date: cli.start_date,
        end_date: cli.end_date,
        skip_monthly: cli.skip_monthly,
        skip_daily: cli.skip_daily,
        checksum: cli.checksum,
        verify_checksum: cli.verify_checksum,
    };
    let today = chrono::Local::now().date_naive();
    let plan = RunPlan::resolve(options, &config, today)?;

    let vision = VisionHttpClient::new(&config.download_base_url, &config.listing_base_url)?;
    let exchange = ExchangeHttpClient::new()?;
    let app = App::new(store, vision, exchange, executor);
    tracing::info!(
        folder = %app.store().root(),
        workers = executor.max_workers(),
        "using max {} workers",
        executor.max_workers()
    );

    let result = app.run(&plan, &LogOutput)?;
    match output_mode {
        OutputMode::NonInteractive => {
            use miette::IntoDiagnostic;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => print_summary(&result),
    }

    if result.failed_symbols().is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}
