//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use uuid::Uuid;

use crate::adapters::csv_adapter::load_candles_csv;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_event_emitter::LogEventEmitter;
use crate::adapters::memory_storage::{MemoryCandleStorage, MemoryOrderStorage};
use crate::adapters::mock_market::MARKET_PLUGIN_NAME;
use crate::domain::configuration::{
    format_data_to_typed, raw_configuration_from_pairs, ConfigurationStructure,
};
use crate::domain::datetime::{parse_datetime, DateTimeInterval, FrozenDateTimeFactory};
use crate::domain::error::CoinratError;
use crate::domain::pair::Pair;
use crate::domain::replayer::StrategyReplayer;
use crate::domain::strategy::{StrategyDependencies, StrategyRunner};
use crate::domain::strategy_run::{StrategyRun, StrategyRunMarket};
use crate::plugins::Plugins;
use crate::ports::config_port::ConfigPort;
use crate::ports::event_port::EventEmitter;

pub const MEMORY_STORAGE: &str = "memory";
#[cfg(feature = "sqlite")]
pub const SQLITE_STORAGE: &str = crate::adapters::sqlite_adapter::STORAGE_NAME;

#[derive(Parser, Debug)]
#[command(name = "coinrat", about = "Cryptocurrency trading strategy replayer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a strategy over stored candles
    Replay {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a run file without replaying it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List built-in strategies, markets and storages
    Plugins,
    /// Import minute candles from CSV into the configured candle storage
    ImportCandles {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Replay { config } => run_replay(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Plugins => run_plugins(),
        Command::ImportCandles { config, csv } => run_import_candles(&config, &csv),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = CoinratError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, CoinratError> {
    config
        .get_string(section, key)
        .map(|value| value.trim().to_string())
        .ok_or_else(|| CoinratError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn required_datetime(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<DateTime<Utc>, CoinratError> {
    let raw = required(config, section, key)?;
    parse_datetime(&raw).map_err(|e| CoinratError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("{raw:?} is not an RFC 3339 datetime: {e}"),
    })
}

fn optional(config: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    config
        .get_string(section, key)
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Build a strategy run from the `[run]`, `[strategy]` and `[market]`
/// sections of a run file.
pub fn build_strategy_run(config: &dyn ConfigPort) -> Result<StrategyRun, CoinratError> {
    let pair: Pair = required(config, "run", "pair")?.parse()?;
    let since = required_datetime(config, "run", "since")?;
    let till = required_datetime(config, "run", "till")?;
    if till < since {
        return Err(CoinratError::ConfigInvalid {
            section: "run".into(),
            key: "till".into(),
            reason: "must not be before since".into(),
        });
    }

    Ok(StrategyRun {
        strategy_run_id: Uuid::new_v4(),
        run_at: Utc::now(),
        pair,
        markets: vec![StrategyRunMarket {
            plugin_name: optional(config, "run", "market_plugin", MARKET_PLUGIN_NAME),
            market_name: required(config, "run", "market")?,
            market_configuration: raw_configuration_from_pairs(config.section_entries("market")),
        }],
        strategy_name: required(config, "run", "strategy")?,
        strategy_configuration: raw_configuration_from_pairs(config.section_entries("strategy")),
        interval: DateTimeInterval::closed(since, till),
        candle_storage_name: optional(config, "run", "candle_storage", MEMORY_STORAGE),
        order_storage_name: optional(config, "run", "order_storage", MEMORY_STORAGE),
    })
}

fn is_known_storage(name: &str) -> bool {
    #[cfg(feature = "sqlite")]
    if name == SQLITE_STORAGE {
        return true;
    }
    name == MEMORY_STORAGE
}

/// Default plugins plus the storages a run file refers to.
///
/// Memory storages are always registered. SQLite is opened only when one of
/// the storages names it, and then serves both candles and orders.
pub fn build_plugins(
    config: &dyn ConfigPort,
    strategy_run: &StrategyRun,
) -> Result<Plugins, CoinratError> {
    let mut plugins = Plugins::with_defaults();
    plugins.register_candle_storage(Rc::new(MemoryCandleStorage::new(MEMORY_STORAGE)));
    plugins.register_order_storage(Rc::new(MemoryOrderStorage::new(MEMORY_STORAGE)));

    #[cfg(feature = "sqlite")]
    if strategy_run.candle_storage_name == SQLITE_STORAGE
        || strategy_run.order_storage_name == SQLITE_STORAGE
    {
        use crate::adapters::sqlite_adapter::SqliteStorage;

        let storage = Rc::new(SqliteStorage::from_config(config)?);
        storage.initialize_schema()?;
        plugins.register_candle_storage(storage.clone());
        plugins.register_order_storage(storage);
    }
    #[cfg(not(feature = "sqlite"))]
    let _ = (config, strategy_run);

    Ok(plugins)
}

/// Load the CSV named in `[csv] path`, if any, into the run's candle storage.
pub fn preload_candles(
    config: &dyn ConfigPort,
    plugins: &Plugins,
    strategy_run: &StrategyRun,
    event_emitter: &dyn EventEmitter,
) -> Result<usize, CoinratError> {
    let Some(path) = config.get_string("csv", "path") else {
        return Ok(0);
    };
    let market_name = strategy_run
        .markets
        .first()
        .map(|m| m.market_name.as_str())
        .unwrap_or_default();
    let candles = load_candles_csv(Path::new(path.trim()), market_name, &strategy_run.pair)?;

    let storage = plugins.candle_storage(&strategy_run.candle_storage_name)?;
    storage.write_candles(&candles)?;
    event_emitter.emit_new_candles(storage.name(), &candles);
    Ok(candles.len())
}

fn replay(config: &dyn ConfigPort) -> Result<(), CoinratError> {
    let strategy_run = build_strategy_run(config)?;
    let plugins = build_plugins(config, &strategy_run)?;
    let event_emitter: Rc<dyn EventEmitter> = Rc::new(LogEventEmitter);

    let preloaded = preload_candles(config, &plugins, &strategy_run, event_emitter.as_ref())?;
    if preloaded > 0 {
        eprintln!("Loaded {preloaded} minute candles");
    }

    let plugins = Rc::new(plugins);
    let replayer = StrategyReplayer::new(plugins.clone(), event_emitter);
    eprintln!(
        "Replaying {} on {} {} [{}]",
        strategy_run.strategy_name,
        strategy_run.markets[0].market_name,
        strategy_run.pair,
        strategy_run.interval,
    );
    replayer.run(&strategy_run)?;

    let orders = plugins
        .order_storage(&strategy_run.order_storage_name)?
        .find_by(
            &strategy_run.markets[0].market_name,
            &strategy_run.pair,
            None,
        )?
        .into_iter()
        .filter(|order| order.strategy_run_id() == strategy_run.strategy_run_id)
        .collect::<Vec<_>>();

    for order in &orders {
        println!("{order}");
    }
    eprintln!("Replay finished: {} orders placed", orders.len());
    Ok(())
}

pub fn run_replay(config_path: &Path) -> ExitCode {
    eprintln!("Loading run file from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match replay(&adapter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Check everything a replay would resolve, without touching storage.
///
/// The strategy and markets are built against throwaway memory storages so
/// their typed configurations are checked too.
pub fn validate_run_file(config: &dyn ConfigPort) -> Result<StrategyRun, CoinratError> {
    let strategy_run = build_strategy_run(config)?;
    let plugins = Plugins::with_defaults();
    let since = strategy_run.interval.since.unwrap_or_else(Utc::now);
    let datetime_factory = Rc::new(FrozenDateTimeFactory::new(since));

    let strategy = plugins.strategy(&strategy_run.strategy_name)?;
    let configuration = format_data_to_typed(
        &strategy_run.strategy_name,
        &strategy_run.strategy_configuration,
        &(strategy.configuration_structure)(),
    )?;
    (strategy.create)(
        StrategyDependencies {
            strategy_run_id: strategy_run.strategy_run_id,
            candle_storage: Rc::new(MemoryCandleStorage::new(MEMORY_STORAGE)),
            order_storage: Rc::new(MemoryOrderStorage::new(MEMORY_STORAGE)),
            event_emitter: Rc::new(LogEventEmitter),
            datetime_factory: datetime_factory.clone(),
        },
        &configuration,
    )?;

    for market in &strategy_run.markets {
        let plugin = plugins.market(&market.plugin_name)?;
        let configuration = format_data_to_typed(
            &market.market_name,
            &market.market_configuration,
            &(plugin.configuration_structure)(),
        )?;
        (plugin.create)(&market.market_name, datetime_factory.clone(), &configuration)?;
    }

    for (kind, name) in [
        ("candle storage", &strategy_run.candle_storage_name),
        ("order storage", &strategy_run.order_storage_name),
    ] {
        if !is_known_storage(name) {
            return Err(CoinratError::UnknownPlugin {
                kind,
                name: name.clone(),
            });
        }
    }

    Ok(strategy_run)
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating run file: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    match validate_run_file(&adapter) {
        Ok(strategy_run) => {
            eprintln!("  strategy:      {}", strategy_run.strategy_name);
            eprintln!("  pair:          {}", strategy_run.pair);
            eprintln!("  interval:      {}", strategy_run.interval);
            eprintln!("  candles from:  {}", strategy_run.candle_storage_name);
            eprintln!("  orders to:     {}", strategy_run.order_storage_name);
            eprintln!("\nRun file is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn print_structure(name: &str, structure: &ConfigurationStructure) {
    println!("  {name}");
    for field in structure.fields() {
        let unit = if field.unit.is_empty() {
            String::new()
        } else {
            format!(" [{}]", field.unit)
        };
        println!(
            "    {} ({}, default {}){}: {}",
            field.name,
            field.field_type(),
            field.default,
            unit,
            field.title
        );
    }
}

fn run_plugins() -> ExitCode {
    let plugins = Plugins::with_defaults();

    println!("Strategies:");
    for name in plugins.available_strategies() {
        if let Ok(plugin) = plugins.strategy(name) {
            print_structure(name, &(plugin.configuration_structure)());
        }
    }

    println!("Markets:");
    for name in plugins.available_markets() {
        if let Ok(plugin) = plugins.market(name) {
            print_structure(name, &(plugin.configuration_structure)());
        }
    }

    println!("Storages:");
    println!("  {MEMORY_STORAGE}");
    #[cfg(feature = "sqlite")]
    println!("  {SQLITE_STORAGE}");
    ExitCode::SUCCESS
}

fn import_candles(config: &dyn ConfigPort, csv_path: &Path) -> Result<usize, CoinratError> {
    let pair: Pair = required(config, "run", "pair")?.parse()?;
    let market_name = required(config, "run", "market")?;
    let storage_name = optional(config, "run", "candle_storage", MEMORY_STORAGE);

    #[cfg(feature = "sqlite")]
    if storage_name == SQLITE_STORAGE {
        use crate::adapters::sqlite_adapter::SqliteStorage;
        use crate::ports::candle_port::CandleStorage;

        let candles = load_candles_csv(csv_path, &market_name, &pair)?;
        let storage = SqliteStorage::from_config(config)?;
        storage.initialize_schema()?;
        storage.write_candles(&candles)?;
        LogEventEmitter.emit_new_candles(CandleStorage::name(&storage), &candles);
        return Ok(candles.len());
    }

    let _ = (csv_path, market_name, pair);
    Err(CoinratError::ConfigInvalid {
        section: "run".into(),
        key: "candle_storage".into(),
        reason: format!("cannot import into non-persistent storage {storage_name:?}"),
    })
}

pub fn run_import_candles(config_path: &Path, csv_path: &Path) -> ExitCode {
    eprintln!("Loading run file from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    eprintln!("Importing candles from {}", csv_path.display());
    match import_candles(&adapter, csv_path) {
        Ok(count) => {
            println!("{count}");
            eprintln!("{count} minute candles imported");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
