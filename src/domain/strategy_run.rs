//! Strategy run descriptor and its dictionary form.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::configuration::RawConfiguration;
use super::datetime::{
    deserialize_datetime_interval, parse_datetime, serialize_datetime_interval, DateTimeInterval,
};
use super::error::CoinratError;
use super::pair::Pair;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRunMarket {
    pub plugin_name: String,
    pub market_name: String,
    pub market_configuration: RawConfiguration,
}

/// One simulation (or execution) request.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRun {
    pub strategy_run_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub pair: Pair,
    pub markets: Vec<StrategyRunMarket>,
    pub strategy_name: String,
    pub strategy_configuration: RawConfiguration,
    pub interval: DateTimeInterval,
    pub candle_storage_name: String,
    pub order_storage_name: String,
}

pub fn serialize_strategy_run_market(market: &StrategyRunMarket) -> Value {
    json!({
        "name": market.market_name,
        "plugin_name": market.plugin_name,
        "configuration": market.market_configuration,
    })
}

pub fn deserialize_strategy_run_market(value: &Value) -> Result<StrategyRunMarket, CoinratError> {
    Ok(StrategyRunMarket {
        market_name: string_field(value, "name", "strategy run market")?,
        plugin_name: string_field(value, "plugin_name", "strategy run market")?,
        market_configuration: object_field(value, "configuration", "strategy run market")?,
    })
}

pub fn serialize_strategy_run(run: &StrategyRun) -> Value {
    json!({
        "strategy_run_id": run.strategy_run_id.to_string(),
        "run_at": run.run_at.to_rfc3339(),
        "pair": run.pair.to_string(),
        "markets": run.markets.iter().map(serialize_strategy_run_market).collect::<Vec<_>>(),
        "strategy_name": run.strategy_name,
        "strategy_configuration": run.strategy_configuration,
        "interval": serialize_datetime_interval(&run.interval),
        "candle_storage_name": run.candle_storage_name,
        "order_storage_name": run.order_storage_name,
    })
}

pub fn deserialize_strategy_run(value: &Value) -> Result<StrategyRun, CoinratError> {
    const RECORD: &str = "strategy run";

    let strategy_run_id = Uuid::parse_str(&string_field(value, "strategy_run_id", RECORD)?)
        .map_err(|e| CoinratError::deserialize(RECORD, e))?;
    let run_at = parse_datetime(&string_field(value, "run_at", RECORD)?)
        .map_err(|e| CoinratError::deserialize(RECORD, e))?;
    let markets = value
        .get("markets")
        .and_then(Value::as_array)
        .ok_or_else(|| CoinratError::deserialize(RECORD, "missing field markets"))?
        .iter()
        .map(deserialize_strategy_run_market)
        .collect::<Result<Vec<_>, _>>()?;
    let interval = deserialize_datetime_interval(
        value
            .get("interval")
            .ok_or_else(|| CoinratError::deserialize(RECORD, "missing field interval"))?,
    )?;

    Ok(StrategyRun {
        strategy_run_id,
        run_at,
        pair: string_field(value, "pair", RECORD)?.parse()?,
        markets,
        strategy_name: string_field(value, "strategy_name", RECORD)?,
        strategy_configuration: object_field(value, "strategy_configuration", RECORD)?,
        interval,
        candle_storage_name: string_field(value, "candle_storage_name", RECORD)?,
        order_storage_name: string_field(value, "order_storage_name", RECORD)?,
    })
}

fn string_field(value: &Value, key: &str, record: &'static str) -> Result<String, CoinratError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CoinratError::deserialize(record, format!("missing field {key}")))
}

fn object_field(
    value: &Value,
    key: &str,
    record: &'static str,
) -> Result<RawConfiguration, CoinratError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(RawConfiguration::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(CoinratError::deserialize(
            record,
            format!("{key} must be an object, got {other}"),
        )),
    }
}
