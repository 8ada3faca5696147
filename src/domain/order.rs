//! Order model and its lifecycle.
//!
//! An order is validated once at construction; afterwards only the market
//! may move it from open to closed or canceled.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::datetime::parse_datetime;
use super::error::CoinratError;
use super::pair::Pair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        })
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        })
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Open => "open",
            OrderStatus::Closed => "closed",
            OrderStatus::Canceled => "canceled",
        })
    }
}

/// Everything needed to build an [`Order`].
#[derive(Debug, Clone)]
pub struct OrderFields {
    pub order_id: Uuid,
    pub strategy_run_id: Uuid,
    pub market_name: String,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
    pub pair: Pair,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
    pub id_on_market: Option<String>,
    pub status: OrderStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl OrderFields {
    /// A freshly created open limit order.
    pub fn open_limit(
        strategy_run_id: Uuid,
        market_name: &str,
        direction: Direction,
        created_at: DateTime<Utc>,
        pair: Pair,
        quantity: Decimal,
        rate: Decimal,
    ) -> Self {
        OrderFields {
            order_id: Uuid::new_v4(),
            strategy_run_id,
            market_name: market_name.to_string(),
            direction,
            created_at,
            pair,
            order_type: OrderType::Limit,
            quantity,
            rate: Some(rate),
            id_on_market: None,
            status: OrderStatus::Open,
            closed_at: None,
            canceled_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    order_id: Uuid,
    strategy_run_id: Uuid,
    market_name: String,
    direction: Direction,
    created_at: DateTime<Utc>,
    pair: Pair,
    order_type: OrderType,
    quantity: Decimal,
    rate: Option<Decimal>,
    id_on_market: Option<String>,
    status: OrderStatus,
    closed_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(fields: OrderFields) -> Result<Self, CoinratError> {
        match (fields.order_type, fields.rate) {
            (OrderType::Limit, None) => {
                return Err(CoinratError::invalid_order("limit order requires a rate"));
            }
            (OrderType::Market, Some(_)) => {
                return Err(CoinratError::invalid_order(
                    "market order must not have a rate",
                ));
            }
            _ => {}
        }
        if fields.quantity.is_sign_negative() {
            return Err(CoinratError::invalid_order("quantity must not be negative"));
        }
        if (fields.status == OrderStatus::Closed) != fields.closed_at.is_some() {
            return Err(CoinratError::invalid_order(
                "closed_at must be set exactly when the order is closed",
            ));
        }
        if (fields.status == OrderStatus::Canceled) != fields.canceled_at.is_some() {
            return Err(CoinratError::invalid_order(
                "canceled_at must be set exactly when the order is canceled",
            ));
        }

        Ok(Order {
            order_id: fields.order_id,
            strategy_run_id: fields.strategy_run_id,
            market_name: fields.market_name,
            direction: fields.direction,
            created_at: fields.created_at,
            pair: fields.pair,
            order_type: fields.order_type,
            quantity: fields.quantity,
            rate: fields.rate,
            id_on_market: fields.id_on_market,
            status: fields.status,
            closed_at: fields.closed_at,
            canceled_at: fields.canceled_at,
        })
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn strategy_run_id(&self) -> Uuid {
        self.strategy_run_id
    }

    pub fn market_name(&self) -> &str {
        &self.market_name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_buy(&self) -> bool {
        self.direction == Direction::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.direction == Direction::Sell
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Always in the traded (right) currency of the pair.
    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Base currency needed to buy one unit of the traded currency.
    pub fn rate(&self) -> Option<Decimal> {
        self.rate
    }

    pub fn id_on_market(&self) -> Option<&str> {
        self.id_on_market.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == OrderStatus::Closed
    }

    pub fn is_canceled(&self) -> bool {
        self.status == OrderStatus::Canceled
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn canceled_at(&self) -> Option<DateTime<Utc>> {
        self.canceled_at
    }

    pub fn set_id_on_market(&mut self, id_on_market: String) {
        self.id_on_market = Some(id_on_market);
    }

    pub fn close(&mut self, closed_at: DateTime<Utc>) -> Result<(), CoinratError> {
        self.ensure_open("close")?;
        self.status = OrderStatus::Closed;
        self.closed_at = Some(closed_at);
        Ok(())
    }

    pub fn cancel(&mut self, canceled_at: DateTime<Utc>) -> Result<(), CoinratError> {
        self.ensure_open("cancel")?;
        self.status = OrderStatus::Canceled;
        self.canceled_at = Some(canceled_at);
        Ok(())
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), CoinratError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoinratError::InvalidOrderTransition {
                order_id: self.order_id.to_string(),
                action,
                status: self.status.to_string(),
            })
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}, Id: \"{}\", Market: \"{}\", Created: \"{}\", Pair: [{}], Type: \"{}\", Rate: \"{}\", Quantity: \"{:.8}\"",
            self.direction.to_string().to_uppercase(),
            self.status.to_string().to_uppercase(),
            self.order_id,
            self.market_name,
            self.created_at.to_rfc3339(),
            self.pair,
            self.order_type,
            self.rate.map_or("None".to_string(), |r| format!("{r:.8}")),
            self.quantity,
        )
    }
}

/// Flat dictionary form of an order as stored and emitted.
#[derive(Debug, Serialize, Deserialize)]
struct SerializedOrder {
    order_id: String,
    strategy_run_id: String,
    market: String,
    direction: Direction,
    created_at: String,
    pair: String,
    #[serde(rename = "type")]
    order_type: OrderType,
    quantity: String,
    rate: Option<String>,
    id_on_market: Option<String>,
    status: OrderStatus,
    closed_at: Option<String>,
    canceled_at: Option<String>,
}

pub fn serialize_order(order: &Order) -> Value {
    let serialized = SerializedOrder {
        order_id: order.order_id.to_string(),
        strategy_run_id: order.strategy_run_id.to_string(),
        market: order.market_name.clone(),
        direction: order.direction,
        created_at: order.created_at.to_rfc3339(),
        pair: order.pair.to_string(),
        order_type: order.order_type,
        quantity: order.quantity.to_string(),
        rate: order.rate.map(|r| r.to_string()),
        id_on_market: order.id_on_market.clone(),
        status: order.status,
        closed_at: order.closed_at.map(|t| t.to_rfc3339()),
        canceled_at: order.canceled_at.map(|t| t.to_rfc3339()),
    };
    serde_json::to_value(serialized).unwrap_or(Value::Null)
}

pub fn deserialize_order(value: &Value) -> Result<Order, CoinratError> {
    let serialized: SerializedOrder = serde_json::from_value(value.clone())
        .map_err(|e| CoinratError::deserialize("order", e))?;

    let uuid = |s: &str| Uuid::parse_str(s).map_err(|e| CoinratError::deserialize("order", e));
    let time = |s: &str| parse_datetime(s).map_err(|e| CoinratError::deserialize("order", e));
    let decimal = |s: &str| {
        s.parse::<Decimal>()
            .map_err(|e| CoinratError::deserialize("order", e))
    };

    Order::new(OrderFields {
        order_id: uuid(&serialized.order_id)?,
        strategy_run_id: uuid(&serialized.strategy_run_id)?,
        market_name: serialized.market,
        direction: serialized.direction,
        created_at: time(&serialized.created_at)?,
        pair: serialized.pair.parse()?,
        order_type: serialized.order_type,
        quantity: decimal(&serialized.quantity)?,
        rate: serialized.rate.as_deref().map(decimal).transpose()?,
        id_on_market: serialized.id_on_market,
        status: serialized.status,
        closed_at: serialized.closed_at.as_deref().map(time).transpose()?,
        canceled_at: serialized.canceled_at.as_deref().map(time).transpose()?,
    })
}

pub fn serialize_orders(orders: &[Order]) -> Vec<Value> {
    orders.iter().map(serialize_order).collect()
}

pub fn deserialize_orders(values: &[Value]) -> Result<Vec<Order>, CoinratError> {
    values.iter().map(deserialize_order).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 11, 26, 10, 11, 12).unwrap()
    }

    fn limit_fields() -> OrderFields {
        OrderFields::open_limit(
            Uuid::new_v4(),
            "bittrex",
            Direction::Buy,
            created_at(),
            Pair::new("USD", "BTC"),
            dec!(0.5),
            dec!(8000.25),
        )
    }

    fn market_fields() -> OrderFields {
        OrderFields {
            order_type: OrderType::Market,
            rate: None,
            direction: Direction::Sell,
            ..limit_fields()
        }
    }

    #[test]
    fn limit_order_requires_rate() {
        let err = Order::new(OrderFields {
            rate: None,
            ..limit_fields()
        })
        .unwrap_err();
        assert!(matches!(err, CoinratError::InvalidOrder { .. }));
    }

    #[test]
    fn market_order_rejects_rate() {
        let err = Order::new(OrderFields {
            rate: Some(dec!(1)),
            ..market_fields()
        })
        .unwrap_err();
        assert!(matches!(err, CoinratError::InvalidOrder { .. }));
    }

    #[test]
    fn status_timestamps_must_match() {
        let closed_without_time = OrderFields {
            status: OrderStatus::Closed,
            ..limit_fields()
        };
        assert!(Order::new(closed_without_time).is_err());

        let open_with_cancel_time = OrderFields {
            canceled_at: Some(created_at()),
            ..limit_fields()
        };
        assert!(Order::new(open_with_cancel_time).is_err());
    }

    #[test]
    fn negative_quantity_is_rejected() {
        assert!(Order::new(OrderFields {
            quantity: dec!(-1),
            ..limit_fields()
        })
        .is_err());
    }

    #[test]
    fn close_and_cancel_only_from_open() {
        let mut order = Order::new(limit_fields()).unwrap();
        order.close(created_at()).unwrap();
        assert!(order.is_closed());
        assert_eq!(order.closed_at(), Some(created_at()));

        let err = order.cancel(created_at()).unwrap_err();
        assert!(matches!(
            err,
            CoinratError::InvalidOrderTransition { action: "cancel", .. }
        ));
    }

    #[test]
    fn round_trip_every_variant_and_status() {
        let later = created_at() + chrono::Duration::hours(1);
        let variants = vec![
            limit_fields(),
            market_fields(),
            OrderFields {
                status: OrderStatus::Closed,
                closed_at: Some(later),
                id_on_market: Some("aaa-bbb".into()),
                ..limit_fields()
            },
            OrderFields {
                status: OrderStatus::Canceled,
                canceled_at: Some(later),
                ..limit_fields()
            },
            OrderFields {
                status: OrderStatus::Closed,
                closed_at: Some(later),
                ..market_fields()
            },
            OrderFields {
                status: OrderStatus::Canceled,
                canceled_at: Some(later),
                ..market_fields()
            },
        ];

        for fields in variants {
            let order = Order::new(fields).unwrap();
            let restored = deserialize_order(&serialize_order(&order)).unwrap();
            assert_eq!(restored, order);
        }
    }

    #[test]
    fn serialized_keys_and_values() {
        let order = Order::new(market_fields()).unwrap();
        let value = serialize_order(&order);
        assert_eq!(value["type"], "market");
        assert_eq!(value["direction"], "sell");
        assert_eq!(value["status"], "open");
        assert_eq!(value["rate"], Value::Null);
        assert_eq!(value["pair"], "USD_BTC");
        assert_eq!(value["quantity"], "0.5");
    }

    #[test]
    fn deserialize_rejects_unknown_direction() {
        let mut value = serialize_order(&Order::new(limit_fields()).unwrap());
        value["direction"] = Value::from("hold");
        assert!(matches!(
            deserialize_order(&value),
            Err(CoinratError::Deserialize { record: "order", .. })
        ));
    }

    #[test]
    fn display_mentions_direction_and_status() {
        let order = Order::new(limit_fields()).unwrap();
        let shown = order.to_string();
        assert!(shown.starts_with("BUY-OPEN"));
        assert!(shown.contains("USD_BTC"));
        assert!(shown.contains("8000.25000000"));
    }
}
