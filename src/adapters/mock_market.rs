//! Simulated market for replays.
//!
//! Every order fills immediately and completely at its own rate. Prices are
//! whatever was last injected through `mock_current_price`.

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

use crate::domain::configuration::{Configuration, ConfigurationStructure, ConfigurationValue};
use crate::domain::datetime::DateTimeFactory;
use crate::domain::error::CoinratError;
use crate::domain::order::{Direction, Order};
use crate::domain::pair::Pair;
use crate::ports::market_port::Market;

pub const MARKET_PLUGIN_NAME: &str = "mock";

/// Quantities are truncated to this many decimal places.
const QUANTITY_DECIMAL_PLACES: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct MockMarketConfiguration {
    pub base_currency: String,
    pub base_currency_balance: Decimal,
    pub market_currency: String,
    pub market_currency_balance: Decimal,
    pub transaction_fee: Decimal,
}

impl Default for MockMarketConfiguration {
    fn default() -> Self {
        MockMarketConfiguration {
            base_currency: "USD".into(),
            base_currency_balance: Decimal::from(1000),
            market_currency: "BTC".into(),
            market_currency_balance: Decimal::ZERO,
            transaction_fee: Decimal::new(25, 4),
        }
    }
}

impl MockMarketConfiguration {
    pub fn configuration_structure() -> ConfigurationStructure {
        let defaults = Self::default();
        ConfigurationStructure::new()
            .field(
                "base_currency",
                "Base currency",
                ConfigurationValue::String(defaults.base_currency),
                "",
            )
            .field(
                "base_currency_balance",
                "Base currency balance",
                ConfigurationValue::Decimal(defaults.base_currency_balance),
                "",
            )
            .field(
                "market_currency",
                "Market currency",
                ConfigurationValue::String(defaults.market_currency),
                "",
            )
            .field(
                "market_currency_balance",
                "Market currency balance",
                ConfigurationValue::Decimal(defaults.market_currency_balance),
                "",
            )
            .field(
                "transaction_fee",
                "Transaction fee",
                ConfigurationValue::Decimal(defaults.transaction_fee),
                "fraction",
            )
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self, CoinratError> {
        let parsed = MockMarketConfiguration {
            base_currency: configuration.get_string("base_currency")?.to_uppercase(),
            base_currency_balance: configuration.get_decimal("base_currency_balance")?,
            market_currency: configuration.get_string("market_currency")?.to_uppercase(),
            market_currency_balance: configuration.get_decimal("market_currency_balance")?,
            transaction_fee: configuration.get_decimal("transaction_fee")?,
        };

        let invalid = |key: &str, reason: &str| CoinratError::ConfigInvalid {
            section: configuration.section().to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if parsed.base_currency_balance.is_sign_negative() {
            return Err(invalid("base_currency_balance", "must not be negative"));
        }
        if parsed.market_currency_balance.is_sign_negative() {
            return Err(invalid("market_currency_balance", "must not be negative"));
        }
        if parsed.transaction_fee.is_sign_negative() || parsed.transaction_fee >= Decimal::ONE {
            return Err(invalid("transaction_fee", "must be in [0, 1)"));
        }
        Ok(parsed)
    }
}

pub struct MockMarket {
    name: String,
    datetime_factory: Rc<dyn DateTimeFactory>,
    transaction_fee: Decimal,
    balances: HashMap<String, Decimal>,
    prices: HashMap<Pair, Decimal>,
}

impl MockMarket {
    pub fn new(
        name: &str,
        datetime_factory: Rc<dyn DateTimeFactory>,
        configuration: MockMarketConfiguration,
    ) -> Self {
        let mut balances = HashMap::new();
        balances.insert(
            configuration.base_currency,
            configuration.base_currency_balance,
        );
        balances.insert(
            configuration.market_currency,
            configuration.market_currency_balance,
        );

        MockMarket {
            name: name.to_string(),
            datetime_factory,
            transaction_fee: configuration.transaction_fee,
            balances,
            prices: HashMap::new(),
        }
    }

    pub fn transaction_fee(&self) -> Decimal {
        self.transaction_fee
    }

    fn withdraw(&mut self, currency: &str, amount: Decimal) -> Result<(), CoinratError> {
        let available = self.get_balance(currency);
        if amount <= Decimal::ZERO || amount > available {
            return Err(CoinratError::NotEnoughBalance {
                currency: currency.to_string(),
                required: amount,
                available,
            });
        }
        self.balances.insert(currency.to_string(), available - amount);
        Ok(())
    }

    /// Balance of `currency` after receiving `amount`, not yet applied.
    fn credited(&self, currency: &str, amount: Decimal) -> Result<Decimal, CoinratError> {
        self.get_balance(currency)
            .checked_add(amount)
            .ok_or_else(|| CoinratError::overflow("balance"))
    }
}

impl Market for MockMarket {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_current_price(&self, pair: &Pair) -> Result<Decimal, CoinratError> {
        self.prices
            .get(pair)
            .copied()
            .ok_or_else(|| CoinratError::PriceNotAvailable {
                market: self.name.clone(),
                pair: pair.to_string(),
            })
    }

    fn mock_current_price(&mut self, pair: &Pair, price: Decimal) -> Result<(), CoinratError> {
        self.prices.insert(pair.clone(), price);
        Ok(())
    }

    fn get_balance(&self, currency: &str) -> Decimal {
        self.balances
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn place_order(&mut self, mut order: Order) -> Result<Order, CoinratError> {
        let pair = order.pair().clone();
        let rate = match order.rate() {
            Some(rate) => rate,
            None => self.get_current_price(&pair)?,
        };
        let quantity = order.quantity();
        let value = quantity
            .checked_mul(rate)
            .ok_or_else(|| CoinratError::overflow("order value"))?;

        // Both legs are computed before any balance changes.
        match order.direction() {
            Direction::Buy => {
                let cost = value
                    .checked_mul(Decimal::ONE + self.transaction_fee)
                    .ok_or_else(|| CoinratError::overflow("order cost"))?;
                let credited = self.credited(pair.market_currency(), quantity)?;
                self.withdraw(pair.base_currency(), cost)?;
                self.balances
                    .insert(pair.market_currency().to_string(), credited);
            }
            Direction::Sell => {
                let proceeds = value
                    .checked_mul(Decimal::ONE - self.transaction_fee)
                    .ok_or_else(|| CoinratError::overflow("order proceeds"))?;
                let credited = self.credited(pair.base_currency(), proceeds)?;
                self.withdraw(pair.market_currency(), quantity)?;
                self.balances
                    .insert(pair.base_currency().to_string(), credited);
            }
        }

        order.set_id_on_market(Uuid::new_v4().to_string());
        order.close(self.datetime_factory.now())?;
        log::debug!("{} filled {}", self.name, order);
        Ok(order)
    }

    fn calculate_maximal_amount_to_buy(
        &self,
        pair: &Pair,
        price: Decimal,
    ) -> Result<Decimal, CoinratError> {
        if price <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let unit_cost = price
            .checked_mul(Decimal::ONE + self.transaction_fee)
            .ok_or_else(|| CoinratError::overflow("unit cost"))?;
        let quantity = self
            .get_balance(pair.base_currency())
            .checked_div(unit_cost)
            .ok_or_else(|| CoinratError::overflow("maximal amount to buy"))?;
        Ok(quantity.round_dp_with_strategy(QUANTITY_DECIMAL_PLACES, RoundingStrategy::ToZero))
    }

    fn calculate_maximal_amount_to_sell(&self, pair: &Pair) -> Decimal {
        self.get_balance(pair.market_currency())
    }
}
