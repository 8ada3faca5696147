//! Market port trait.

use rust_decimal::Decimal;

use crate::domain::error::CoinratError;
use crate::domain::order::Order;
use crate::domain::pair::Pair;

pub trait Market {
    fn name(&self) -> &str;

    fn get_current_price(&self, pair: &Pair) -> Result<Decimal, CoinratError>;

    /// Only simulated markets accept injected prices.
    fn mock_current_price(&mut self, _pair: &Pair, _price: Decimal) -> Result<(), CoinratError> {
        Err(CoinratError::PriceMockingUnsupported {
            market: self.name().to_string(),
        })
    }

    fn get_balance(&self, currency: &str) -> Decimal;

    /// Register the order with the venue and return it as the venue sees it.
    /// Fails with `NotEnoughBalance` when the order cannot be covered.
    fn place_order(&mut self, order: Order) -> Result<Order, CoinratError>;

    /// Largest quantity of the traded currency affordable at `price`.
    fn calculate_maximal_amount_to_buy(
        &self,
        pair: &Pair,
        price: Decimal,
    ) -> Result<Decimal, CoinratError>;

    /// Largest quantity of the traded currency available to sell.
    fn calculate_maximal_amount_to_sell(&self, pair: &Pair) -> Decimal;
}
