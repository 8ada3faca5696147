//! Order storage port trait.

use crate::domain::error::CoinratError;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::pair::Pair;

pub trait OrderStorage {
    fn name(&self) -> &str;

    /// Insert or replace the order with the same id.
    fn save_order(&self, order: &Order) -> Result<(), CoinratError>;

    /// Orders for a market and pair ordered by creation time, optionally
    /// restricted to one status.
    fn find_by(
        &self,
        market_name: &str,
        pair: &Pair,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, CoinratError>;
}
