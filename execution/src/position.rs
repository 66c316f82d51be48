// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Net position derived from fills, with a volume-weighted open ledger.

use crate::order::{Order, OrderId, Transaction};
use arara_markets::{InstrumentName, Side};
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One component fill of a position's open ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Constructor)]
pub struct Fill {
    pub price: Decimal,
    pub volume: Decimal,
}

/// A net position on one instrument.
///
/// Active while `close_time` is unset and `volume` positive. Attached
/// bracket orders are referenced by id and resolved through the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub name: InstrumentName,
    pub side: Side,
    pub volume: Decimal,
    /// Volume-weighted average over `open_prices`.
    pub open_price: Decimal,
    /// Ledger of component fills.
    pub open_prices: Vec<Fill>,
    pub time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub close_price: Option<Decimal>,
    pub gain_loss: Option<Decimal>,
    pub gain_loss_points: Option<Decimal>,
    /// Attached bracket orders, cancelled when the position closes.
    #[serde(default = "Vec::new")]
    pub brackets: Vec<OrderId>,
}

impl Position {
    /// Open a fresh position from a filled order.
    pub fn open(order: &Order, transaction: &Transaction) -> Self {
        Self {
            name: order.name.clone(),
            side: order.side,
            volume: transaction.volume,
            open_price: transaction.price,
            open_prices: vec![Fill {
                price: transaction.price,
                volume: transaction.volume,
            }],
            time: transaction.time,
            close_time: None,
            close_price: None,
            gain_loss: None,
            gain_loss_points: None,
            brackets: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.close_time.is_none() && self.volume > Decimal::ZERO
    }

    /// `Σ(vᵢ·pᵢ) / Σvᵢ` over a fill ledger.
    pub fn weighted_open(ledger: &[Fill]) -> Decimal {
        let total: Decimal = ledger.iter().map(|fill| fill.volume).sum();
        if total.is_zero() {
            return Decimal::ZERO;
        }
        let notional: Decimal = ledger.iter().map(|fill| fill.price * fill.volume).sum();
        notional / total
    }

    /// Points of unrealised P&L at `last`: `(last − open) · sign(side)`.
    pub fn gain_loss_points_at(&self, last: Decimal) -> Decimal {
        (last - self.open_price) * self.side.signum()
    }

    /// Currency P&L at `last`, scaled by volume and contract size.
    pub fn gain_loss_at(&self, last: Decimal, contract_size: Decimal) -> Decimal {
        self.gain_loss_points_at(last) * self.volume * contract_size
    }

    /// Close and realise against `price`.
    pub fn close_at(&mut self, price: Decimal, time: DateTime<Utc>, contract_size: Decimal) {
        let points = self.gain_loss_points_at(price);
        self.gain_loss_points = Some(points);
        self.gain_loss = Some(points * self.volume * contract_size);
        self.close_price = Some(price);
        self.close_time = Some(time);
    }

    /// Archive without realising: the cost basis transfers to a successor
    /// position, so the record closes flat at the successor's open price.
    pub fn archive_unrealised(&mut self, close_price: Decimal, time: DateTime<Utc>) {
        self.gain_loss_points = Some(Decimal::ZERO);
        self.gain_loss = Some(Decimal::ZERO);
        self.close_price = Some(close_price);
        self.close_time = Some(time);
    }

    /// Split into `(closed, remainder)` parts of `closed_volume` and
    /// `volume − closed_volume`, trimming the ledger proportionally.
    ///
    /// The open price is invariant under proportional trimming, so both
    /// parts keep it unchanged.
    pub fn split(self, closed_volume: Decimal) -> (Position, Position) {
        debug_assert!(closed_volume < self.volume);
        let remainder_volume = self.volume - closed_volume;
        let factor = remainder_volume / self.volume;

        let scale = |ledger: &[Fill], scale: Decimal| {
            ledger
                .iter()
                .map(|fill| Fill {
                    price: fill.price,
                    volume: fill.volume * scale,
                })
                .collect::<Vec<_>>()
        };

        let closed = Position {
            volume: closed_volume,
            open_prices: scale(&self.open_prices, Decimal::ONE - factor),
            brackets: self.brackets.clone(),
            ..self.clone()
        };
        let remainder = Position {
            volume: remainder_volume,
            open_prices: scale(&self.open_prices, factor),
            brackets: Vec::new(),
            ..self
        };
        (closed, remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filled(side: Side, price: Decimal, volume: Decimal) -> Position {
        let order = Order::market("o-1", "ES", side, volume);
        Position::open(
            &order,
            &Transaction {
                time: Utc::now(),
                price,
                volume,
            },
        )
    }

    #[test]
    fn test_weighted_open() {
        let ledger = [
            Fill {
                price: dec!(101),
                volume: dec!(1),
            },
            Fill {
                price: dec!(103),
                volume: dec!(1),
            },
        ];
        assert_eq!(Position::weighted_open(&ledger), dec!(102));
    }

    #[test]
    fn test_gain_loss_signs() {
        let long = filled(Side::Buy, dec!(100), dec!(2));
        assert_eq!(long.gain_loss_at(dec!(105), Decimal::ONE), dec!(10));

        let short = filled(Side::Sell, dec!(100), dec!(2));
        assert_eq!(short.gain_loss_at(dec!(105), Decimal::ONE), dec!(-10));
    }

    #[test]
    fn test_contract_size_scales_gain_loss() {
        let long = filled(Side::Buy, dec!(100), dec!(1));
        assert_eq!(long.gain_loss_at(dec!(101), dec!(50)), dec!(50));
    }

    #[test]
    fn test_close_realises() {
        let mut position = filled(Side::Buy, dec!(101), dec!(1));
        position.close_at(dec!(98), Utc::now(), Decimal::ONE);
        assert!(!position.is_active());
        assert_eq!(position.gain_loss, Some(dec!(-3)));
        assert_eq!(position.close_price, Some(dec!(98)));
    }

    #[test]
    fn test_archive_unrealised_is_flat() {
        let mut position = filled(Side::Buy, dec!(101), dec!(1));
        position.archive_unrealised(dec!(102), Utc::now());
        assert_eq!(position.gain_loss, Some(Decimal::ZERO));
        assert_eq!(position.close_price, Some(dec!(102)));
    }

    #[test]
    fn test_split_preserves_open_price_and_volumes() {
        let position = filled(Side::Buy, dec!(100), dec!(4));
        let (closed, remainder) = position.split(dec!(1));

        assert_eq!(closed.volume, dec!(1));
        assert_eq!(remainder.volume, dec!(3));
        assert_eq!(closed.open_price, dec!(100));
        assert_eq!(remainder.open_price, dec!(100));
        let closed_total: Decimal = closed.open_prices.iter().map(|fill| fill.volume).sum();
        assert_eq!(closed_total, dec!(1));
    }
}
