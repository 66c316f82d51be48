// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Account state machine: balance, working orders, net positions and the
//! append-only history behind them.
//!
//! The account is mutated by exactly one gateway engine task; strategies and
//! UI observe via streams and only ever see snapshots. Internally it
//! enforces the lifecycle invariants every adapter must preserve:
//!
//! * at most one net position per instrument (`active_positions` keyed by name)
//! * order-id uniqueness across the active and historical sets
//! * `balance == initial_balance + Σ closed gain_loss` — only position
//!   closure moves the balance; mark-to-market is exposed separately as
//!   [`Account::estimated_gain_loss`]

use crate::{
    error::ExecutionError,
    order::{Order, OrderId, OrderStatus, Transaction},
    position::{Fill, Position},
};
use arara_data::{group::PointGroups, Point};
use arara_integration::{collection::FnvIndexMap, stream::StreamAction};
use arara_markets::{Instrument, InstrumentName, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Per-instrument market state owned by the account: the descriptor, its
/// tick series and the derived time-bucketed groups.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    pub instrument: Instrument,
    pub points: Vec<Point>,
    pub groups: PointGroups,
}

impl InstrumentState {
    fn new(instrument: Instrument) -> Self {
        let groups = PointGroups::new(instrument.time_frame);
        Self {
            instrument,
            points: Vec::new(),
            groups,
        }
    }

    pub fn latest(&self) -> Option<&Point> {
        self.points.last()
    }
}

/// Audit record of one executed fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: u64,
    pub name: InstrumentName,
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}

/// How a fill netted against the account's position on its instrument.
///
/// Carries snapshots of the archived and/or active position for event
/// publication; the account keeps the authoritative copies.
#[derive(Debug, Clone, PartialEq)]
pub enum NettingOutcome {
    /// No prior position; a fresh one opened.
    Opened(Position),
    /// Same-side fill merged into a larger position. The predecessor is
    /// archived flat at the merged open price; basis moves to the successor.
    Increased { archived: Position, active: Position },
    /// Opposite fill of equal volume; the position closed fully.
    Closed(Position),
    /// Opposite fill of smaller volume; the closed portion is archived and
    /// the remainder stays active.
    Reduced { archived: Position, active: Position },
    /// Opposite fill of larger volume; the position closed fully and the
    /// excess opened a position on the other side.
    Reversed { archived: Position, active: Position },
}

impl NettingOutcome {
    pub fn active(&self) -> Option<&Position> {
        match self {
            NettingOutcome::Opened(active) => Some(active),
            NettingOutcome::Increased { active, .. }
            | NettingOutcome::Reduced { active, .. }
            | NettingOutcome::Reversed { active, .. } => Some(active),
            NettingOutcome::Closed(_) => None,
        }
    }

    pub fn archived(&self) -> Option<&Position> {
        match self {
            NettingOutcome::Opened(_) => None,
            NettingOutcome::Closed(archived) => Some(archived),
            NettingOutcome::Increased { archived, .. }
            | NettingOutcome::Reduced { archived, .. }
            | NettingOutcome::Reversed { archived, .. } => Some(archived),
        }
    }
}

/// Trading account state: balance, instruments, orders and positions.
#[derive(Debug)]
pub struct Account {
    descriptor: SmolStr,
    initial_balance: Decimal,
    balance: Decimal,
    instruments: FnvIndexMap<InstrumentName, InstrumentState>,
    /// Historical orders, append-only. Orders land here with their terminal
    /// status.
    orders: Vec<Order>,
    active_orders: FnvIndexMap<OrderId, Order>,
    /// Historical positions, append-only.
    positions: Vec<Position>,
    /// At most one net position per instrument.
    active_positions: FnvIndexMap<InstrumentName, Position>,
    deals: Vec<Deal>,
}

impl Account {
    pub fn new<S: Into<SmolStr>>(descriptor: S, initial_balance: Decimal) -> Self {
        Self {
            descriptor: descriptor.into(),
            initial_balance,
            balance: initial_balance,
            instruments: FnvIndexMap::default(),
            orders: Vec::new(),
            active_orders: FnvIndexMap::default(),
            positions: Vec::new(),
            active_positions: FnvIndexMap::default(),
            deals: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    // ---------------------------------------------------------------------
    // Instruments & market data
    // ---------------------------------------------------------------------

    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments
            .entry(instrument.name.clone())
            .or_insert_with(|| InstrumentState::new(instrument));
    }

    pub fn instrument(&self, name: &InstrumentName) -> Option<&InstrumentState> {
        self.instruments.get(name)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentState> {
        self.instruments.values()
    }

    pub fn latest_point(&self, name: &InstrumentName) -> Option<&Point> {
        self.instruments.get(name).and_then(InstrumentState::latest)
    }

    fn contract_size(&self, name: &InstrumentName) -> Decimal {
        self.instruments
            .get(name)
            .map(|state| state.instrument.contract_size_or_one())
            .unwrap_or(Decimal::ONE)
    }

    /// Append `point` to its instrument's series and fold it into the
    /// derived groups. Returns `None` when the instrument is unknown.
    pub fn apply_point(&mut self, point: &Point) -> Option<StreamAction> {
        let state = self.instruments.get_mut(&point.instrument)?;
        state.points.push(point.clone());
        state.groups.apply(point);
        Some(StreamAction::Create)
    }

    // ---------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.active_orders.values()
    }

    pub fn active_order(&self, id: &OrderId) -> Option<&Order> {
        self.active_orders.get(id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Whether `id` already names an active or historical order.
    pub fn id_in_use(&self, id: &OrderId) -> bool {
        self.active_orders.contains_key(id) || self.orders.iter().any(|order| order.id == *id)
    }

    /// Admit `order` into the working set.
    ///
    /// Fails on id collision with any active or historical order.
    pub fn add_order(&mut self, order: Order) -> Result<(), ExecutionError> {
        if self.id_in_use(&order.id) {
            return Err(ExecutionError::Validation(format!(
                "duplicate order id: {}",
                order.id
            )));
        }
        self.active_orders.insert(order.id.clone(), order);
        Ok(())
    }

    /// Replace an active order with a newer snapshot of itself.
    ///
    /// Status must move forward; a backwards transition is an internal bug.
    /// Terminal snapshots leave the working set and are archived.
    pub fn update_order(&mut self, order: Order) -> Result<(), ExecutionError> {
        let current = self.active_orders.get(&order.id).ok_or_else(|| {
            ExecutionError::Validation(format!("unknown active order: {}", order.id))
        })?;
        if !current.status.can_become(order.status) {
            return Err(ExecutionError::InvariantViolation(format!(
                "order {} status {:?} cannot become {:?}",
                order.id, current.status, order.status
            )));
        }
        if order.status.is_terminal() {
            self.active_orders.shift_remove(&order.id);
            self.orders.push(order);
        } else {
            self.active_orders.insert(order.id.clone(), order);
        }
        Ok(())
    }

    /// Take an order out of the working set without archiving it.
    pub fn remove_order(&mut self, id: &OrderId) -> Option<Order> {
        self.active_orders.shift_remove(id)
    }

    /// Append a terminal order snapshot to the history log.
    pub fn archive_order(&mut self, order: Order) {
        debug_assert!(order.status.is_terminal());
        self.orders.push(order);
    }

    /// Record a fill: archive the filled order and append a deal.
    pub fn record_fill(&mut self, order: &Order) -> Result<(), ExecutionError> {
        let transaction = order.transaction.as_ref().ok_or_else(|| {
            ExecutionError::InvariantViolation(format!(
                "filled order {} without transaction",
                order.id
            ))
        })?;
        self.deals.push(Deal {
            id: self.deals.len() as u64 + 1,
            name: order.name.clone(),
            side: order.side,
            price: transaction.price,
            volume: transaction.volume,
            time: transaction.time,
        });
        self.orders.push(order.clone());
        Ok(())
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    // ---------------------------------------------------------------------
    // Positions
    // ---------------------------------------------------------------------

    pub fn active_positions(&self) -> impl Iterator<Item = &Position> {
        self.active_positions.values()
    }

    pub fn active_position(&self, name: &InstrumentName) -> Option<&Position> {
        self.active_positions.get(name)
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Record which bracket orders guard the active position on `name`.
    pub fn set_position_brackets(
        &mut self,
        name: &InstrumentName,
        brackets: Vec<OrderId>,
    ) -> Result<(), ExecutionError> {
        let position = self.active_positions.get_mut(name).ok_or_else(|| {
            ExecutionError::InvariantViolation(format!("no active position on {name}"))
        })?;
        position.brackets = brackets;
        Ok(())
    }

    /// Net a filled order against the existing position on its instrument.
    ///
    /// Realised P&L from any closure is added to the balance; increase
    /// archives flat (basis transfers to the successor).
    pub fn open_position(&mut self, order: &Order) -> Result<NettingOutcome, ExecutionError> {
        let transaction = order.transaction.ok_or_else(|| {
            ExecutionError::InvariantViolation(format!(
                "open_position for order {} without transaction",
                order.id
            ))
        })?;
        let name = order.name.clone();
        let contract_size = self.contract_size(&name);

        let Some(existing) = self.active_positions.shift_remove(&name) else {
            let position = Position::open(order, &transaction);
            self.active_positions.insert(name, position.clone());
            return Ok(NettingOutcome::Opened(position));
        };

        if existing.side == order.side {
            // Increase: merge the ledgers and move the basis forward.
            let mut ledger = existing.open_prices.clone();
            ledger.push(Fill {
                price: transaction.price,
                volume: transaction.volume,
            });
            let open_price = Position::weighted_open(&ledger);

            let mut archived = existing;
            archived.archive_unrealised(open_price, transaction.time);
            self.positions.push(archived.clone());

            let active = Position {
                name: name.clone(),
                side: order.side,
                volume: archived.volume + transaction.volume,
                open_price,
                open_prices: ledger,
                time: transaction.time,
                close_time: None,
                close_price: None,
                gain_loss: None,
                gain_loss_points: None,
                brackets: Vec::new(),
            };
            self.active_positions.insert(name, active.clone());
            return Ok(NettingOutcome::Increased { archived, active });
        }

        if transaction.volume == existing.volume {
            // Flat close.
            let mut archived = existing;
            archived.close_at(transaction.price, transaction.time, contract_size);
            self.balance += archived.gain_loss.unwrap_or_default();
            self.positions.push(archived.clone());
            return Ok(NettingOutcome::Closed(archived));
        }

        if transaction.volume < existing.volume {
            // Partial reduce: archive the closed portion, keep the rest.
            let (mut closed, remainder) = existing.split(transaction.volume);
            closed.close_at(transaction.price, transaction.time, contract_size);
            self.balance += closed.gain_loss.unwrap_or_default();
            self.positions.push(closed.clone());
            self.active_positions.insert(name, remainder.clone());
            return Ok(NettingOutcome::Reduced {
                archived: closed,
                active: remainder,
            });
        }

        // Reverse: close fully, excess volume opens the other side.
        let mut archived = existing;
        archived.close_at(transaction.price, transaction.time, contract_size);
        self.balance += archived.gain_loss.unwrap_or_default();
        self.positions.push(archived.clone());

        let excess = transaction.volume - archived.volume;
        let reversal = Order {
            volume: excess,
            ..order.clone()
        };
        let active = Position::open(
            &reversal,
            &Transaction {
                volume: excess,
                ..transaction
            },
        );
        self.active_positions.insert(name, active.clone());
        Ok(NettingOutcome::Reversed { archived, active })
    }

    /// Close the active position on `name` at the current market.
    ///
    /// Uses the opposing top-of-book quote (bid for long, ask for short).
    /// No-op returning `None` when there is no such position or no market.
    pub fn close_position(&mut self, name: &InstrumentName) -> Option<Position> {
        let price = {
            let point = self.latest_point(name)?;
            let position = self.active_positions.get(name)?;
            match position.side {
                Side::Buy => point.bid?,
                Side::Sell => point.ask?,
            }
        };
        let time = self.latest_point(name).map(|point| point.time)?;
        let contract_size = self.contract_size(name);

        let mut archived = self.active_positions.shift_remove(name)?;
        archived.close_at(price, time, contract_size);
        self.balance += archived.gain_loss.unwrap_or_default();
        self.positions.push(archived.clone());
        Some(archived)
    }

    // ---------------------------------------------------------------------
    // Balance
    // ---------------------------------------------------------------------

    /// Re-derive the balance from the closed-position history.
    pub fn recompute(&mut self) {
        self.balance = self.initial_balance
            + self
                .positions
                .iter()
                .filter_map(|position| position.gain_loss)
                .sum::<Decimal>();
    }

    /// Mark-to-market P&L of the active position on `name`, without touching
    /// the balance.
    pub fn estimated_gain_loss(&self, name: &InstrumentName) -> Option<Decimal> {
        let position = self.active_positions.get(name)?;
        let last = self.latest_point(name)?.last?;
        Some(position.gain_loss_at(last, self.contract_size(name)))
    }

    /// Mark-to-market P&L across all active positions.
    pub fn estimated_gain_loss_total(&self) -> Decimal {
        self.active_positions
            .keys()
            .filter_map(|name| self.estimated_gain_loss(name))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arara_markets::InstrumentKind;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        let mut account = Account::new("sim-test", dec!(50000));
        account.add_instrument(Instrument::new("ES", InstrumentKind::Future));
        account
    }

    fn filled(id: &str, side: Side, price: Decimal, volume: Decimal) -> Order {
        let mut order = Order::market(id, "ES", side, volume);
        order.status = OrderStatus::Filled;
        order.transaction = Some(Transaction {
            time: Utc.timestamp_opt(0, 0).unwrap(),
            price,
            volume,
        });
        order
    }

    #[test]
    fn test_open_then_flat_close() {
        let mut account = account();

        let outcome = account.open_position(&filled("o-1", Side::Buy, dec!(101), dec!(1)));
        assert!(matches!(outcome, Ok(NettingOutcome::Opened(_))));
        assert_eq!(account.balance(), dec!(50000));

        let outcome = account
            .open_position(&filled("o-2", Side::Sell, dec!(105), dec!(1)))
            .unwrap();
        assert!(matches!(outcome, NettingOutcome::Closed(_)));
        assert!(account.active_position(&InstrumentName::from("ES")).is_none());
        assert_eq!(account.balance(), dec!(50004));
    }

    #[test]
    fn test_increase_averages_open_price_and_realises_nothing() {
        let mut account = account();
        account
            .open_position(&filled("o-1", Side::Buy, dec!(101), dec!(1)))
            .unwrap();
        let outcome = account
            .open_position(&filled("o-2", Side::Buy, dec!(103), dec!(1)))
            .unwrap();

        let NettingOutcome::Increased { archived, active } = outcome else {
            panic!("expected increase");
        };
        assert_eq!(active.volume, dec!(2));
        assert_eq!(active.open_price, dec!(102));
        assert_eq!(archived.gain_loss, Some(Decimal::ZERO));
        assert_eq!(archived.close_price, Some(dec!(102)));
        assert_eq!(account.balance(), dec!(50000));
    }

    #[test]
    fn test_partial_reduce_realises_closed_volume_only() {
        let mut account = account();
        account
            .open_position(&filled("o-1", Side::Buy, dec!(100), dec!(2)))
            .unwrap();
        let outcome = account
            .open_position(&filled("o-2", Side::Sell, dec!(110), dec!(1)))
            .unwrap();

        let NettingOutcome::Reduced { archived, active } = outcome else {
            panic!("expected reduce");
        };
        assert_eq!(archived.volume, dec!(1));
        assert_eq!(archived.gain_loss, Some(dec!(10)));
        assert_eq!(active.volume, dec!(1));
        assert_eq!(active.open_price, dec!(100));
        assert_eq!(account.balance(), dec!(50010));
    }

    #[test]
    fn test_reversal_flips_side() {
        let mut account = account();
        account
            .open_position(&filled("o-1", Side::Buy, dec!(100), dec!(2)))
            .unwrap();
        let outcome = account
            .open_position(&filled("o-2", Side::Sell, dec!(105), dec!(5)))
            .unwrap();

        let NettingOutcome::Reversed { archived, active } = outcome else {
            panic!("expected reversal");
        };
        assert_eq!(archived.gain_loss, Some(dec!(10)));
        assert_eq!(active.side, Side::Sell);
        assert_eq!(active.volume, dec!(3));
        assert_eq!(active.open_price, dec!(105));
        assert_eq!(account.balance(), dec!(50010));
    }

    #[test]
    fn test_at_most_one_position_per_instrument() {
        let mut account = account();
        account
            .open_position(&filled("o-1", Side::Buy, dec!(100), dec!(1)))
            .unwrap();
        account
            .open_position(&filled("o-2", Side::Buy, dec!(102), dec!(1)))
            .unwrap();
        assert_eq!(account.active_positions().count(), 1);
    }

    #[test]
    fn test_balance_matches_closed_history_after_recompute() {
        let mut account = account();
        account
            .open_position(&filled("o-1", Side::Buy, dec!(100), dec!(2)))
            .unwrap();
        account
            .open_position(&filled("o-2", Side::Sell, dec!(103), dec!(2)))
            .unwrap();

        let realised: Decimal = account
            .positions()
            .iter()
            .filter_map(|position| position.gain_loss)
            .sum();
        account.recompute();
        assert_eq!(account.balance(), account.initial_balance() + realised);
    }

    #[test]
    fn test_duplicate_order_id_rejected() {
        let mut account = account();
        account
            .add_order(Order::limit("o-1", "ES", Side::Buy, dec!(1), dec!(99)))
            .unwrap();
        let duplicate = account.add_order(Order::limit("o-1", "ES", Side::Sell, dec!(1), dec!(120)));
        assert!(matches!(duplicate, Err(ExecutionError::Validation(_))));
    }

    #[test]
    fn test_backwards_status_transition_is_invariant_violation() {
        let mut account = account();
        let mut order = Order::limit("o-1", "ES", Side::Buy, dec!(1), dec!(99));
        order.status = OrderStatus::Placed;
        account.add_order(order.clone()).unwrap();

        order.status = OrderStatus::New;
        assert!(matches!(
            account.update_order(order),
            Err(ExecutionError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_close_nonexistent_position_is_noop() {
        let mut account = account();
        assert!(account.close_position(&InstrumentName::from("ES")).is_none());
        assert_eq!(account.balance(), dec!(50000));
    }

    #[test]
    fn test_estimated_gain_loss_does_not_touch_balance() {
        let mut account = account();
        let name = InstrumentName::from("ES");
        account
            .open_position(&filled("o-1", Side::Buy, dec!(100), dec!(1)))
            .unwrap();
        let point = Point::new(
            name.clone(),
            Utc.timestamp_opt(1, 0).unwrap(),
            Some(dec!(104)),
            dec!(1),
            Some(dec!(105)),
            dec!(1),
        );
        account.apply_point(&point);

        assert_eq!(account.estimated_gain_loss(&name), Some(dec!(5)));
        assert_eq!(account.balance(), dec!(50000));
    }
}
