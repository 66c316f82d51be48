//! End-to-end simulator sessions driven through the public `Gateway`
//! contract: tick files replayed on a virtual clock, orders submitted
//! between ticks, state observed through snapshots and event streams.

use arara_execution::{
    gateway::{AccountCriteria, ConnectionStatus, Gateway},
    order::{Order, OrderStatus},
    position::Position,
    Simulator, SimulatorConfig,
};
use arara_data::Point;
use arara_integration::stream::{StreamAction, StreamEvent, StreamSub};
use arara_markets::{Instrument, InstrumentKind, InstrumentName, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use smol_str::SmolStr;
use std::{fs::File, io::Write, path::Path, time::Duration};
use tempfile::TempDir;

const SPEED: Duration = Duration::from_millis(100);

fn write_ticks(dir: &Path, name: &str, lines: &[&str]) {
    let mut file = File::create(dir.join(name)).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn simulator(dir: &TempDir) -> Simulator {
    Simulator::new(SimulatorConfig {
        speed: SPEED,
        source: dir.path().to_path_buf(),
        initial_balance: dec!(50000),
        descriptor: SmolStr::new("sim"),
    })
}

async fn subscribe_all(simulator: &mut Simulator, names: &[&str]) {
    for name in names {
        let response = simulator
            .subscribe(Instrument::new(*name, InstrumentKind::Future))
            .await;
        assert!(response.is_ok());
    }
}

async fn next_point(sub: &mut StreamSub<Point>) -> Point {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for point")
        .expect("point stream ended")
        .next
}

async fn next_position_event(sub: &mut StreamSub<Position>) -> StreamEvent<Position> {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for position event")
        .expect("position stream ended")
}

async fn snapshot(simulator: &mut Simulator) -> arara_execution::gateway::AccountSnapshot {
    simulator
        .account(AccountCriteria::default())
        .await
        .into_result()
        .expect("account snapshot")
}

#[tokio::test]
async fn test_single_market_buy_opens_position_without_touching_balance() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 100 1 101 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    let mut positions = sim.streams().positions.subscribe();
    assert!(sim.connect().await.is_ok());

    next_point(&mut points).await;

    let filled = sim
        .create_orders(vec![Order::market("o-1", "ES", Side::Buy, dec!(1))])
        .await
        .into_result()
        .unwrap();
    assert_eq!(filled[0].status, OrderStatus::Filled);
    assert_eq!(filled[0].transaction.unwrap().price, dec!(101));

    let opened = next_position_event(&mut positions).await;
    assert_eq!(opened.action, StreamAction::Create);
    assert_eq!(opened.next.side, Side::Buy);
    assert_eq!(opened.next.volume, dec!(1));
    assert_eq!(opened.next.open_price, dec!(101));

    let snapshot = snapshot(&mut sim).await;
    assert_eq!(snapshot.balance, dec!(50000));
    assert_eq!(snapshot.positions.len(), 1);

    sim.disconnect().await;
}

#[tokio::test]
async fn test_increase_then_flat_close_realises_against_average_open() {
    let dir = TempDir::new().unwrap();
    write_ticks(
        dir.path(),
        "ES",
        &["0 100 1 101 1", "1 102 1 103 1", "2 105 1 106 1"],
    );

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    let mut positions = sim.streams().positions.subscribe();
    assert!(sim.connect().await.is_ok());

    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-1", "ES", Side::Buy, dec!(1))])
        .await
        .into_result()
        .unwrap();
    assert_eq!(next_position_event(&mut positions).await.action, StreamAction::Create);

    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-2", "ES", Side::Buy, dec!(1))])
        .await
        .into_result()
        .unwrap();

    let increased = next_position_event(&mut positions).await;
    assert_eq!(increased.action, StreamAction::Update);
    assert_eq!(increased.next.volume, dec!(2));
    assert_eq!(increased.next.open_price, dec!(102));
    // The predecessor archives flat at the merged open price.
    assert_eq!(increased.previous.as_ref().unwrap().gain_loss, Some(Decimal::ZERO));

    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-3", "ES", Side::Sell, dec!(2))])
        .await
        .into_result()
        .unwrap();

    let closed = next_position_event(&mut positions).await;
    assert_eq!(closed.action, StreamAction::Delete);
    assert_eq!(closed.next.gain_loss, Some(dec!(6)));

    let snapshot = snapshot(&mut sim).await;
    assert!(snapshot.positions.is_empty());
    assert_eq!(snapshot.balance, dec!(50006));

    sim.disconnect().await;
}

#[tokio::test]
async fn test_sell_stop_triggers_on_bid_and_closes_position() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 100 1 101 1", "1 98 1 99 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    let mut positions = sim.streams().positions.subscribe();
    assert!(sim.connect().await.is_ok());

    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-1", "ES", Side::Buy, dec!(1))])
        .await
        .into_result()
        .unwrap();
    next_position_event(&mut positions).await;

    let placed = sim
        .create_orders(vec![Order::stop("o-2", "ES", Side::Sell, dec!(1), dec!(99))])
        .await
        .into_result()
        .unwrap();
    assert_eq!(placed[0].status, OrderStatus::Placed);

    // Next tick: bid 98 <= 99 triggers the stop, filled at the bid.
    next_point(&mut points).await;
    let closed = next_position_event(&mut positions).await;
    assert_eq!(closed.action, StreamAction::Delete);
    assert_eq!(closed.next.close_price, Some(dec!(98)));
    assert_eq!(closed.next.gain_loss, Some(dec!(-3)));

    let snapshot = snapshot(&mut sim).await;
    assert_eq!(snapshot.balance, dec!(49997));
    assert!(snapshot.positions.is_empty());
    assert!(snapshot.orders.is_empty());

    sim.disconnect().await;
}

#[tokio::test]
async fn test_brackets_cancelled_when_position_goes_flat() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 100 1 101 1", "1 102 1 103 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    assert!(sim.connect().await.is_ok());

    next_point(&mut points).await;
    let parent = Order::market("o-1", "ES", Side::Buy, dec!(1))
        .with_bracket(Order::limit("tp-1", "ES", Side::Sell, dec!(1), dec!(110)))
        .with_bracket(Order::stop("sl-1", "ES", Side::Sell, dec!(1), dec!(95)));
    sim.create_orders(vec![parent]).await.into_result().unwrap();

    let snapshot_open = snapshot(&mut sim).await;
    let working: Vec<_> = snapshot_open
        .orders
        .iter()
        .map(|order| order.id.to_string())
        .collect();
    assert!(working.contains(&"tp-1".to_string()));
    assert!(working.contains(&"sl-1".to_string()));
    assert_eq!(snapshot_open.positions[0].brackets.len(), 2);

    // Wait for the next tick (which triggers neither bracket), then close
    // manually with an opposite market order.
    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-2", "ES", Side::Sell, dec!(1))])
        .await
        .into_result()
        .unwrap();

    let snapshot_flat = snapshot(&mut sim).await;
    assert!(snapshot_flat.positions.is_empty());
    assert!(snapshot_flat.orders.is_empty(), "brackets must be cancelled");

    sim.disconnect().await;
}

#[tokio::test]
async fn test_merge_tie_break_emits_lexicographically_smaller_name_first() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "AAA", &["5 10 1 11 1"]);
    write_ticks(dir.path(), "BBB", &["5 20 1 21 1"]);

    let mut sim = simulator(&dir);
    // Subscribe in reverse order; emission order must not depend on it.
    subscribe_all(&mut sim, &["BBB", "AAA"]).await;
    let mut points = sim.streams().points.subscribe();
    assert!(sim.connect().await.is_ok());

    assert_eq!(next_point(&mut points).await.instrument.as_str(), "AAA");
    assert_eq!(next_point(&mut points).await.instrument.as_str(), "BBB");

    sim.disconnect().await;
}

#[tokio::test]
async fn test_reversal_realises_and_flips_side() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 99 1 100 1", "1 105 1 106 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    let mut positions = sim.streams().positions.subscribe();
    assert!(sim.connect().await.is_ok());

    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-1", "ES", Side::Buy, dec!(2))])
        .await
        .into_result()
        .unwrap();
    next_position_event(&mut positions).await;

    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-2", "ES", Side::Sell, dec!(5))])
        .await
        .into_result()
        .unwrap();

    let reversed = next_position_event(&mut positions).await;
    assert_eq!(reversed.action, StreamAction::Update);
    assert_eq!(reversed.previous.as_ref().unwrap().gain_loss, Some(dec!(10)));
    assert_eq!(reversed.next.side, Side::Sell);
    assert_eq!(reversed.next.volume, dec!(3));
    assert_eq!(reversed.next.open_price, dec!(105));

    let snapshot = snapshot(&mut sim).await;
    assert_eq!(snapshot.balance, dec!(50010));

    sim.disconnect().await;
}

#[tokio::test]
async fn test_invalid_orders_are_rejected_without_state_changes() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 100 1 101 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    assert!(sim.connect().await.is_ok());
    next_point(&mut points).await;

    let results = sim
        .create_orders(vec![
            Order::market("bad-1", "ES", Side::Buy, dec!(0)),
            Order::market("bad-2", "UNKNOWN", Side::Buy, dec!(1)),
            Order {
                price: None,
                ..Order::limit("bad-3", "ES", Side::Buy, dec!(1), dec!(99))
            },
        ])
        .await
        .into_result()
        .unwrap();

    assert!(results
        .iter()
        .all(|order| order.status == OrderStatus::Rejected));

    let snapshot = snapshot(&mut sim).await;
    assert_eq!(snapshot.balance, dec!(50000));
    assert!(snapshot.orders.is_empty());
    assert!(snapshot.positions.is_empty());

    sim.disconnect().await;
}

#[tokio::test]
async fn test_resting_order_is_not_filled_at_admission() {
    let dir = TempDir::new().unwrap();
    // Immediately executable limit: ask 101 >= 101. Still only filled on the
    // next tick, of which there is none.
    write_ticks(dir.path(), "ES", &["0 100 1 101 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    assert!(sim.connect().await.is_ok());
    next_point(&mut points).await;

    let placed = sim
        .create_orders(vec![Order::limit("o-1", "ES", Side::Sell, dec!(1), dec!(101))])
        .await
        .into_result()
        .unwrap();
    assert_eq!(placed[0].status, OrderStatus::Placed);

    let snapshot = snapshot(&mut sim).await;
    assert_eq!(snapshot.orders.len(), 1);
    assert!(snapshot.positions.is_empty());

    sim.disconnect().await;
}

#[tokio::test]
async fn test_delete_of_cancelled_order_is_noop() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 100 1 101 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    assert!(sim.connect().await.is_ok());
    next_point(&mut points).await;

    let order = Order::limit("o-1", "ES", Side::Buy, dec!(1), dec!(90));
    sim.create_orders(vec![order.clone()]).await.into_result().unwrap();

    let cancelled = sim
        .delete_orders(vec![order.clone()])
        .await
        .into_result()
        .unwrap();
    assert_eq!(cancelled[0].status, OrderStatus::Cancelled);

    // Second delete finds nothing to do and echoes the input back.
    let again = sim
        .delete_orders(vec![cancelled[0].clone()])
        .await
        .into_result()
        .unwrap();
    assert_eq!(again[0].status, OrderStatus::Cancelled);

    let snapshot = snapshot(&mut sim).await;
    assert!(snapshot.orders.is_empty());

    sim.disconnect().await;
}

#[tokio::test]
async fn test_connect_is_idempotent_and_disconnect_clears_subscriptions() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 100 1 101 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;

    assert_eq!(
        sim.connect().await.into_result().unwrap(),
        ConnectionStatus::Connected
    );
    // Reconnect tears the previous session down internally.
    assert_eq!(
        sim.connect().await.into_result().unwrap(),
        ConnectionStatus::Connected
    );
    assert!(sim.is_connected());
    assert_eq!(sim.subscription_count(), 1);

    assert_eq!(
        sim.disconnect().await.into_result().unwrap(),
        ConnectionStatus::Disconnected
    );
    assert!(!sim.is_connected());
    assert_eq!(sim.subscription_count(), 0);

    // Disconnecting an already-disconnected gateway is safe.
    assert!(sim.disconnect().await.is_ok());
}

#[tokio::test]
async fn test_every_fill_emits_exactly_one_position_delta() {
    let dir = TempDir::new().unwrap();
    write_ticks(
        dir.path(),
        "ES",
        &["0 100 1 101 1", "1 102 1 103 1", "2 104 1 105 1"],
    );

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    let mut orders = sim.streams().orders.subscribe();
    let mut positions = sim.streams().positions.subscribe();
    assert!(sim.connect().await.is_ok());

    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-1", "ES", Side::Buy, dec!(1))])
        .await
        .into_result()
        .unwrap();
    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-2", "ES", Side::Buy, dec!(1))])
        .await
        .into_result()
        .unwrap();
    next_point(&mut points).await;
    sim.create_orders(vec![Order::market("o-3", "ES", Side::Sell, dec!(2))])
        .await
        .into_result()
        .unwrap();
    sim.disconnect().await;

    let mut fills = 0;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(50), orders.recv()).await
    {
        if event.next.status == OrderStatus::Filled {
            fills += 1;
        }
    }
    let mut deltas = 0;
    while let Ok(Some(_)) =
        tokio::time::timeout(Duration::from_millis(50), positions.recv()).await
    {
        deltas += 1;
    }
    assert_eq!(fills, 3);
    assert_eq!(deltas, fills);
}

#[tokio::test]
async fn test_points_query_returns_series_and_options_is_not_implemented() {
    let dir = TempDir::new().unwrap();
    write_ticks(dir.path(), "ES", &["0 100 1 101 1"]);

    let mut sim = simulator(&dir);
    subscribe_all(&mut sim, &["ES"]).await;
    let mut points = sim.streams().points.subscribe();
    assert!(sim.connect().await.is_ok());
    next_point(&mut points).await;

    let name = InstrumentName::from("ES");
    let series = sim.points(&name).await.into_result().unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].ask, Some(dec!(101)));

    let dom = sim.dom(&name).await.into_result().unwrap();
    assert_eq!(dom.asks.len(), 1);

    let options = sim.options(&name).await;
    assert_eq!(options.errors[0].code, Some(4));

    sim.disconnect().await;
}
