//! Full session from a `SystemConfig`: configuration in, simulator gateway
//! out, one order round-tripped through the contract.

use arara_core::SystemConfig;
use arara_execution::{
    gateway::{AccountCriteria, Gateway},
    order::{Order, OrderStatus},
    Simulator,
};
use arara_markets::{Instrument, InstrumentKind, Side};
use rust_decimal_macros::dec;
use std::{fs::File, io::Write, time::Duration};
use tempfile::TempDir;

#[tokio::test]
async fn test_simulator_session_from_system_config() {
    let dir = TempDir::new().unwrap();
    let mut file = File::create(dir.path().join("ES")).unwrap();
    writeln!(file, "0 100 1 101 1").unwrap();

    let config: SystemConfig = serde_json::from_str(&format!(
        r#"{{
            "Speed": 50,
            "Source": {:?},
            "InitialBalance": 50000,
            "Account": {{"Descriptor": "terminal-1"}}
        }}"#,
        dir.path()
    ))
    .unwrap();

    let mut sim = Simulator::new(config.simulator());
    sim.subscribe(Instrument::new("ES", InstrumentKind::Future))
        .await;
    let mut points = sim.streams().points.subscribe();
    assert!(sim.connect().await.is_ok());

    tokio::time::timeout(Duration::from_secs(2), points.recv())
        .await
        .expect("timed out waiting for first tick")
        .expect("point stream ended");

    let filled = sim
        .create_orders(vec![Order::market("o-1", "ES", Side::Buy, dec!(1))])
        .await
        .into_result()
        .unwrap();
    assert_eq!(filled[0].status, OrderStatus::Filled);

    let snapshot = sim
        .account(AccountCriteria::default())
        .await
        .into_result()
        .unwrap();
    assert_eq!(snapshot.descriptor, "terminal-1");
    assert_eq!(snapshot.balance, dec!(50000));
    assert_eq!(snapshot.positions.len(), 1);

    sim.disconnect().await;
}
