//! Per-channel delivery order tests.

use crate::{Bus, MemoryBus};
use serde_json::json;

/// Publishes within one channel arrive in publish order.
#[tokio::test]
async fn publish_order_preserved_per_channel() {
    let bus = MemoryBus::new();
    let mut rx = bus.subscribe("cursor").await.unwrap();

    for n in 0..20 {
        bus.publish(&["cursor".to_string()], json!(n)).await.unwrap();
    }

    for n in 0..20 {
        assert_eq!(rx.recv().await.unwrap().payload, json!(n));
    }
}

/// Every subscriber connected for two publishes sees them in order:
/// P1 then P2, never P2 then P1.
#[tokio::test]
async fn last_write_wins_order_for_all_subscribers() {
    let bus = MemoryBus::new();

    let mut rx_a = bus.subscribe("presence").await.unwrap();
    let mut rx_b = bus.subscribe("presence").await.unwrap();

    bus.publish(&["presence".to_string()], json!({ "cell": "A1" }))
        .await
        .unwrap();
    bus.publish(&["presence".to_string()], json!({ "cell": "B2" }))
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        assert_eq!(rx.recv().await.unwrap().payload, json!({ "cell": "A1" }));
        assert_eq!(rx.recv().await.unwrap().payload, json!({ "cell": "B2" }));
    }
}

/// A subscriber joining between publishes only sees later ones: no replay.
#[tokio::test]
async fn no_replay_for_late_subscribers() {
    let bus = MemoryBus::new();
    let mut early = bus.subscribe("presence").await.unwrap();

    bus.publish(&["presence".to_string()], json!("first")).await.unwrap();

    let mut late = bus.subscribe("presence").await.unwrap();
    bus.publish(&["presence".to_string()], json!("second")).await.unwrap();

    assert_eq!(early.recv().await.unwrap().payload, json!("first"));
    assert_eq!(early.recv().await.unwrap().payload, json!("second"));

    // the late joiner never sees "first"
    assert_eq!(late.recv().await.unwrap().payload, json!("second"));
    assert!(late.try_recv().is_err());
}

/// Order holds across interleaved multi-channel publishes.
#[tokio::test]
async fn order_preserved_with_interleaved_channels() {
    let bus = MemoryBus::new();
    let mut rx = bus.subscribe("a").await.unwrap();

    for n in 0..10 {
        // every other publish also targets a channel rx ignores
        let channels = if n % 2 == 0 {
            vec!["a".to_string(), "b".to_string()]
        } else {
            vec!["a".to_string()]
        };
        bus.publish(&channels, json!(n)).await.unwrap();
    }

    for n in 0..10 {
        assert_eq!(rx.recv().await.unwrap().payload, json!(n));
    }
}
