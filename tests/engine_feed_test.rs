//! End-to-end behavior of the engine's event feed and dedup through channel sources

use livemap_engine::{
    ChannelRecordSource, EngineConfig, GameResult, LiveMapEngine, UserRecord,
};
use std::time::Duration;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_duplicate_delivery_yields_one_event_and_one_delta() {
    let mut engine = LiveMapEngine::new(EngineConfig::default());
    let (source, tx) = ChannelRecordSource::new(Vec::new());
    engine.attach_record_source(source);

    let record = UserRecord::new("u1", "Japanese").with_result("t1", GameResult::new(1000, 50.0));
    tx.send(record.clone()).await.unwrap();
    tx.send(record).await.unwrap();
    settle().await;

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.total_users, 1);
    assert_eq!(snapshot.regions[0].plays, 1);
    assert_eq!(snapshot.regions[0].purified, 5);
    assert_eq!(engine.recent_events().await.len(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_feed_is_capped_and_newest_first() {
    let mut engine = LiveMapEngine::new(EngineConfig::default());
    let (source, tx) = ChannelRecordSource::new(Vec::new());
    engine.attach_record_source(source);

    for i in 0..25 {
        tx.send(UserRecord::new(format!("u{}", i), "Japanese"))
            .await
            .unwrap();
    }
    settle().await;

    let events = engine.recent_events().await;
    assert_eq!(events.len(), 20);
    for pair in events.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    // All 25 users still counted; only the displayed feed is bounded.
    assert_eq!(engine.snapshot().await.total_users, 25);
    assert_eq!(engine.last_minute_count().await, 25);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unknown_locale_contributes_nothing() {
    let mut engine = LiveMapEngine::new(EngineConfig::default());
    let (source, tx) = ChannelRecordSource::new(Vec::new());
    engine.attach_record_source(source);

    tx.send(UserRecord::new("u1", "Klingon")).await.unwrap();
    tx.send(UserRecord::new("u2", "Japanese")).await.unwrap();
    settle().await;

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.total_users, 1);
    assert_eq!(snapshot.regions.len(), 1);
    assert_eq!(engine.recent_events().await.len(), 1);

    engine.shutdown().await;
}
