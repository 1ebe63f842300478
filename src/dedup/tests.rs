use super::*;

#[test]
fn test_first_sighting_applies() {
    let mut dedup = CommandDeduplicator::default();
    let id = CommandId::from("cmd_1");

    assert!(dedup.should_apply(&id, 0.0));
    dedup.remember(id.clone(), 0.0);
    assert!(!dedup.should_apply(&id, 10.0));
}

#[test]
fn test_replay_applies_exactly_once() {
    let mut dedup = CommandDeduplicator::default();
    let id = CommandId::from("play_1");

    let applied = (0..10)
        .filter(|i| dedup.admit(&id, f64::from(*i) * 100.0))
        .count();

    assert_eq!(applied, 1);
    assert_eq!(dedup.duplicates(), 9);
}

#[test]
fn test_eviction_after_retention() {
    let mut dedup = CommandDeduplicator::new(Duration::from_secs(5));
    let id = CommandId::from("seek_1");

    assert!(dedup.admit(&id, 1_000.0));
    assert!(!dedup.should_apply(&id, 5_999.0));
    assert!(dedup.should_apply(&id, 6_000.0));
    assert!(dedup.is_empty());
}

#[test]
fn test_out_of_order_ids_tracked_independently() {
    let mut dedup = CommandDeduplicator::default();
    let a = CommandId::from("a");
    let b = CommandId::from("b");

    assert!(dedup.admit(&b, 0.0));
    assert!(dedup.admit(&a, 1.0));
    assert!(!dedup.admit(&b, 2.0));
    assert!(!dedup.admit(&a, 3.0));
    assert_eq!(dedup.len(), 2);
}

#[test]
fn test_ledger_separates_types() {
    let mut ledger = CommandLedger::default();
    let id = CommandId::from("shared");

    assert!(ledger.admit(CommandType::Play, &id, 0.0));
    assert!(ledger.admit(CommandType::Pause, &id, 0.0));
    assert!(ledger.admit(CommandType::Seek, &id, 0.0));
    assert!(!ledger.admit(CommandType::Play, &id, 1.0));
    assert_eq!(ledger.duplicates(), 1);
}

#[test]
fn test_clear_forgets() {
    let mut ledger = CommandLedger::default();
    let id = CommandId::from("x");
    ledger.admit(CommandType::Seek, &id, 0.0);

    ledger.clear();

    assert!(ledger.admit(CommandType::Seek, &id, 1.0));
}
