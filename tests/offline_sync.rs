use std::rc::Rc;

use chrono::NaiveDate;
use futures::executor::block_on;
use liftlog::remote::RemoteCall;
use liftlog::{
    Config, EditOutcome, ManualConnectivity, MemoryRemote, MemoryStore, RecordId, SetEntry, SyncEngine,
    SyncStatus, UserId,
};

type Engine = SyncEngine<MemoryStore, Rc<MemoryRemote>, ManualConnectivity>;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

fn engine(store: &MemoryStore, remote: &Rc<MemoryRemote>, conn: &ManualConnectivity) -> Engine {
    SyncEngine::new(
        UserId::new("athlete"),
        Rc::new(store.clone()),
        Rc::new(Config::default()),
        remote.clone(),
        conn.clone(),
    )
}

#[test]
fn test_offline_edits_survive_restart_and_upload_once_online() {
    let store = MemoryStore::new();
    let remote = Rc::new(MemoryRemote::new());
    let conn = ManualConnectivity::new(false);

    let first_run = engine(&store, &remote, &conn);
    block_on(async {
        assert_eq!(first_run.record_set_edit(date(5), "Squat", 0, 5, 60.0).await.unwrap(), EditOutcome::Queued);
        assert_eq!(first_run.record_set_edit(date(5), "Squat", 1, 5, 62.5).await.unwrap(), EditOutcome::Queued);
        assert_eq!(first_run.record_set_edit(date(7), "Bench", 0, 8, 40.0).await.unwrap(), EditOutcome::Queued);
    });
    assert!(remote.calls().is_empty());
    drop(first_run);

    // page reload: everything comes back from local storage
    let engine = engine(&store, &remote, &conn);
    assert_eq!(engine.pending_count(), 2);
    assert_eq!(engine.status(date(5)), SyncStatus::Pending);
    assert_eq!(engine.records(date(5))[0].sets.len(), 2);
    assert!(engine.records(date(5))[0].id.is_temporary());

    conn.set_online(true);
    let report = block_on(engine.reconcile());
    assert!(report.is_clean());
    assert_eq!(report.synced, vec![date(5), date(7)]);
    assert_eq!(report.writes, 2);
    assert_eq!(
        remote.calls(),
        vec![
            RemoteCall::List(date(5)),
            RemoteCall::Create { date: date(5), exercise: "Squat".into() },
            RemoteCall::List(date(7)),
            RemoteCall::Create { date: date(7), exercise: "Bench".into() },
        ]
    );

    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.status(date(7)), SyncStatus::Synced);
    let records = engine.records(date(5));
    let squat = &records[0];
    let RecordId::Remote(id) = squat.id else {
        panic!("squat was not promoted: {:?}", squat.id);
    };
    assert_eq!(remote.row(id).unwrap().sets[&1], SetEntry { reps: 5, weight: 62.5 });
}

#[test]
fn test_online_edits_write_through_with_create_then_update() {
    let store = MemoryStore::new();
    let remote = Rc::new(MemoryRemote::new());
    let conn = ManualConnectivity::new(true);
    let engine = engine(&store, &remote, &conn);

    let first = block_on(engine.record_set_edit(date(9), "Front Squat", 0, 6, 50.0)).unwrap();
    let EditOutcome::Synced(id) = first else {
        panic!("expected write-through, got {:?}", first);
    };
    let second = block_on(engine.record_set_edit(date(9), "Front Squat", 1, 6, 52.5)).unwrap();
    assert_eq!(second, EditOutcome::Synced(id));

    assert_eq!(
        remote.calls(),
        vec![
            RemoteCall::Create { date: date(9), exercise: "Front Squat".into() },
            RemoteCall::Update(id),
        ]
    );
    assert_eq!(remote.row(id).unwrap().sets.len(), 2);
    assert_eq!(engine.status(date(9)), SyncStatus::Synced);
}

#[test]
fn test_failed_write_through_is_picked_up_by_the_next_sweep() {
    let store = MemoryStore::new();
    let remote = Rc::new(MemoryRemote::new());
    let conn = ManualConnectivity::new(true);
    let engine = engine(&store, &remote, &conn);

    remote.set_reachable(false);
    let outcome = block_on(engine.record_set_edit(date(12), "Row", 0, 10, 35.0)).unwrap();
    assert!(matches!(outcome, EditOutcome::Deferred(_)));
    assert_eq!(engine.status(date(12)), SyncStatus::Pending);

    let report = block_on(engine.reconcile());
    assert_eq!(report.failed, vec![date(12)]);
    assert_eq!(engine.pending_count(), 1);

    remote.set_reachable(true);
    let report = block_on(engine.reconcile());
    assert_eq!(report.synced, vec![date(12)]);
    assert_eq!(remote.rows().len(), 1);
    assert_eq!(remote.rows()[0].exercise_name, "Row");
}
