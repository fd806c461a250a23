use mood_journal_lib::db::{export_store_to_csv, Database};
use mood_journal_lib::models::NewEntry;
use mood_journal_lib::session::{AppendState, JournalSession, SessionUpdate};
use mood_journal_lib::worker::{StorageWorker, WorkerEvent};
use std::fs;
use std::path::Path;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Duration};

fn start(dir: &Path) -> (JournalSession, UnboundedReceiver<WorkerEvent>) {
    let db = Database::initialize(&dir.join("journal.sqlite3"), &dir.join("journal.json"))
        .expect("initialize store");
    let (worker, events) = StorageWorker::spawn(db).expect("spawn worker");
    (JournalSession::new(worker), events)
}

async fn next_update(
    session: &mut JournalSession,
    events: &mut UnboundedReceiver<WorkerEvent>,
) -> SessionUpdate {
    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("worker answered in time")
        .expect("worker still running");
    session.handle_event(event)
}

async fn archive(
    session: &mut JournalSession,
    events: &mut UnboundedReceiver<WorkerEvent>,
    entry: NewEntry,
) {
    session.submit(entry, None).expect("submit");
    assert_eq!(next_update(session, events).await, SessionUpdate::Archived { reminder: None });
    assert!(matches!(next_update(session, events).await, SessionUpdate::HistoryChanged(_)));
}

#[tokio::test]
async fn entries_survive_a_restart_in_newest_first_order() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let (mut session, mut events) = start(dir.path());
        let mut first = NewEntry::new("coffee with an old friend", "joyful");
        first.body_sensation = "   warm hands   ".to_string();
        first.emotion_intensity = 7.0;
        archive(&mut session, &mut events, first).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        archive(&mut session, &mut events, NewEntry::new("", "")).await;
        assert_eq!(session.state(), AppendState::Idle);
        assert!(session.shutdown(Duration::from_secs(2)).await);
    }

    let (mut session, mut events) = start(dir.path());
    assert!(session.refresh().expect("refresh").is_none());
    let entries = match next_update(&mut session, &mut events).await {
        SessionUpdate::HistoryChanged(entries) => entries,
        other => panic!("unexpected update {:?}", other),
    };

    assert_eq!(entries.len(), 2);
    assert!(entries[0].id > entries[1].id);
    assert_eq!(entries[0].mood, "");
    assert_eq!(entries[0].text, "");
    assert_eq!(entries[1].body_sensation, "warm hands");
    assert_eq!(entries[1].emotion_intensity, 5.0);
    assert_eq!(entries[1].energy_level, 3.0);

    assert!(session.shutdown(Duration::from_secs(2)).await);
}

#[tokio::test]
async fn legacy_journal_is_imported_once_into_an_empty_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = dir.path().join("journal.json");
    let original = r#"{"moments": [
        {"id": 1700000000000, "timestamp": "2023-11-14T22:13:20+00:00",
         "mood": "calm", "text": "old note"},
        {"timestamp": "2023-11-15T08:00:00+00:00", "text": "no id here", "emotion_intensity": 4}
    ]}"#;
    fs::write(&legacy, original).expect("write legacy journal");

    let (mut session, mut events) = start(dir.path());
    session.refresh().expect("refresh");
    let entries = match next_update(&mut session, &mut events).await {
        SessionUpdate::HistoryChanged(entries) => entries,
        other => panic!("unexpected update {:?}", other),
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "no id here");
    assert_eq!(entries[0].mood, "unspecified");
    assert_eq!(entries[1].id, 1700000000000);
    assert!(session.shutdown(Duration::from_secs(2)).await);

    assert_eq!(fs::read_to_string(&legacy).expect("legacy untouched"), original);

    let reopened =
        Database::initialize(&dir.path().join("journal.sqlite3"), &legacy).expect("reopen");
    assert_eq!(reopened.count_entries().expect("count"), 2);
}

#[tokio::test]
async fn export_through_the_worker_matches_direct_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut session, mut events) = start(dir.path());
    archive(&mut session, &mut events, NewEntry::new("one", "calm")).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    archive(&mut session, &mut events, NewEntry::new("two", "sad")).await;

    let via_worker = dir.path().join("exports").join("worker.csv");
    session.export(via_worker.clone()).expect("export request");
    assert_eq!(
        next_update(&mut session, &mut events).await,
        SessionUpdate::Exported {
            rows: 2,
            destination: via_worker.clone()
        }
    );
    assert!(session.shutdown(Duration::from_secs(2)).await);

    let direct = dir.path().join("direct.csv");
    let rows = export_store_to_csv(&dir.path().join("journal.sqlite3"), &direct)
        .expect("direct export");
    assert_eq!(rows, 2);

    let worker_csv = fs::read_to_string(&via_worker).expect("worker csv");
    assert_eq!(worker_csv, fs::read_to_string(&direct).expect("direct csv"));
    let lines = worker_csv.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",one,"));
    assert!(lines[2].contains(",two,"));
}
