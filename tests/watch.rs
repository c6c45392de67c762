use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use camino::Utf8PathBuf;
use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use zinc_harvest::watch::{StageWatcher, WatchState, WorkListReady, run_event_loop};

const DEBOUNCE: Duration = Duration::from_millis(50);

fn event(kind: EventKind, path: &Utf8PathBuf) -> notify::Result<Event> {
    Ok(Event::new(kind).add_path(PathBuf::from(path.as_std_path())))
}

fn written(path: &Utf8PathBuf) -> notify::Result<Event> {
    event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path)
}

fn temp_work_list() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("zinc_ids.txt")).unwrap();
    (temp, path)
}

fn drain(
    events: Vec<notify::Result<Event>>,
    watcher: &mut StageWatcher,
) -> Vec<WorkListReady> {
    let (event_tx, event_rx) = mpsc::channel();
    for item in events {
        event_tx.send(item).unwrap();
    }
    drop(event_tx);

    let (ready_tx, ready_rx) = mpsc::channel();
    run_event_loop(&event_rx, watcher, &ready_tx).unwrap();
    drop(ready_tx);
    ready_rx.iter().collect()
}

#[test]
fn burst_of_notifications_yields_one_trigger() {
    let (_temp, path) = temp_work_list();
    fs::write(path.as_std_path(), "ZINC000000000001\n").unwrap();

    let mut events = vec![event(EventKind::Create(CreateKind::File), &path)];
    events.extend((0..10).map(|_| written(&path)));
    let mut watcher = StageWatcher::new(path.clone(), DEBOUNCE);

    let ready = drain(events, &mut watcher);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].generation, 1);
    assert_eq!(ready[0].path, path);
    assert_eq!(watcher.state(), WatchState::Ready);
}

#[test]
fn empty_work_list_never_triggers() {
    let (_temp, path) = temp_work_list();
    fs::write(path.as_std_path(), "").unwrap();
    let mut watcher = StageWatcher::new(path.clone(), DEBOUNCE);

    let ready = drain(
        vec![event(EventKind::Create(CreateKind::File), &path), written(&path)],
        &mut watcher,
    );
    assert!(ready.is_empty());
    assert_eq!(watcher.state(), WatchState::Pending);
}

#[test]
fn removal_cancels_pending_trigger() {
    let (_temp, path) = temp_work_list();
    let mut watcher = StageWatcher::new(path.clone(), DEBOUNCE);

    let ready = drain(
        vec![
            written(&path),
            event(EventKind::Remove(RemoveKind::File), &path),
        ],
        &mut watcher,
    );
    assert!(ready.is_empty());
    assert_eq!(watcher.state(), WatchState::Absent);
}

#[test]
fn unrelated_files_and_errors_are_ignored() {
    let (temp, path) = temp_work_list();
    let artifact = Utf8PathBuf::from_path_buf(temp.path().join("zinc_ids_EF.txt")).unwrap();
    fs::write(artifact.as_std_path(), "ZINC000000000001\n").unwrap();
    let mut watcher = StageWatcher::new(path, DEBOUNCE);

    let ready = drain(
        vec![
            written(&artifact),
            Err(notify::Error::generic("queue overflow")),
        ],
        &mut watcher,
    );
    assert!(ready.is_empty());
    assert_eq!(watcher.state(), WatchState::Absent);
}
