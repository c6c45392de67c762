//! Work-list watcher.
//!
//! The sampler and the downloader may run as separate processes; the only
//! signal between them is the work-list file. [`StageWatcher`] turns raw
//! filesystem notifications about that file into at most one
//! [`WorkListReady`] per stable write. A write is stable once no further write
//! arrives within the debounce window. The deadline re-arms on every write,
//! so a writer that keeps touching the file at intervals shorter than the
//! window (2 s by default) never produces a trigger until it pauses.

use std::fs;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde::Serialize;

use crate::error::HarvestError;
use crate::store::{Store, parent_dir};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    Absent,
    Pending,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Created,
    Written,
    /// Another file was renamed onto the work list (atomic replace).
    Replaced,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkListReady {
    pub generation: u64,
    pub path: Utf8PathBuf,
}

#[derive(Debug)]
pub struct StageWatcher {
    path: Utf8PathBuf,
    debounce: Duration,
    state: WatchState,
    quiet_deadline: Option<Instant>,
    generation: u64,
}

impl StageWatcher {
    pub fn new(path: impl Into<Utf8PathBuf>, debounce: Duration) -> Self {
        Self {
            path: path.into(),
            debounce,
            state: WatchState::Absent,
            quiet_deadline: None,
            generation: 0,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.quiet_deadline
    }

    pub fn observe(&mut self, change: FileChange, now: Instant) {
        match change {
            FileChange::Created => {
                self.state = WatchState::Pending;
            }
            FileChange::Written | FileChange::Replaced => {
                self.state = WatchState::Pending;
                self.quiet_deadline = Some(now + self.debounce);
            }
            FileChange::Removed => {
                self.state = WatchState::Absent;
                self.quiet_deadline = None;
            }
        }
        tracing::trace!(?change, state = ?self.state, "work list change");
    }

    /// Emits a ready event once the quiet deadline has passed and the file
    /// has content. An empty file keeps the watcher pending until the next
    /// write.
    pub fn poll<F>(&mut self, now: Instant, has_content: F) -> Option<WorkListReady>
    where
        F: FnOnce(&Utf8Path) -> bool,
    {
        let deadline = self.quiet_deadline?;
        if now < deadline {
            return None;
        }
        self.quiet_deadline = None;
        if !has_content(&self.path) {
            tracing::info!(path = %self.path, "work list is empty, waiting for content");
            return None;
        }
        self.state = WatchState::Ready;
        self.generation += 1;
        Some(WorkListReady {
            generation: self.generation,
            path: self.path.clone(),
        })
    }
}

/// Maps one notification onto changes of the file named `file_name`.
pub fn classify(event: &Event, file_name: &str) -> Vec<FileChange> {
    let matches = |idx: usize| {
        event
            .paths
            .get(idx)
            .and_then(|path| path.file_name())
            .map(|name| name == file_name)
            .unwrap_or(false)
    };
    let any_match = (0..event.paths.len()).any(|idx| matches(idx));

    match &event.kind {
        EventKind::Create(_) if any_match => vec![FileChange::Created],
        EventKind::Remove(_) if any_match => vec![FileChange::Removed],
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::To if any_match => vec![FileChange::Replaced],
            RenameMode::From if any_match => vec![FileChange::Removed],
            RenameMode::Both => {
                let mut changes = Vec::new();
                if matches(0) {
                    changes.push(FileChange::Removed);
                }
                if matches(1) {
                    changes.push(FileChange::Replaced);
                }
                changes
            }
            _ if any_match => {
                let exists = event.paths.iter().any(|path| path.exists());
                if exists {
                    vec![FileChange::Replaced]
                } else {
                    vec![FileChange::Removed]
                }
            }
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) if any_match => vec![FileChange::Written],
        _ => Vec::new(),
    }
}

/// Feeds notifications into `watcher` until the notification channel closes.
/// Notification errors are logged and never end the loop.
pub fn run_event_loop(
    events: &Receiver<notify::Result<Event>>,
    watcher: &mut StageWatcher,
    ready: &Sender<WorkListReady>,
) -> Result<(), HarvestError> {
    let file_name = watcher
        .path()
        .file_name()
        .ok_or_else(|| HarvestError::Watch(format!("not a file path: {}", watcher.path())))?
        .to_string();

    loop {
        let received = match watcher.next_deadline() {
            Some(deadline) => {
                events.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let closed = match received {
            Ok(Ok(event)) => {
                let now = Instant::now();
                for change in classify(&event, &file_name) {
                    watcher.observe(change, now);
                }
                false
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "file watch error");
                false
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(deadline) = watcher.next_deadline() {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                }
                true
            }
        };

        if let Some(event) = watcher.poll(Instant::now(), has_content) {
            tracing::info!(
                generation = event.generation,
                path = %event.path,
                "work list stable, triggering download"
            );
            ready.send(event).map_err(|_| HarvestError::StageClosed)?;
        }
        if closed {
            return Ok(());
        }
    }
}

/// Watches the directory holding `work_list` forever, sending one
/// [`WorkListReady`] per stable write.
pub fn watch_work_list(
    work_list: &Utf8Path,
    debounce: Duration,
    ready: Sender<WorkListReady>,
) -> Result<(), HarvestError> {
    let dir = parent_dir(work_list);
    Store::ensure_dir(dir)?;

    let (tx, rx) = mpsc::channel();
    let mut notifier = notify::recommended_watcher(tx)?;
    notifier.watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
    tracing::info!(%dir, file = %work_list, "watching for work list");

    let mut watcher = StageWatcher::new(work_list, debounce);
    run_event_loop(&rx, &mut watcher, &ready)?;
    Err(HarvestError::Watch(
        "notification channel closed".to_string(),
    ))
}

/// Runs `run` for each ready event, one at a time on the calling thread, until
/// every sender is gone. Download runs therefore never overlap; events queued
/// behind a running download collapse into the newest one.
pub fn run_download_runner<F>(ready: &Receiver<WorkListReady>, mut run: F)
where
    F: FnMut(WorkListReady),
{
    while let Ok(mut next) = ready.recv() {
        while let Ok(newer) = ready.try_recv() {
            tracing::debug!(
                dropped = next.generation,
                newer = newer.generation,
                "coalescing queued work list events"
            );
            next = newer;
        }
        run(next);
    }
}

fn has_content(path: &Utf8Path) -> bool {
    fs::metadata(path.as_std_path())
        .map(|meta| meta.len() > 0)
        .unwrap_or(false)
}
