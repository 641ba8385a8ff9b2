// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Debounced autosave for an editing session.
//!
//! Edits are coalesced: every title or content edit restarts a quiet-period
//! timer, and only when it elapses is a single write issued, carrying the
//! snapshot as of that moment. Writes run detached from the controller task,
//! so edits keep being accepted while a save is in flight; the in-flight save
//! is never cancelled and a later save simply overwrites it.
//!
//! ```text
//!   Idle --edit--> Dirty --timer--> Saving --done--> Idle
//!                    ^                 |
//!                    +------edit-------+
//! ```
//!
//! Dropping (or closing) the controller cancels a pending timer. Saves that
//! already started run to completion. Failed saves are logged and not
//! retried; the edits they carried stay unsaved until the next edit.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

use crate::models::NotePatch;
use crate::services::notes::NoteWriter;

/// Observable save state of an editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SaveState {
    /// Everything edited has been handed to the store.
    Idle,
    /// Edits are waiting for the debounce timer.
    Dirty,
    /// A save is in flight and nothing newer is pending.
    Saving,
}

/// In-memory copy of the fields being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
}

#[derive(Debug)]
enum Command {
    Title(String),
    Content(String),
    CommitTitle,
}

/// Handle to a running autosave task. The task stops when the handle goes away.
pub struct AutosaveController {
    note_id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SaveState>,
    task: JoinHandle<()>,
}

impl AutosaveController {
    /// Start the autosave task for `note_id`, seeded with the stored fields.
    pub fn spawn(
        note_id: Uuid,
        initial: Draft,
        writer: Arc<dyn NoteWriter>,
        debounce: Duration,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SaveState::Idle);

        let worker = Worker {
            note_id,
            draft: initial,
            writer,
            debounce,
            title_edited: false,
            deadline: None,
            in_flight: 0,
            state: state_tx,
        };
        let task = tokio::spawn(worker.run(rx));

        Self {
            note_id,
            commands,
            state,
            task,
        }
    }

    pub fn note_id(&self) -> Uuid {
        self.note_id
    }

    /// Record a content edit and restart the debounce timer.
    pub fn edit_content(&self, content: impl Into<String>) {
        self.send(Command::Content(content.into()));
    }

    /// Record a title edit and restart the debounce timer.
    pub fn edit_title(&self, title: impl Into<String>) {
        self.send(Command::Title(title.into()));
    }

    /// Save immediately (title field blurred or confirmed). A pending debounce
    /// timer keeps running.
    pub fn commit_title(&self) {
        self.send(Command::CommitTitle);
    }

    pub fn state(&self) -> SaveState {
        *self.state.borrow()
    }

    /// Stop the controller: cancel a pending timer and wait for the task to
    /// exit. In-flight saves are left to finish on their own.
    pub async fn close(self) {
        let Self {
            note_id,
            commands,
            task,
            ..
        } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!(note_id = %note_id, error = %e, "Autosave task ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!(note_id = %self.note_id, "Edit dropped: autosave task has stopped");
        }
    }
}

struct Worker {
    note_id: Uuid,
    draft: Draft,
    /// Saves carry the title only once it has been edited here, so a
    /// content-only session never writes back a stale title.
    title_edited: bool,
    writer: Arc<dyn NoteWriter>,
    debounce: Duration,
    /// When the pending save fires; `Some` exactly when dirty.
    deadline: Option<Instant>,
    in_flight: usize,
    state: watch::Sender<SaveState>,
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();

        loop {
            tokio::select! {
                // Drain edits before checking the timer so a save always
                // carries every edit received so far.
                biased;

                command = commands.recv() => match command {
                    Some(Command::Content(content)) => {
                        self.draft.content = content;
                        self.mark_dirty();
                    }
                    Some(Command::Title(title)) => {
                        self.draft.title = title;
                        self.title_edited = true;
                        self.mark_dirty();
                    }
                    Some(Command::CommitTitle) => {
                        self.start_save(&done_tx, "title_commit");
                    }
                    None => break,
                },
                Some(()) = done_rx.recv(), if self.in_flight > 0 => {
                    self.in_flight -= 1;
                }
                _ = sleep_until_deadline(self.deadline), if self.deadline.is_some() => {
                    self.deadline = None;
                    self.start_save(&done_tx, "debounce");
                }
            }
            self.publish();
        }

        if self.deadline.take().is_some() {
            tracing::debug!(note_id = %self.note_id, "Pending autosave cancelled on teardown");
        }
        self.publish();
    }

    fn mark_dirty(&mut self) {
        self.deadline = Some(Instant::now() + self.debounce);
    }

    fn start_save(&mut self, done: &mpsc::UnboundedSender<()>, trigger: &'static str) {
        let patch = NotePatch {
            title: self.title_edited.then(|| self.draft.title.clone()),
            content: Some(self.draft.content.clone()),
        };
        self.in_flight += 1;
        tokio::spawn(save(
            self.writer.clone(),
            self.note_id,
            patch,
            trigger,
            done.clone(),
        ));
    }

    fn publish(&self) {
        let state = if self.deadline.is_some() {
            SaveState::Dirty
        } else if self.in_flight > 0 {
            SaveState::Saving
        } else {
            SaveState::Idle
        };
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

async fn save(
    writer: Arc<dyn NoteWriter>,
    note_id: Uuid,
    patch: NotePatch,
    trigger: &'static str,
    done: mpsc::UnboundedSender<()>,
) {
    match writer.write(note_id, patch).await {
        Ok(()) => tracing::debug!(note_id = %note_id, trigger, "Autosave complete"),
        Err(e) => tracing::warn!(note_id = %note_id, trigger, error = %e, "Autosave failed"),
    }
    // The controller may be gone already.
    let _ = done.send(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writer that records each save and can be told to fail.
    #[derive(Default)]
    struct RecordingWriter {
        saves: Mutex<Vec<(Instant, NotePatch)>>,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl NoteWriter for RecordingWriter {
        async fn write(&self, _note_id: Uuid, patch: NotePatch) -> Result<(), AppError> {
            tokio::time::sleep(self.delay).await;
            self.saves.lock().unwrap().push((Instant::now(), patch));
            if self.fail {
                return Err(AppError::Database("store unavailable".to_string()));
            }
            Ok(())
        }
    }

    fn draft() -> Draft {
        Draft {
            title: "Title".to_string(),
            content: "<p>start</p>".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_commit_saves_immediately() {
        let writer = Arc::new(RecordingWriter::default());
        let controller =
            AutosaveController::spawn(Uuid::new_v4(), draft(), writer.clone(), Duration::from_secs(1));
        let start = Instant::now();

        controller.edit_title("Renamed");
        controller.commit_title();
        tokio::time::sleep(Duration::from_millis(10)).await;

        {
            let saves = writer.saves.lock().unwrap();
            assert_eq!(saves.len(), 1);
            assert!(saves[0].0 - start < Duration::from_millis(10));
            assert_eq!(saves[0].1.title.as_deref(), Some("Renamed"));
        }

        // The debounce timer from the title edit still fires.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(writer.saves.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_returns_to_idle_without_retry() {
        let writer = Arc::new(RecordingWriter {
            fail: true,
            ..Default::default()
        });
        let controller =
            AutosaveController::spawn(Uuid::new_v4(), draft(), writer.clone(), Duration::from_secs(1));

        controller.edit_content("<p>lost</p>");
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(writer.saves.lock().unwrap().len(), 1);
        assert_eq!(controller.state(), SaveState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let writer = Arc::new(RecordingWriter {
            delay: Duration::from_millis(300),
            ..Default::default()
        });
        let controller =
            AutosaveController::spawn(Uuid::new_v4(), draft(), writer.clone(), Duration::from_secs(1));
        assert_eq!(controller.state(), SaveState::Idle);

        controller.edit_content("<p>a</p>");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.state(), SaveState::Dirty);

        // Timer fires at 1000 ms; the write takes 300 ms.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(controller.state(), SaveState::Saving);

        // Edit mid-save: back to dirty, in-flight save not cancelled.
        controller.edit_content("<p>b</p>");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.state(), SaveState::Dirty);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(writer.saves.lock().unwrap().len(), 1);
        assert_eq!(controller.state(), SaveState::Dirty);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(controller.state(), SaveState::Idle);

        let saves = writer.saves.lock().unwrap();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].1.content.as_deref(), Some("<p>a</p>"));
        assert_eq!(saves[1].1.content.as_deref(), Some("<p>b</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_timer() {
        let writer = Arc::new(RecordingWriter::default());
        let controller =
            AutosaveController::spawn(Uuid::new_v4(), draft(), writer.clone(), Duration::from_secs(1));

        controller.edit_content("<p>unsaved</p>");
        tokio::time::sleep(Duration::from_millis(200)).await;
        controller.close().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(writer.saves.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_lets_in_flight_save_finish() {
        let writer = Arc::new(RecordingWriter {
            delay: Duration::from_millis(500),
            ..Default::default()
        });
        let controller =
            AutosaveController::spawn(Uuid::new_v4(), draft(), writer.clone(), Duration::from_secs(1));

        controller.edit_content("<p>kept</p>");
        tokio::time::sleep(Duration::from_millis(1100)).await;
        controller.close().await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        let saves = writer.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1.content.as_deref(), Some("<p>kept</p>"));
    }
}
