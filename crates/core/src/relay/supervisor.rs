//! Relay process supervision.
//!
//! The supervisor owns at most one relay handle. Each handle has a watcher
//! task that either observes the process exiting on its own, in which case it
//! posts a [`RelayCompletion`], or receives a stop request, in which case it
//! terminates the process and posts nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::RelayError;
use super::traits::{RelayLauncher, RelayProcess};
use super::types::{CompletionSink, HandleState, RelayCompletion, RelayExit, RelayJob};
use crate::catalog::Candidate;
use crate::metrics;

/// A relay started by the supervisor.
pub struct RelayHandle {
    id: Uuid,
    candidate: Candidate,
    started_at: DateTime<Utc>,
    state: watch::Receiver<HandleState>,
    stop_tx: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<()>,
}

impl RelayHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> HandleState {
        *self.state.borrow()
    }

    pub fn into_candidate(self) -> Candidate {
        self.candidate
    }
}

/// Starts, watches and stops relay processes, one at a time.
pub struct RelaySupervisor {
    launcher: Arc<dyn RelayLauncher>,
    sink: CompletionSink,
    stop_grace: Duration,
    active: Option<RelayHandle>,
}

impl RelaySupervisor {
    pub fn new(launcher: Arc<dyn RelayLauncher>, sink: CompletionSink, stop_grace: Duration) -> Self {
        Self {
            launcher,
            sink,
            stop_grace,
            active: None,
        }
    }

    /// The current handle, if any. It may already have exited if its
    /// completion has not been acknowledged yet.
    pub fn active(&self) -> Option<&RelayHandle> {
        self.active.as_ref()
    }

    /// Start relaying a probed candidate.
    ///
    /// Any previous handle is stopped first, so its process has exited
    /// before the new one is spawned.
    pub async fn start(&mut self, candidate: Candidate) -> Result<&RelayHandle, RelayError> {
        self.stop().await;

        let id = Uuid::new_v4();
        let job = RelayJob::for_candidate(id, &candidate)?;

        let (state_tx, state_rx) = watch::channel(HandleState::Starting);
        let process = self.launcher.launch(&job).await?;
        state_tx.send_replace(HandleState::Running);

        info!(
            handle_id = %id,
            pid = ?process.id(),
            duration_secs = job.duration_secs,
            "Relay started for '{}'",
            candidate.title
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        let watcher = tokio::spawn(watch_relay(
            id,
            process,
            stop_rx,
            state_tx,
            Arc::clone(&self.sink),
            self.stop_grace,
        ));

        Ok(self.active.insert(RelayHandle {
            id,
            candidate,
            started_at: Utc::now(),
            state: state_rx,
            stop_tx: Some(stop_tx),
            watcher,
        }))
    }

    /// Stop the current handle and wait until its process has exited.
    ///
    /// No completion is posted for a stopped handle. Returns the handle that
    /// was stopped, or `None` if there was none.
    pub async fn stop(&mut self) -> Option<RelayHandle> {
        let mut handle = self.active.take()?;

        if let Some(stop_tx) = handle.stop_tx.take() {
            // Fails only if the watcher already finished.
            let _ = stop_tx.send(());
        }

        if let Err(e) = (&mut handle.watcher).await {
            warn!(handle_id = %handle.id, "Relay watcher task failed: {}", e);
        }

        Some(handle)
    }

    /// Accept a completion posted by a watcher.
    ///
    /// Returns the finished handle if the completion belongs to the current
    /// one. Completions from handles that were stopped or replaced are stale
    /// and yield `None`.
    pub fn acknowledge(&mut self, completion: &RelayCompletion) -> Option<RelayHandle> {
        match &self.active {
            Some(handle) if handle.id == completion.handle_id => self.active.take(),
            _ => None,
        }
    }
}

async fn watch_relay(
    handle_id: Uuid,
    mut process: Box<dyn RelayProcess>,
    stop_rx: oneshot::Receiver<()>,
    state_tx: watch::Sender<HandleState>,
    sink: CompletionSink,
    stop_grace: Duration,
) {
    let started = Instant::now();

    tokio::select! {
        biased;

        // A dropped sender means the supervisor itself went away: stop too.
        _ = stop_rx => {
            if let Err(e) = process.terminate(stop_grace).await {
                warn!(handle_id = %handle_id, "Failed to terminate relay: {}", e);
            }
            state_tx.send_replace(HandleState::Terminated);
            record_exit("terminated", started);
            info!(handle_id = %handle_id, "Relay terminated");
        }

        result = process.wait() => {
            let exit = result.unwrap_or_else(|e| {
                warn!(handle_id = %handle_id, "Failed to wait for relay: {}", e);
                RelayExit::Crashed { code: None }
            });
            state_tx.send_replace(exit.into());
            record_exit(exit.label(), started);
            match exit {
                RelayExit::Completed => info!(handle_id = %handle_id, "Relay completed"),
                RelayExit::Crashed { code } => {
                    warn!(handle_id = %handle_id, ?code, "Relay exited abnormally")
                }
            }
            sink(RelayCompletion { handle_id, exit });
        }
    }
}

fn record_exit(outcome: &str, started: Instant) {
    metrics::RELAY_EXITS.with_label_values(&[outcome]).inc();
    metrics::RELAY_RUN_DURATION
        .with_label_values(&[outcome])
        .observe(started.elapsed().as_secs_f64());
}
