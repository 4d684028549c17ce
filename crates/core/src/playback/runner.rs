//! Playback orchestrator implementation.
//!
//! A single actor task owns the session. Commands, relay completions and
//! retry timers all arrive on one ordered queue and are handled one at a
//! time, so no two mutations of the session ever interleave.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::admission::{Admission, AdmissionGate, CooldownStore, UserId};
use crate::audit::{AuditEvent, AuditHandle};
use crate::catalog::Candidate;
use crate::metrics;
use crate::relay::{
    CompletionSink, RelayCompletion, RelayExit, RelayHandle, RelayLauncher, RelaySupervisor,
};

use super::config::PlaybackConfig;
use super::resolver::{CandidateResolver, ResolveOutcome};
use super::types::{NowPlaying, PlaybackError, PlaybackEvent, PlaybackStatus, StopOutcome, Trigger};

const EVENT_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, PlaybackError>>;

enum Message {
    Advance {
        user_id: UserId,
        now: DateTime<Utc>,
        privileged_only: bool,
        reply: Reply<NowPlaying>,
    },
    Stop {
        user_id: UserId,
        reply: Reply<StopOutcome>,
    },
    RelayExited(RelayCompletion),
    RetryDue {
        seq: u64,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle used by command adapters to talk to the orchestrator.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: mpsc::UnboundedSender<Message>,
    status: watch::Receiver<PlaybackStatus>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackHandle {
    /// Gated advance: any identity, subject to its cooldown.
    pub async fn request_advance(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<NowPlaying, PlaybackError> {
        self.request(|reply| Message::Advance {
            user_id,
            now,
            privileged_only: false,
            reply,
        })
        .await
    }

    /// Skip to the next clip. Privileged identity only.
    pub async fn request_next(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<NowPlaying, PlaybackError> {
        self.request(|reply| Message::Advance {
            user_id,
            now,
            privileged_only: true,
            reply,
        })
        .await
    }

    /// Stop playback. Privileged identity only; not rate-limited.
    pub async fn request_stop(&self, user_id: UserId) -> Result<StopOutcome, PlaybackError> {
        self.request(|reply| Message::Stop { user_id, reply }).await
    }

    /// Current session status. Never waits on the orchestrator.
    pub fn status(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to playback events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Stop the running relay and end the orchestrator task.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Message::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Message,
    ) -> Result<T, PlaybackError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| PlaybackError::Unavailable)?;
        rx.await.map_err(|_| PlaybackError::Unavailable)?
    }
}

struct PendingRetry {
    seq: u64,
    token: CancellationToken,
    retry_at: DateTime<Utc>,
}

/// The playback orchestrator. Spawn [`PlaybackOrchestrator::run`] as a task.
pub struct PlaybackOrchestrator {
    config: PlaybackConfig,
    gate: AdmissionGate,
    resolver: CandidateResolver,
    supervisor: RelaySupervisor,
    audit: Option<AuditHandle>,

    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    status_tx: watch::Sender<PlaybackStatus>,
    events: broadcast::Sender<PlaybackEvent>,

    // Session
    now_playing: Option<NowPlaying>,
    retry: Option<PendingRetry>,
    retry_seq: u64,
    failed_attempts: u32,
}

/// Create the playback orchestrator and its handle.
///
/// Returns:
/// - `PlaybackHandle` - for issuing commands (clone this to share across tasks)
/// - `PlaybackOrchestrator` - spawn this with `tokio::spawn(orchestrator.run())`
pub fn create_playback_system(
    config: PlaybackConfig,
    cooldowns: Arc<dyn CooldownStore>,
    resolver: CandidateResolver,
    launcher: Arc<dyn RelayLauncher>,
    stop_grace: Duration,
    audit: Option<AuditHandle>,
) -> (PlaybackHandle, PlaybackOrchestrator) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(PlaybackStatus::idle());
    let (events, _) = broadcast::channel(EVENT_BUFFER);

    let completion_tx = tx.clone();
    let sink: CompletionSink = Arc::new(move |completion| {
        let _ = completion_tx.send(Message::RelayExited(completion));
    });

    let gate = AdmissionGate::new(
        config.privileged_user_id,
        config.cooldown(),
        cooldowns,
    );

    let handle = PlaybackHandle {
        tx: tx.clone(),
        status: status_rx,
        events: events.clone(),
    };

    let orchestrator = PlaybackOrchestrator {
        config,
        gate,
        resolver,
        supervisor: RelaySupervisor::new(launcher, sink, stop_grace),
        audit,
        tx,
        rx,
        status_tx,
        events,
        now_playing: None,
        retry: None,
        retry_seq: 0,
        failed_attempts: 0,
    };

    (handle, orchestrator)
}

impl PlaybackOrchestrator {
    /// Process messages until shutdown is requested.
    pub async fn run(mut self) {
        info!(
            privileged_user_id = %self.config.privileged_user_id,
            cooldown_secs = self.config.cooldown_secs,
            "Playback orchestrator started"
        );

        if self.config.autostart {
            info!("Autostart enabled, resolving first clip");
            self.auto_advance().await;
        }

        while let Some(message) = self.rx.recv().await {
            match message {
                Message::Advance {
                    user_id,
                    now,
                    privileged_only,
                    reply,
                } => {
                    let result = self.handle_advance(user_id, now, privileged_only).await;
                    let _ = reply.send(result);
                }
                Message::Stop { user_id, reply } => {
                    let result = self.handle_stop(user_id).await;
                    let _ = reply.send(result);
                }
                Message::RelayExited(completion) => self.handle_relay_exit(completion).await,
                Message::RetryDue { seq } => self.handle_retry_due(seq).await,
                Message::Shutdown { reply } => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }

        info!("Playback orchestrator stopped");
    }

    async fn handle_advance(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
        privileged_only: bool,
    ) -> Result<NowPlaying, PlaybackError> {
        let trigger = if privileged_only {
            Trigger::Next { user_id }
        } else {
            Trigger::Advance { user_id }
        };

        if privileged_only && !self.gate.is_privileged(user_id) {
            self.reject(user_id, "next").await;
            return Err(PlaybackError::Unauthorized);
        }

        match self.gate.try_admit(user_id, now) {
            Ok(Admission::Denied { retry_after }) => {
                let retry_after_secs = (retry_after.num_milliseconds().max(0) as u64).div_ceil(1000);
                info!(
                    user_id = %user_id,
                    retry_after_secs,
                    "Advance denied by cooldown"
                );
                self.emit_audit(AuditEvent::AdmissionDenied {
                    user_id,
                    retry_after_secs,
                })
                .await;
                return Err(PlaybackError::AdmissionDenied { retry_after_secs });
            }
            Ok(admission) => {
                debug!(user_id = %user_id, ?admission, "Advance admitted");
            }
            Err(e) => {
                error!(user_id = %user_id, "Cooldown store failed: {}", e);
                return Err(PlaybackError::CooldownStore(e.to_string()));
            }
        }

        self.cancel_retry().await;

        if let Some(previous) = self.supervisor.stop().await {
            self.on_preempted(previous, trigger).await;
        }

        let result = self.play_next(trigger).await;
        if let Err(ref e) = result {
            self.emit_audit(AuditEvent::ResolutionFailed {
                trigger: trigger.label().to_string(),
                user_id: Some(user_id),
                error: e.to_string(),
                retry_in_ms: None,
            })
            .await;
        }
        result
    }

    async fn handle_stop(&mut self, user_id: UserId) -> Result<StopOutcome, PlaybackError> {
        if !self.gate.is_privileged(user_id) {
            self.reject(user_id, "stop").await;
            return Err(PlaybackError::Unauthorized);
        }

        let retry_cancelled = self.cancel_retry().await;

        match self.supervisor.stop().await {
            Some(handle) => {
                let handle_id = handle.id();
                let candidate = handle.into_candidate();
                self.now_playing = None;
                self.publish_status();

                info!(handle_id = %handle_id, "Playback stopped by {}", user_id);
                self.emit_event(PlaybackEvent::Stopped {
                    handle_id,
                    title: candidate.title.clone(),
                    stopped_by: user_id,
                });
                self.emit_audit(AuditEvent::PlaybackStopped {
                    handle_id,
                    title: candidate.title.clone(),
                    reason: "stopped".to_string(),
                    stopped_by: Some(user_id),
                })
                .await;

                Ok(StopOutcome::Stopped { candidate })
            }
            None if retry_cancelled => Ok(StopOutcome::RetryCancelled),
            None => Ok(StopOutcome::NothingPlaying),
        }
    }

    async fn handle_relay_exit(&mut self, completion: RelayCompletion) {
        let Some(handle) = self.supervisor.acknowledge(&completion) else {
            debug!(
                handle_id = %completion.handle_id,
                "Ignoring completion from a relay that is no longer current"
            );
            return;
        };

        self.now_playing = None;
        self.publish_status();

        let title = handle.into_candidate().title;
        self.emit_event(PlaybackEvent::RelayExited {
            handle_id: completion.handle_id,
            title: title.clone(),
            exit: completion.exit,
        });
        self.emit_audit(AuditEvent::RelayExited {
            handle_id: completion.handle_id,
            title,
            outcome: completion.exit.label().to_string(),
            exit_code: match completion.exit {
                RelayExit::Crashed { code } => code,
                RelayExit::Completed => None,
            },
        })
        .await;

        self.auto_advance().await;
    }

    async fn handle_retry_due(&mut self, seq: u64) {
        match &self.retry {
            Some(pending) if pending.seq == seq => {
                self.retry = None;
                self.auto_advance().await;
            }
            _ => debug!(seq, "Ignoring stale retry"),
        }
    }

    /// Advance without gate or stop-first; failures fall into backoff.
    async fn auto_advance(&mut self) {
        match self.play_next(Trigger::Auto).await {
            Ok(_) => self.failed_attempts = 0,
            Err(e) => self.schedule_retry(e).await,
        }
    }

    async fn play_next(&mut self, trigger: Trigger) -> Result<NowPlaying, PlaybackError> {
        let result = match self.resolver.resolve_next().await {
            ResolveOutcome::Found(candidate) => self.start_relay(candidate, trigger).await,
            ResolveOutcome::EmptyCatalog => Err(PlaybackError::EmptyCatalog),
            ResolveOutcome::Failed(e) => Err(PlaybackError::CatalogFetchFailed(e.to_string())),
        };

        if result.is_err() {
            self.publish_status();
        }
        result
    }

    async fn start_relay(
        &mut self,
        candidate: Candidate,
        trigger: Trigger,
    ) -> Result<NowPlaying, PlaybackError> {
        let now_playing = match self.supervisor.start(candidate).await {
            Ok(handle) => NowPlaying {
                handle_id: handle.id(),
                candidate: handle.candidate().clone(),
                started_at: handle.started_at(),
                trigger,
            },
            Err(e) => {
                error!("Failed to start relay: {}", e);
                return Err(PlaybackError::ProcessSpawnFailed(e.to_string()));
            }
        };

        metrics::RELAYS_STARTED
            .with_label_values(&[trigger.label()])
            .inc();

        self.now_playing = Some(now_playing.clone());
        self.publish_status();

        info!(
            handle_id = %now_playing.handle_id,
            trigger = trigger.label(),
            "Now playing '{}' [{}] ({:.0}s)",
            now_playing.candidate.title,
            now_playing.candidate.code,
            now_playing.duration_secs()
        );

        self.emit_event(PlaybackEvent::Started {
            now_playing: now_playing.clone(),
        });
        self.emit_audit(AuditEvent::PlaybackStarted {
            handle_id: now_playing.handle_id,
            title: now_playing.candidate.title.clone(),
            locator: now_playing.candidate.locator.clone(),
            code: now_playing.candidate.code.clone(),
            duration_secs: now_playing.duration_secs(),
            trigger: trigger.label().to_string(),
            user_id: trigger.user_id(),
        })
        .await;

        Ok(now_playing)
    }

    async fn on_preempted(&mut self, previous: RelayHandle, trigger: Trigger) {
        let handle_id = previous.id();
        let title = previous.into_candidate().title;
        self.now_playing = None;
        self.publish_status();

        self.emit_event(PlaybackEvent::Preempted {
            handle_id,
            title: title.clone(),
            trigger,
        });
        self.emit_audit(AuditEvent::PlaybackStopped {
            handle_id,
            title,
            reason: format!("preempted by {}", trigger.label()),
            stopped_by: trigger.user_id(),
        })
        .await;
    }

    async fn schedule_retry(&mut self, cause: PlaybackError) {
        self.failed_attempts += 1;
        self.retry_seq += 1;
        let seq = self.retry_seq;

        let delay = self.config.retry_backoff();
        let retry_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Message::RetryDue { seq });
                }
            }
        });

        self.retry = Some(PendingRetry {
            seq,
            token,
            retry_at,
        });
        self.publish_status();

        metrics::AUTO_ADVANCE_RETRIES.inc();
        warn!(
            attempt = self.failed_attempts,
            "Automatic advance failed ({}), retrying in {:?}",
            cause,
            delay
        );

        self.emit_event(PlaybackEvent::RetryScheduled {
            reason: cause.to_string(),
            attempt: self.failed_attempts,
            retry_at,
        });
        self.emit_audit(AuditEvent::ResolutionFailed {
            trigger: Trigger::Auto.label().to_string(),
            user_id: None,
            error: cause.to_string(),
            retry_in_ms: Some(self.config.retry_backoff_ms),
        })
        .await;
    }

    /// Abandon a pending retry. Returns whether one was pending.
    async fn cancel_retry(&mut self) -> bool {
        let Some(pending) = self.retry.take() else {
            return false;
        };

        pending.token.cancel();
        let attempts = std::mem::take(&mut self.failed_attempts);
        self.publish_status();

        info!(attempts, "Pending automatic retry cancelled by command");
        self.emit_event(PlaybackEvent::RetryCancelled);
        self.emit_audit(AuditEvent::RetryCancelled { attempts }).await;
        true
    }

    async fn shutdown(&mut self) {
        if let Some(pending) = self.retry.take() {
            pending.token.cancel();
        }

        if let Some(handle) = self.supervisor.stop().await {
            let handle_id = handle.id();
            self.emit_audit(AuditEvent::PlaybackStopped {
                handle_id,
                title: handle.into_candidate().title,
                reason: "shutdown".to_string(),
                stopped_by: None,
            })
            .await;
        }

        self.now_playing = None;
        self.publish_status();
    }

    async fn reject(&self, user_id: UserId, command: &str) {
        warn!(user_id = %user_id, command, "Privileged command rejected");
        self.emit_audit(AuditEvent::CommandRejected {
            user_id,
            command: command.to_string(),
            reason: "unauthorized".to_string(),
        })
        .await;
    }

    fn publish_status(&self) {
        let status = match &self.now_playing {
            Some(now_playing) => PlaybackStatus::Playing {
                now_playing: now_playing.clone(),
            },
            None => PlaybackStatus::Idle {
                next_retry_at: self.retry.as_ref().map(|r| r.retry_at),
            },
        };
        self.status_tx.send_replace(status);
    }

    fn emit_event(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn emit_audit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.emit(event).await;
        }
    }
}
