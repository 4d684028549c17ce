//! Mock relay launcher for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::relay::{RelayError, RelayExit, RelayJob, RelayLauncher, RelayProcess};

/// Something that happened to a mock relay process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Launched(Uuid),
    /// The process exited on its own via `finish`.
    Exited(Uuid),
    /// The process was terminated on request.
    Terminated(Uuid),
}

#[derive(Debug, Default)]
struct Shared {
    jobs: Vec<RelayJob>,
    lifecycle: Vec<LifecycleEvent>,
    exits: HashMap<Uuid, oneshot::Sender<RelayExit>>,
    running: usize,
    max_concurrent: usize,
    next_error: Option<RelayError>,
}

/// Mock implementation of the RelayLauncher trait.
///
/// Launched processes run until the test ends them with `finish` or the
/// supervisor terminates them. The launcher keeps an ordered lifecycle log
/// and the peak number of processes alive at once.
#[derive(Debug, Default)]
pub struct MockRelayLauncher {
    shared: Arc<Mutex<Shared>>,
}

impl MockRelayLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next launch fail.
    pub fn set_next_error(&self, error: RelayError) {
        self.shared.lock().unwrap().next_error = Some(error);
    }

    /// Jobs launched so far, in order.
    pub fn launched(&self) -> Vec<RelayJob> {
        self.shared.lock().unwrap().jobs.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.shared.lock().unwrap().jobs.len()
    }

    pub fn lifecycle(&self) -> Vec<LifecycleEvent> {
        self.shared.lock().unwrap().lifecycle.clone()
    }

    /// Processes currently alive.
    pub fn running_count(&self) -> usize {
        self.shared.lock().unwrap().running
    }

    /// Most processes ever alive at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.shared.lock().unwrap().max_concurrent
    }

    /// Make a process exit on its own. Returns false if it is not waiting.
    pub fn finish(&self, handle_id: Uuid, exit: RelayExit) -> bool {
        let sender = self.shared.lock().unwrap().exits.remove(&handle_id);
        match sender {
            Some(tx) => tx.send(exit).is_ok(),
            None => false,
        }
    }

    /// Finish the most recently launched process.
    pub fn finish_latest(&self, exit: RelayExit) -> Option<Uuid> {
        let latest = self.shared.lock().unwrap().jobs.last().map(|j| j.handle_id)?;
        self.finish(latest, exit).then_some(latest)
    }
}

#[async_trait]
impl RelayLauncher for MockRelayLauncher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn launch(&self, job: &RelayJob) -> Result<Box<dyn RelayProcess>, RelayError> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(error) = shared.next_error.take() {
            return Err(error);
        }

        let (tx, rx) = oneshot::channel();
        shared.exits.insert(job.handle_id, tx);
        shared.jobs.push(job.clone());
        shared.lifecycle.push(LifecycleEvent::Launched(job.handle_id));
        shared.running += 1;
        shared.max_concurrent = shared.max_concurrent.max(shared.running);

        Ok(Box::new(MockProcess {
            handle_id: job.handle_id,
            exit_rx: rx,
            shared: Arc::clone(&self.shared),
            finished: false,
        }))
    }
}

struct MockProcess {
    handle_id: Uuid,
    exit_rx: oneshot::Receiver<RelayExit>,
    shared: Arc<Mutex<Shared>>,
    finished: bool,
}

impl MockProcess {
    fn mark_finished(&mut self, event: LifecycleEvent) {
        if self.finished {
            return;
        }
        self.finished = true;

        let mut shared = self.shared.lock().unwrap();
        shared.running -= 1;
        shared.exits.remove(&self.handle_id);
        shared.lifecycle.push(event);
    }
}

#[async_trait]
impl RelayProcess for MockProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> Result<RelayExit, RelayError> {
        match (&mut self.exit_rx).await {
            Ok(exit) => {
                self.mark_finished(LifecycleEvent::Exited(self.handle_id));
                Ok(exit)
            }
            // Launcher dropped: behave like a process that never exits.
            Err(_) => std::future::pending().await,
        }
    }

    async fn terminate(&mut self, _grace: Duration) -> Result<(), RelayError> {
        self.mark_finished(LifecycleEvent::Terminated(self.handle_id));
        Ok(())
    }
}
