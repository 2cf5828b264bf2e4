//! Ordered registry of teardown steps for one development session.
//!
//! Every external resource a session acquires (spawned process, listening
//! socket, watcher, poller) registers exactly one release step here. Steps run
//! strictly in registration order, one at a time, and the first failure stops
//! the unwind.
//!
//! Interrupts are delivered through a single process-wide listener that fans
//! out to every armed ledger, so arming several ledgers in one process (tests,
//! nested sessions) never stacks signal handlers.

use crate::error::{DevError, DevResult};
use crate::ui;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Boxed future returned by a release step.
pub type ReleaseFuture = Pin<Box<dyn Future<Output = DevResult<()>> + Send>>;

type ReleaseFn = Box<dyn FnOnce() -> ReleaseFuture + Send>;

/// One registered teardown step.
pub struct CleanupEntry {
    label: String,
    release: ReleaseFn,
}

impl CleanupEntry {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for CleanupEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupEntry")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Label of the placeholder registered by [`ResourceLedger::wait`] on an idle ledger.
pub const KEEP_ALIVE_LABEL: &str = "keep-alive";

/// Ordered teardown registry.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    entries: Mutex<Vec<CleanupEntry>>,
    armed: AtomicBool,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a teardown step.
    pub fn add<F, Fut>(&self, label: impl Into<String>, release: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DevResult<()>> + Send + 'static,
    {
        let label = label.into();
        tracing::debug!(%label, "registering cleanup step");
        self.entries.lock().push(CleanupEntry {
            label,
            release: Box::new(move || Box::pin(release())),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Labels in registration order.
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.label.clone())
            .collect()
    }

    /// Execute every registered step in order.
    ///
    /// Stops at the first failing step and returns its error wrapped in
    /// [`DevError::Cleanup`]; later steps never run. The registry is empty
    /// afterwards either way.
    pub async fn run(&self) -> DevResult<()> {
        let entries = std::mem::take(&mut *self.entries.lock());

        for entry in entries {
            tracing::debug!(label = %entry.label, "releasing");
            if let Err(source) = (entry.release)().await {
                tracing::error!(label = %entry.label, error = %source, "cleanup step failed");
                return Err(DevError::Cleanup {
                    label: entry.label,
                    source: Box::new(source),
                });
            }
        }

        Ok(())
    }

    /// Arm the ledger to run once on the next process interrupt (Ctrl+C).
    ///
    /// Returns `None` if this ledger was already armed.
    pub fn wait(self: &Arc<Self>) -> Option<ShutdownHandle> {
        if self.armed.load(Ordering::SeqCst) {
            tracing::warn!("resource ledger is already armed");
            return None;
        }
        let mut interrupts = interrupt::subscribe();
        self.wait_until(async move {
            // Closed means the listener is gone; shut down rather than hang
            let _ = interrupts.recv().await;
        })
    }

    /// Arm the ledger to run once when `trigger` resolves.
    ///
    /// An idle ledger first registers a placeholder resource so that there
    /// is always something holding the session open until the trigger fires.
    pub fn wait_until<F>(self: &Arc<Self>, trigger: F) -> Option<ShutdownHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.armed.swap(true, Ordering::SeqCst) {
            tracing::warn!("resource ledger is already armed");
            return None;
        }

        if self.is_empty() {
            let idle = tokio::spawn(std::future::pending::<()>());
            self.add(KEEP_ALIVE_LABEL, move || async move {
                idle.abort();
                Ok(())
            });
        }

        let ledger = Arc::clone(self);
        let task = tokio::spawn(async move {
            trigger.await;
            ui::info("Stopping development session...");
            match ledger.run().await {
                Ok(()) => ShutdownOutcome::Clean,
                Err(e) => {
                    ui::error(&format!("Error while cleaning up: {}", e));
                    ShutdownOutcome::CleanupFailed
                }
            }
        });

        Some(ShutdownHandle { task })
    }
}

/// How an armed ledger's shutdown went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every step released
    Clean,
    /// A step failed; later steps were skipped
    CleanupFailed,
}

impl ShutdownOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::CleanupFailed => 1,
        }
    }
}

/// Pending interrupt-triggered shutdown of an armed ledger.
#[derive(Debug)]
pub struct ShutdownHandle {
    task: JoinHandle<ShutdownOutcome>,
}

impl ShutdownHandle {
    /// Wait for the trigger and the unwind that follows it.
    pub async fn finished(self) -> ShutdownOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "shutdown task did not complete");
                ShutdownOutcome::CleanupFailed
            }
        }
    }
}

/// The single process-wide interrupt listener.
///
/// The listener task belongs to the runtime that installed it. When that
/// runtime is gone the next subscriber installs a fresh one, and receivers of
/// the old listener see the channel close.
mod interrupt {
    use parking_lot::Mutex;
    use tokio::sync::broadcast;
    use tokio::task::JoinHandle;

    struct Listener {
        tx: broadcast::Sender<()>,
        task: JoinHandle<()>,
    }

    pub(super) struct InterruptHub {
        listener: Mutex<Option<Listener>>,
    }

    impl InterruptHub {
        pub(super) const fn new() -> Self {
            Self {
                listener: parking_lot::const_mutex(None),
            }
        }

        /// Subscribe to Ctrl+C. Must be called from within a tokio runtime.
        pub(super) fn subscribe(&self) -> broadcast::Receiver<()> {
            let mut slot = self.listener.lock();
            if let Some(listener) = slot.as_ref().filter(|l| !l.task.is_finished()) {
                return listener.tx.subscribe();
            }
            if slot.is_some() {
                tracing::debug!("interrupt listener stopped, installing a new one");
            }

            let (tx, rx) = broadcast::channel(4);
            let sender = tx.clone();
            let task = tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    tracing::debug!("interrupt received");
                    let _ = sender.send(());
                }
            });
            *slot = Some(Listener { tx, task });
            rx
        }

        #[cfg(test)]
        pub(super) fn is_listening(&self) -> bool {
            self.listener
                .lock()
                .as_ref()
                .is_some_and(|l| !l.task.is_finished())
        }
    }

    static HUB: InterruptHub = InterruptHub::new();

    pub(super) fn subscribe() -> broadcast::Receiver<()> {
        HUB.subscribe()
    }
}
