//! Rebuild and redeploy backend units when their sources change.
//!
//! Cycles are serialized through a two-slot latch: while one build+deploy is
//! in flight, further changes only overwrite the remembered path. When the
//! cycle finishes, exactly one more cycle runs for the latest path, so the
//! last observed state is always deployed and intermediate ones are skipped.
//!
//! A failing watch-triggered cycle stops the watcher for the rest of the
//! session; the failure is reported but never propagated.

use crate::config::{AppConfig, BuildUnit};
use crate::dev::service::{ActionService, DeployOptions};
use crate::dev::watcher::{default_ignore_patterns, FileWatcher, WatchEvent};
use crate::error::DevResult;
use crate::ui;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const DEBOUNCE_MS: u64 = 100;

/// Work performed for one change.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    /// Rebuild and redeploy `units` (qualified names).
    async fn redeploy(&self, units: &[String]) -> DevResult<()>;
}

/// Redeploys through the runtime service with a unit filter.
pub struct ServiceRedeploy {
    service: Arc<dyn ActionService>,
    config: AppConfig,
}

impl ServiceRedeploy {
    pub fn new(service: Arc<dyn ActionService>, config: AppConfig) -> Self {
        Self { service, config }
    }
}

#[async_trait]
impl ChangeHandler for ServiceRedeploy {
    async fn redeploy(&self, units: &[String]) -> DevResult<()> {
        self.service.build(&self.config, Some(units), false).await?;
        let report = self
            .service
            .deploy(
                &self.config,
                &DeployOptions {
                    filter: Some(units.to_vec()),
                },
            )
            .await?;
        for unit in &report.units {
            tracing::debug!(unit = %unit.name, url = ?unit.url, "redeployed");
        }
        Ok(())
    }
}

/// A unit with its sources resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedUnit {
    pub name: String,
    pub sources: Vec<PathBuf>,
}

impl WatchedUnit {
    pub fn resolve(root: &Path, units: &[BuildUnit]) -> Vec<Self> {
        units
            .iter()
            .map(|unit| Self {
                name: unit.qualified_name(),
                sources: unit.sources.iter().map(|s| root.join(s)).collect(),
            })
            .collect()
    }
}

/// Units whose declared source overlaps `path`.
///
/// Overlap is plain string containment in either direction: a unit declared
/// as a folder contains the changed file, and a changed folder may contain a
/// unit declared as a single file.
pub fn units_for_path(path: &Path, units: &[WatchedUnit]) -> Vec<String> {
    let changed = path.to_string_lossy();
    units
        .iter()
        .filter(|unit| {
            unit.sources.iter().any(|source| {
                let source = source.to_string_lossy();
                changed.contains(source.as_ref()) || source.contains(changed.as_ref())
            })
        })
        .map(|unit| unit.name.clone())
        .collect()
}

/// In-flight flag plus the latest path seen during the flight.
#[derive(Debug, Default)]
struct DeploySession {
    in_flight: bool,
    pending: Option<PathBuf>,
}

impl DeploySession {
    fn begin(&mut self) {
        self.in_flight = true;
    }

    fn observe(&mut self, path: PathBuf) {
        debug_assert!(self.in_flight);
        self.pending = Some(path);
    }

    /// End the cycle, handing back the path for the follow-up cycle if any.
    fn finish(&mut self) -> Option<PathBuf> {
        self.in_flight = false;
        self.pending.take()
    }
}

/// Running watch loop.
#[derive(Debug)]
pub struct ChangeScheduler {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ChangeScheduler {
    /// Watch `source_root` and redeploy matching units on change.
    pub fn start(
        source_root: &Path,
        units: Vec<WatchedUnit>,
        handler: Arc<dyn ChangeHandler>,
    ) -> DevResult<Self> {
        let (watcher, rx) = FileWatcher::new(
            source_root.to_path_buf(),
            default_ignore_patterns(),
            DEBOUNCE_MS,
        )?;
        tracing::debug!(root = %watcher.root().display(), "watching backend sources");
        Ok(Self::spawn(Some(watcher), rx, units, handler))
    }

    /// Same loop fed by an arbitrary event channel.
    pub fn from_events(
        rx: mpsc::Receiver<WatchEvent>,
        units: Vec<WatchedUnit>,
        handler: Arc<dyn ChangeHandler>,
    ) -> Self {
        Self::spawn(None, rx, units, handler)
    }

    fn spawn(
        watcher: Option<FileWatcher>,
        rx: mpsc::Receiver<WatchEvent>,
        units: Vec<WatchedUnit>,
        handler: Arc<dyn ChangeHandler>,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            // dropping the watcher at the end of the loop stops event delivery
            let _watcher = watcher;
            watch_loop(rx, stop_rx, &units, handler.as_ref()).await;
        });
        Self {
            stop: Some(stop_tx),
            task,
        }
    }

    /// False once the loop has stopped, e.g. after a failed cycle.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop watching; an in-flight cycle is allowed to finish first.
    pub async fn cleanup(mut self) -> DevResult<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "watch loop ended abnormally");
        }
        Ok(())
    }
}

async fn watch_loop(
    mut rx: mpsc::Receiver<WatchEvent>,
    mut stop: oneshot::Receiver<()>,
    units: &[WatchedUnit],
    handler: &dyn ChangeHandler,
) {
    let mut session = DeploySession::default();
    let mut stopping = false;

    loop {
        let first = tokio::select! {
            _ = &mut stop => break,
            event = rx.recv() => match event {
                Some(event) => event.path,
                None => break,
            },
        };

        let mut next = Some(first);
        while let Some(path) = next.take() {
            session.begin();
            let cycle = run_cycle(&path, units, handler);
            tokio::pin!(cycle);

            let outcome = loop {
                tokio::select! {
                    biased;
                    Some(event) = rx.recv() => session.observe(event.path),
                    _ = &mut stop, if !stopping => stopping = true,
                    outcome = &mut cycle => break outcome,
                }
            };

            let pending = session.finish();
            if let Err(e) = outcome {
                ui::error(&format!("Rebuild failed: {}", e));
                ui::warning("File watching stopped; restart to resume automatic redeploys");
                tracing::error!(error = %e, "watch-triggered cycle failed");
                return;
            }
            if stopping {
                return;
            }
            next = pending;
        }
    }
}

async fn run_cycle(path: &Path, units: &[WatchedUnit], handler: &dyn ChangeHandler) -> DevResult<()> {
    let matched = units_for_path(path, units);
    if matched.is_empty() {
        ui::info(&format!(
            "{} changed but belongs to no declared unit; restart `loom run` to pick it up",
            path.display()
        ));
        return Ok(());
    }

    ui::info(&format!(
        "{} changed, redeploying {}",
        path.display(),
        matched.join(", ")
    ));
    handler.redeploy(&matched).await?;
    ui::success(&format!("Redeployed {}", matched.join(", ")));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DevError;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Records every call, then blocks until the test hands out a permit.
    struct GatedHandler {
        calls: Mutex<Vec<Vec<String>>>,
        gate: Semaphore,
        fail: bool,
    }

    impl GatedHandler {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                gate: Semaphore::new(0),
                fail,
            })
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ChangeHandler for GatedHandler {
        async fn redeploy(&self, units: &[String]) -> DevResult<()> {
            self.calls.lock().push(units.to_vec());
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            if self.fail {
                return Err(DevError::Deploy("boom".to_string()));
            }
            Ok(())
        }
    }

    fn units() -> Vec<WatchedUnit> {
        ["a", "b", "c"]
            .iter()
            .map(|name| WatchedUnit {
                name: format!("default/{}", name),
                sources: vec![PathBuf::from(format!("/project/actions/{}", name))],
            })
            .collect()
    }

    fn event(name: &str) -> WatchEvent {
        WatchEvent::new(format!("/project/actions/{}/index.js", name))
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_units_for_path_matches_folder_sources() {
        let matched = units_for_path(Path::new("/project/actions/b/lib/util.js"), &units());
        assert_eq!(matched, vec!["default/b"]);
    }

    #[test]
    fn test_units_for_path_matches_file_sources_from_parent() {
        let units = vec![WatchedUnit {
            name: "default/single".to_string(),
            sources: vec![PathBuf::from("/project/actions/single.js")],
        }];
        assert_eq!(
            units_for_path(Path::new("/project/actions"), &units),
            vec!["default/single"]
        );
        assert!(units_for_path(Path::new("/project/web-src/app.js"), &units).is_empty());
    }

    #[test]
    fn test_units_for_path_is_plain_containment() {
        // a unit whose folder name prefixes another's matches both
        let units = vec![
            WatchedUnit {
                name: "default/action".to_string(),
                sources: vec![PathBuf::from("/project/actions/action")],
            },
            WatchedUnit {
                name: "default/action-zip".to_string(),
                sources: vec![PathBuf::from("/project/actions/action-zip")],
            },
        ];
        assert_eq!(
            units_for_path(Path::new("/project/actions/action-zip/index.js"), &units),
            vec!["default/action", "default/action-zip"]
        );
        assert_eq!(
            units_for_path(Path::new("/project/actions/action/index.js"), &units),
            vec!["default/action"]
        );
    }

    #[test]
    fn test_resolve_joins_root() {
        let unit = BuildUnit {
            name: "hello".to_string(),
            package: "demo".to_string(),
            sources: vec![PathBuf::from("actions/hello")],
            web: true,
        };
        let resolved = WatchedUnit::resolve(Path::new("/project"), &[unit]);
        assert_eq!(resolved[0].name, "demo/hello");
        assert_eq!(resolved[0].sources, vec![PathBuf::from("/project/actions/hello")]);
    }

    #[tokio::test]
    async fn test_changes_during_flight_coalesce_to_latest() {
        let handler = GatedHandler::new(false);
        let (tx, rx) = mpsc::channel(16);
        let scheduler = ChangeScheduler::from_events(rx, units(), handler.clone());

        tx.send(event("a")).await.unwrap();
        eventually(|| handler.calls().len() == 1).await;

        // three changes while the first cycle is blocked
        tx.send(event("b")).await.unwrap();
        tx.send(event("a")).await.unwrap();
        tx.send(event("c")).await.unwrap();
        eventually(|| tx.capacity() == tx.max_capacity()).await;
        assert_eq!(handler.calls().len(), 1);

        handler.gate.add_permits(1);
        eventually(|| handler.calls().len() == 2).await;
        handler.gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            handler.calls(),
            vec![vec!["default/a".to_string()], vec!["default/c".to_string()]]
        );
        scheduler.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_unmatched_change_triggers_nothing() {
        let handler = GatedHandler::new(false);
        let (tx, rx) = mpsc::channel(16);
        let scheduler = ChangeScheduler::from_events(rx, units(), handler.clone());

        tx.send(WatchEvent::new("/project/README.md")).await.unwrap();
        eventually(|| tx.capacity() == tx.max_capacity()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(handler.calls().is_empty());
        assert!(scheduler.is_running());
        scheduler.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_cycle_stops_watching() {
        let handler = GatedHandler::new(true);
        handler.gate.add_permits(10);
        let (tx, rx) = mpsc::channel(16);
        let scheduler = ChangeScheduler::from_events(rx, units(), handler.clone());

        tx.send(event("a")).await.unwrap();
        eventually(|| !scheduler.is_running()).await;

        // the receiver is gone, later changes go nowhere
        assert!(tx.send(event("b")).await.is_err());
        assert_eq!(handler.calls().len(), 1);
        scheduler.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_waits_for_in_flight_cycle() {
        let handler = GatedHandler::new(false);
        let (tx, rx) = mpsc::channel(16);
        let scheduler = ChangeScheduler::from_events(rx, units(), handler.clone());

        tx.send(event("a")).await.unwrap();
        eventually(|| handler.calls().len() == 1).await;
        tx.send(event("b")).await.unwrap();

        let cleanup = tokio::spawn(scheduler.cleanup());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cleanup.is_finished());

        handler.gate.add_permits(1);
        cleanup.await.unwrap().unwrap();
        // the pending change is dropped once stopping
        assert_eq!(handler.calls().len(), 1);
    }
}
