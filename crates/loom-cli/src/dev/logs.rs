//! Periodic log fetching from the runtime service.

use crate::config::AppConfig;
use crate::dev::service::{ActionService, LogLine};
use crate::error::DevResult;
use crate::ui;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// Background task printing new unit log lines.
#[derive(Debug)]
pub struct LogPoller {
    task: JoinHandle<()>,
}

impl LogPoller {
    /// Poll from now on, every `interval`.
    pub fn start(service: Arc<dyn ActionService>, config: AppConfig, interval: Duration) -> Self {
        Self::start_with(service, config, interval, now_ms(), |line| {
            ui::log_line(&line.unit, &line.message)
        })
    }

    /// Like [`LogPoller::start`] with an explicit starting point and sink.
    pub fn start_with<F>(
        service: Arc<dyn ActionService>,
        config: AppConfig,
        interval: Duration,
        since: u64,
        sink: F,
    ) -> Self
    where
        F: Fn(&LogLine) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut since = since;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match service.fetch_logs(&config, since).await {
                    Ok(mut lines) => {
                        lines.sort_by_key(|line| line.timestamp);
                        for line in lines.iter().filter(|line| line.timestamp > since) {
                            sink(line);
                        }
                        if let Some(newest) = lines.iter().map(|line| line.timestamp).max() {
                            since = since.max(newest);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to fetch logs"),
                }
            }
        });
        Self { task }
    }

    pub fn cleanup(self) -> DevResult<()> {
        self.task.abort();
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::service::{DeployOptions, DeployReport};
    use crate::error::DevError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Serves a scripted sequence of fetch results, recording `since`.
    struct ScriptedLogs {
        responses: Mutex<Vec<DevResult<Vec<LogLine>>>>,
        seen_since: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl ActionService for ScriptedLogs {
        async fn check_credentials(&self, _config: &AppConfig) -> DevResult<()> {
            Ok(())
        }

        async fn build(&self, _: &AppConfig, _: Option<&[String]>, _: bool) -> DevResult<()> {
            Ok(())
        }

        async fn deploy(&self, _: &AppConfig, _: &DeployOptions) -> DevResult<DeployReport> {
            Ok(DeployReport::default())
        }

        async fn fetch_logs(&self, _config: &AppConfig, since: u64) -> DevResult<Vec<LogLine>> {
            self.seen_since.lock().push(since);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    fn line(unit: &str, timestamp: u64, message: &str) -> LogLine {
        LogLine {
            unit: unit.to_string(),
            timestamp,
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_poller_advances_and_survives_errors() {
        let service = Arc::new(ScriptedLogs {
            responses: Mutex::new(vec![
                Ok(vec![line("default/b", 20, "second"), line("default/a", 10, "first")]),
                Err(DevError::Deploy("network down".to_string())),
                Ok(vec![line("default/a", 20, "duplicate"), line("default/a", 30, "third")]),
            ]),
            seen_since: Mutex::new(Vec::new()),
        });
        let printed = Arc::new(Mutex::new(Vec::new()));
        let sink = printed.clone();

        let poller = LogPoller::start_with(
            service.clone(),
            AppConfig::new("/project"),
            Duration::from_millis(10),
            0,
            move |line| sink.lock().push(line.message.clone()),
        );

        for _ in 0..200 {
            if service.seen_since.lock().len() >= 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        poller.cleanup().unwrap();

        assert_eq!(*printed.lock(), vec!["first", "second", "third"]);
        assert_eq!(service.seen_since.lock()[..4], [0, 20, 20, 30]);
    }
}
