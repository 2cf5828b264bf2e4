//! Frontend dev server.
//!
//! Serves the bundled frontend from disk over HTTP, or HTTPS when a key and
//! certificate are supplied. The listener falls back to another port when the
//! requested one is busy, and shutdown drains in-flight requests before the
//! socket closes.

use crate::error::{DevError, DevResult};
use crate::ui;
use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Ports tried after the requested one before asking the OS for any port.
const PORT_SEARCH_SPAN: u16 = 10;

/// How long open connections get to finish during shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Key and certificate for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub key: PathBuf,
    pub cert: PathBuf,
}

/// Server options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeOptions {
    /// HTTPS when set, plain HTTP otherwise
    pub tls: Option<TlsFiles>,
}

enum Shutdown {
    Plain(oneshot::Sender<()>),
    Tls(axum_server::Handle),
}

/// A running frontend server.
pub struct FrontendServer {
    url: String,
    addr: SocketAddr,
    requested_port: u16,
    fallback_notice: Option<String>,
    drain_timeout: Duration,
    shutdown: Shutdown,
    task: JoinHandle<DevResult<()>>,
}

impl std::fmt::Debug for FrontendServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontendServer")
            .field("url", &self.url)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl FrontendServer {
    /// Serve `dist` on `requested_port` or the nearest free port.
    ///
    /// # Errors
    ///
    /// Returns error if no port can be bound or the TLS material cannot be read
    pub async fn serve(dist: &Path, requested_port: u16, opts: &ServeOptions) -> DevResult<Self> {
        let (listener, fallback_notice) = bind_available(requested_port).await?;
        let addr = listener.local_addr()?;
        let app = router(dist);

        let (scheme, shutdown, task) = match &opts.tls {
            None => {
                let (tx, rx) = oneshot::channel::<()>();
                let task = tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            let _ = rx.await;
                        })
                        .await
                        .map_err(|e| DevError::Server(e.to_string()))
                });
                ("http", Shutdown::Plain(tx), task)
            }
            Some(tls) => {
                let config =
                    axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                        .await
                        .map_err(|e| {
                            DevError::Server(format!(
                                "Failed to load TLS key/certificate ({}, {}): {}",
                                tls.key.display(),
                                tls.cert.display(),
                                e
                            ))
                        })?;
                let handle = axum_server::Handle::new();
                let server = axum_server::from_tcp_rustls(listener.into_std()?, config)
                    .handle(handle.clone());
                let task = tokio::spawn(async move {
                    server
                        .serve(app.into_make_service())
                        .await
                        .map_err(|e| DevError::Server(e.to_string()))
                });
                ("https", Shutdown::Tls(handle), task)
            }
        };

        let url = format!("{}://localhost:{}", scheme, addr.port());
        tracing::debug!(%url, dist = %dist.display(), "frontend server listening");

        Ok(Self {
            url,
            addr,
            requested_port,
            fallback_notice,
            drain_timeout: DRAIN_TIMEOUT,
            shutdown,
            task,
        })
    }

    /// Override how long [`cleanup`](Self::cleanup) waits for open connections.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Externally reachable URL, `scheme://localhost:<port>`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Whether the bound port differs from the requested one.
    pub fn fell_back(&self) -> bool {
        self.requested_port != 0 && self.addr.port() != self.requested_port
    }

    /// The warning shown when the requested port was busy.
    pub fn fallback_notice(&self) -> Option<&str> {
        self.fallback_notice.as_deref()
    }

    /// Stop accepting, let active requests finish, then close the socket.
    ///
    /// Connections still open after the drain timeout are dropped.
    pub async fn cleanup(self) -> DevResult<()> {
        let Self {
            shutdown,
            mut task,
            drain_timeout,
            ..
        } = self;

        let wait = match shutdown {
            Shutdown::Plain(tx) => {
                let _ = tx.send(());
                drain_timeout
            }
            Shutdown::Tls(handle) => {
                // axum-server force-closes at the deadline; allow it to get there
                handle.graceful_shutdown(Some(drain_timeout));
                drain_timeout + Duration::from_secs(1)
            }
        };

        match tokio::time::timeout(wait, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DevError::Server(format!("server task failed: {}", e))),
            Err(_) => {
                task.abort();
                ui::warning("Closing frontend connections that did not finish in time");
                tracing::warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "frontend server drain timed out"
                );
                Ok(())
            }
        }
    }
}

fn router(dist: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(dist).append_index_html_on_directories(true))
        .layer(
            // the frontend calls deployed endpoints on other origins
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind the requested port, else the next free one, else any port.
///
/// Returns the fallback warning alongside the listener when the port moved.
async fn bind_available(requested_port: u16) -> DevResult<(TcpListener, Option<String>)> {
    if let Ok(listener) = TcpListener::bind(local(requested_port)).await {
        return Ok((listener, None));
    }

    let mut fallback = None;
    for offset in 1..=PORT_SEARCH_SPAN {
        let Some(port) = requested_port.checked_add(offset) else {
            break;
        };
        if let Ok(listener) = TcpListener::bind(local(port)).await {
            fallback = Some(listener);
            break;
        }
    }

    let listener = match fallback {
        Some(listener) => listener,
        None => TcpListener::bind(local(0)).await.map_err(|e| {
            DevError::Server(format!("Failed to bind any port near {}: {}", requested_port, e))
        })?,
    };

    let port = listener.local_addr()?.port();
    let notice = format!("Port {} is busy, using port {} instead", requested_port, port);
    ui::warning(&notice);
    tracing::info!(requested = requested_port, actual = port, "port fallback");
    Ok((listener, Some(notice)))
}

fn local(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
