//! HTTP server manager.
//!
//! Generalizes "serve one fixed router, run until signalled, then return"
//! into an explicit `idle → listening → closing → closed` state machine,
//! with `listen`/`close` independently callable (so embedders and tests can
//! drive the lifecycle without going through signal handling) and a
//! separate [`Server::serve_until_shutdown`] that wires SIGTERM/SIGINT into
//! `close()` for a binary's `main`.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL. The
//! server reacts by immediately stopping `listener.accept()`, letting every
//! in-flight request finish (up to `request_timeout`), and only then
//! returning. Set `terminationGracePeriodSeconds` longer than the slowest
//! request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::app::Application;
use crate::context::RawRequest;
use crate::error::Error;
use crate::events::Event;
use crate::response::Response;

/// Connection-setting knobs forwarded from `listen` options — defaults
/// chosen to be slightly above the upstream load balancer's typical idle.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub keep_alive_timeout: Duration,
    pub request_timeout: Duration,
    pub headers_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            keep_alive_timeout: Duration::from_secs(65),
            request_timeout: Duration::from_secs(60),
            headers_timeout: Duration::from_secs(66),
        }
    }
}

/// State machine: `idle → listening → closing → closed`,
/// `listening → closed` via error also permitted (surfaced here as
/// `listen` simply never reaching `Listening` on a bind failure).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Listening,
    Closing,
    Closed,
}

struct Inner {
    app: Arc<Application>,
    options: ServerOptions,
    state: RwLock<State>,
    addr: RwLock<Option<SocketAddr>>,
    shutdown_notify: Notify,
    accept_task: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
    close_lock: tokio::sync::Mutex<()>,
    shutdown_started: AtomicBool,
}

/// Owns the listener and drives one [`Application`]. Cheap to
/// clone — every clone shares the same lifecycle state.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Server {
    pub fn new(app: Arc<Application>) -> Self {
        Self::with_options(app, ServerOptions::default())
    }

    pub fn with_options(app: Arc<Application>, options: ServerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                app,
                options,
                state: RwLock::new(State::Idle),
                addr: RwLock::new(None),
                shutdown_notify: Notify::new(),
                accept_task: parking_lot::Mutex::new(None),
                close_lock: tokio::sync::Mutex::new(()),
                shutdown_started: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> State {
        *self.inner.state.read()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.addr.read()
    }

    /// `listen(host:port)`: transitions `idle → listening`;
    /// rejects if already listening. Emits [`Event::Listening`] once the
    /// socket is bound.
    pub async fn listen(&self, addr: &str) -> Result<SocketAddr, Error> {
        {
            let state = self.inner.state.read();
            if *state != State::Idle {
                return Err(already_listening());
            }
        }

        let socket_addr: SocketAddr = addr.parse().map_err(|_| invalid_address(addr))?;
        let listener = TcpListener::bind(socket_addr).await?;
        let bound = listener.local_addr()?;

        *self.inner.state.write() = State::Listening;
        *self.inner.addr.write() = Some(bound);

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(accept_loop(inner, listener));
        *self.inner.accept_task.lock() = Some(task);

        info!(addr = %bound, "server listening");
        self.inner.app.events().emit(Event::Listening { addr: bound });
        Ok(bound)
    }

    /// `close()`: transitions `listening → closing`, stops
    /// accepting new connections, waits for every in-flight request to
    /// finish, then transitions to `closed`. Idempotent: concurrent callers
    /// serialize on an internal lock and share the same outcome.
    pub async fn close(&self) -> Result<(), Error> {
        let _guard = self.inner.close_lock.lock().await;

        match self.state() {
            State::Idle | State::Closed => return Ok(()),
            State::Closing => return Ok(()),
            State::Listening => {}
        }

        *self.inner.state.write() = State::Closing;
        self.inner.shutdown_notify.notify_waiters();
        self.inner.app.events().emit(Event::Close);
        info!("closing: draining in-flight connections");

        if let Some(task) = self.inner.accept_task.lock().take() {
            let _ = task.await;
        }

        self.inner.app.context_factory().drain();
        *self.inner.state.write() = State::Closed;
        info!("server closed");
        Ok(())
    }

    /// Installs SIGTERM/SIGINT handling and drives `close()` to completion
    /// on the first signal received: emits
    /// `Shutdown(signal)`, then on success `ShutdownComplete` and exits the
    /// process with code 0, or on failure `ShutdownError` and exits with
    /// code 1. Additional signals received while a shutdown is already in
    /// progress are ignored.
    pub async fn serve_until_shutdown(&self) -> ! {
        let signal = wait_for_signal().await;

        if self.inner.shutdown_started.swap(true, Ordering::AcqRel) {
            // A shutdown was already underway (e.g. a second Ctrl-C); wait
            // for it rather than racing a second `close()`.
            loop {
                if self.state() == State::Closed {
                    std::process::exit(0);
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }

        warn!(signal, "shutdown signal received");
        self.inner.app.events().emit(Event::Shutdown { signal });

        match self.close().await {
            Ok(()) => {
                self.inner.app.events().emit(Event::ShutdownComplete);
                std::process::exit(0);
            }
            Err(e) => {
                error!(error = %e, "graceful shutdown failed");
                self.inner.app.events().emit(Event::ShutdownError(e.to_string()));
                std::process::exit(1);
            }
        }
    }
}

fn already_listening() -> Error {
    std::io::Error::new(std::io::ErrorKind::AlreadyExists, "server is already listening").into()
}

fn invalid_address(addr: &str) -> Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid socket address `{addr}`")).into()
}

// ── Accept loop ────────────────────────────────────────────────────────────

async fn accept_loop(inner: Arc<Inner>, listener: TcpListener) {
    let mut tasks = tokio::task::JoinSet::new();

    loop {
        tokio::select! {
            biased;

            () = inner.shutdown_notify.notified() => {
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        inner.app.events().emit(Event::Error(e.to_string()));
                        continue;
                    }
                };

                let app = Arc::clone(&inner.app);
                let request_timeout = inner.options.request_timeout;
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    let svc = service_fn(move |req| {
                        let app = Arc::clone(&app);
                        async move { handle_request(app, req, remote_addr, request_timeout).await }
                    });

                    if let Err(e) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, svc).await {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}
}

// ── Per-request translation ─────────────────────────────────────────────────

/// Translates one hyper request into a [`RawRequest`], runs it through
/// [`Application::dispatch`] under `request_timeout`, and translates the
/// result back. Infallible to hyper — every failure (timeout included)
/// becomes a response, never a connection error.
async fn handle_request(
    app: Arc<Application>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    request_timeout: Duration,
) -> Result<hyper::Response<crate::body::BoxBody>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let search = parts.uri.query().map(|q| format!("?{q}")).unwrap_or_default();
    let url = format!("{path}{search}");

    let raw = RawRequest {
        method: parts.method,
        url,
        path,
        search,
        headers: parts.headers,
        remote_addr: Some(remote_addr.ip()),
        socket_encrypted: false,
    };

    let raw_body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            Vec::new()
        }
    };

    let response = match tokio::time::timeout(request_timeout, app.dispatch(raw, raw_body)).await {
        Ok(response) => response,
        Err(_) => crate::error::NextRushError::Timeout("request exceeded deadline".to_string()).into(),
    };

    Ok(into_hyper_response(response))
}

fn into_hyper_response(response: Response) -> hyper::Response<crate::body::BoxBody> {
    let (status, headers, body) = response.into_parts();
    let mut builder = hyper::Response::builder().status(status);
    if let Some(map) = builder.headers_mut() {
        *map = headers;
    }
    builder.body(body).unwrap_or_else(|_| hyper::Response::new(crate::body::empty_body()))
}

// ── Shutdown signal ───────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives, returning its
/// name. On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C). On non-Unix platforms
/// only Ctrl-C is available.
async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
        "SIGINT"
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&'static str>();

    tokio::select! {
        signal = ctrl_c => signal,
        signal = sigterm => signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listen_then_close_reaches_closed_state() {
        let app = Arc::new(Application::new());
        let server = Server::new(app);

        let addr = server.listen("127.0.0.1:0").await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.state(), State::Listening);

        server.close().await.unwrap();
        assert_eq!(server.state(), State::Closed);
    }

    #[tokio::test]
    async fn listening_twice_is_rejected() {
        let app = Arc::new(Application::new());
        let server = Server::new(app);
        server.listen("127.0.0.1:0").await.unwrap();

        let err = server.listen("127.0.0.1:0").await;
        assert!(err.is_err());

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_before_listen_is_a_harmless_no_op() {
        let app = Arc::new(Application::new());
        let server = Server::new(app);
        server.close().await.unwrap();
        assert_eq!(server.state(), State::Idle);
    }

    #[tokio::test]
    async fn concurrent_close_calls_agree() {
        let app = Arc::new(Application::new());
        let server = Server::new(app);
        server.listen("127.0.0.1:0").await.unwrap();

        let a = server.clone();
        let b = server.clone();
        let (r1, r2) = tokio::join!(a.close(), b.close());
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        assert_eq!(server.state(), State::Closed);
    }
}
