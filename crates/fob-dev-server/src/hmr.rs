//! HMR over Server-Sent Events.
//!
//! [`HmrHub`] tracks connected clients and fans messages out to them.
//! [`HmrChannel`] is the [`UpdateChannel`] the reporter drives: co-located
//! with a dev server it pushes through that server's hub, otherwise it binds
//! its own listener serving only the SSE endpoint.

use crate::listener::Listener;
use crate::message::HmrMessage;
use crate::server::DevServerHandle;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{
        IntoResponse, Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use fob_hmr::{
    ChannelOptions, CollaboratorError, CollaboratorResult, Diagnostic, ReporterLogger,
    UpdateChannel, UpdateEvent,
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tower_http::cors::{Any, CorsLayer};

/// SSE endpoint clients subscribe to.
pub const HMR_PATH: &str = "/__fob_hmr__";

/// Client runtime script.
pub const HMR_CLIENT_PATH: &str = "/__fob_hmr__.js";

const CLIENT_SCRIPT: &str = include_str!("../assets/hmr-client.js");

/// Messages buffered per client before it counts as lagging.
const CLIENT_BUFFER: usize = 100;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Registry of connected HMR clients.
#[derive(Clone, Default)]
pub struct HmrHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    clients: RwLock<FxHashMap<usize, mpsc::Sender<String>>>,
    next_client_id: AtomicUsize,
    /// Last error message, replayed to clients connecting while a build is broken.
    pending_error: RwLock<Option<String>>,
    /// Whether an update channel pushes through this hub.
    attached: AtomicBool,
    /// Set once the hub's listener is shutting down; only written under `clients`.
    shut_down: AtomicBool,
}

impl fmt::Debug for HmrHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmrHub")
            .field("clients", &self.client_count())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl HmrHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. After [`HmrHub::shut_down`] the returned receiver
    /// is already closed.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.inner.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);

        let mut clients = self.inner.clients.write();
        if self.inner.shut_down.load(Ordering::Acquire) {
            return (id, rx);
        }

        if let Some(error) = self.inner.pending_error.read().clone() {
            let _ = tx.try_send(error);
        }

        clients.insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.inner.clients.write().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.read().len()
    }

    /// Send `message` to every client. Returns how many received it.
    ///
    /// Disconnected clients are dropped. A client whose buffer is full misses
    /// this message and stays registered.
    pub fn broadcast(&self, message: &HmrMessage) -> Result<usize, serde_json::Error> {
        let json = serde_json::to_string(message)?;

        *self.inner.pending_error.write() = message.is_error().then(|| json.clone());

        let clients: Vec<(usize, mpsc::Sender<String>)> = self
            .inner
            .clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in clients {
            match tx.try_send(json.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(client = id, "HMR client is lagging, dropping message");
                }
            }
        }

        for id in closed {
            tracing::debug!(client = id, "HMR client disconnected");
            self.unregister_client(id);
        }

        Ok(delivered)
    }

    /// Disconnect every client, ending their SSE streams.
    pub fn close_all(&self) {
        self.inner.clients.write().clear();
        *self.inner.pending_error.write() = None;
    }

    /// Disconnect every client and refuse new ones until [`HmrHub::reopen`].
    ///
    /// Graceful shutdown waits on open SSE streams, so this must run before
    /// the listener is told to stop.
    pub fn shut_down(&self) {
        let mut clients = self.inner.clients.write();
        self.inner.shut_down.store(true, Ordering::Release);
        clients.clear();
        *self.inner.pending_error.write() = None;
    }

    pub fn reopen(&self) {
        let _clients = self.inner.clients.write();
        self.inner.shut_down.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::Acquire)
    }

    fn set_attached(&self, attached: bool) {
        self.inner.attached.store(attached, Ordering::Release);
    }
}

/// SSE endpoint and client script, for mounting on any router.
pub fn routes<S>(hub: HmrHub) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(HMR_PATH, get(handle_sse))
        .route(HMR_CLIENT_PATH, get(handle_client_script))
        .with_state(hub)
}

async fn handle_sse(
    State(hub): State<HmrHub>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = hub.register_client();
    tracing::debug!(client = id, "HMR client connected");

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("ping"))
}

async fn handle_client_script() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from(CLIENT_SCRIPT),
    )
}

/// The update channel for one port.
pub struct HmrChannel {
    port: u16,
    host: String,
    hub: HmrHub,
    colocated: bool,
    running: AtomicBool,
    listener: Mutex<Option<Listener>>,
    logger: Arc<dyn ReporterLogger>,
}

impl HmrChannel {
    pub fn new(options: ChannelOptions<DevServerHandle>) -> Self {
        let (hub, colocated) = match options.dev_server {
            Some(handle) => (handle.hub, true),
            None => (HmrHub::new(), false),
        };
        Self {
            port: options.port,
            host: options.host,
            hub,
            colocated,
            running: AtomicBool::new(false),
            listener: Mutex::new(None),
            logger: options.logger,
        }
    }

    pub fn hub(&self) -> &HmrHub {
        &self.hub
    }

    pub fn is_colocated(&self) -> bool {
        self.colocated
    }

    /// Address of the channel's own listener; `None` when co-located or stopped.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().as_ref().map(Listener::addr)
    }

    fn push(&self, message: &HmrMessage) -> CollaboratorResult<()> {
        if !self.running.load(Ordering::Acquire) {
            return Err(CollaboratorError::Closed);
        }
        let delivered = self.hub.broadcast(message)?;
        self.logger
            .verbose(&format!("Pushed HMR message to {} client(s)", delivered));
        Ok(())
    }
}

#[async_trait]
impl UpdateChannel for HmrChannel {
    fn port(&self) -> u16 {
        self.port
    }

    async fn start(&self) -> CollaboratorResult<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(CollaboratorError::Other(
                "HMR channel is already running".to_string(),
            ));
        }

        if self.colocated {
            self.hub.set_attached(true);
        } else {
            self.hub.reopen();
            let router = routes(self.hub.clone()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
            let listener = Listener::bind(&self.host, self.port, router).await?;
            self.logger.info(&format!(
                "HMR channel listening on http://{}{}",
                listener.addr(),
                HMR_PATH
            ));
            *self.listener.lock() = Some(listener);
        }

        self.running.store(true, Ordering::Release);
        Ok(())
    }

    async fn stop(&self) -> CollaboratorResult<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Err(CollaboratorError::Closed);
        }

        if self.colocated {
            // The server keeps serving; only this channel's clients go away.
            self.hub.close_all();
            self.hub.set_attached(false);
        } else {
            self.hub.shut_down();
        }

        let listener = self.listener.lock().take();
        match listener {
            Some(listener) => listener.shutdown().await,
            None => Ok(()),
        }
    }

    fn emit_update(&self, event: UpdateEvent<'_>) -> CollaboratorResult<()> {
        self.push(&HmrMessage::update(event))
    }

    fn emit_error(&self, diagnostics: &[Diagnostic]) -> CollaboratorResult<()> {
        self.push(&HmrMessage::error(diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HmrAsset;

    #[tokio::test]
    async fn test_client_registration() {
        let hub = HmrHub::new();

        let (id1, _rx1) = hub.register_client();
        let (id2, _rx2) = hub.register_client();

        assert_eq!(hub.client_count(), 2);
        assert_ne!(id1, id2);

        hub.unregister_client(id1);
        assert_eq!(hub.client_count(), 1);
    }

    #[tokio::test]
    async fn test_new_client_receives_pending_error() {
        let hub = HmrHub::new();
        hub.broadcast(&HmrMessage::error(&[Diagnostic::new("broken")]))
            .unwrap();

        let (_id, mut rx) = hub.register_client();
        let replayed = rx.recv().await.expect("pending error");
        assert!(replayed.contains("broken"));
    }

    #[tokio::test]
    async fn test_update_clears_pending_error() {
        let hub = HmrHub::new();
        hub.broadcast(&HmrMessage::error(&[Diagnostic::new("broken")]))
            .unwrap();
        hub.broadcast(&HmrMessage::Update { assets: vec![] }).unwrap();

        let (_id, mut rx) = hub.register_client();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_live_clients_and_drops_closed() {
        let hub = HmrHub::new();
        let (_a, mut rx_a) = hub.register_client();
        let (_b, rx_b) = hub.register_client();
        let (_c, mut rx_c) = hub.register_client();
        drop(rx_b);

        let delivered = hub
            .broadcast(&HmrMessage::Update {
                assets: vec![HmrAsset {
                    id: "app.js".into(),
                    asset_type: "js".into(),
                    output: Some("console.log(1);".into()),
                    deps: vec![],
                }],
            })
            .unwrap();

        assert_eq!(delivered, 2);
        for rx in [&mut rx_a, &mut rx_c] {
            let json = rx.recv().await.expect("update");
            assert!(json.contains(r#""type":"update""#));
            assert!(json.contains(r#""id":"app.js""#));
        }
        assert_eq!(hub.client_count(), 2);
    }

    #[tokio::test]
    async fn test_shut_down_refuses_late_clients() {
        let hub = HmrHub::new();
        let (_id, mut early) = hub.register_client();

        hub.shut_down();

        assert!(early.recv().await.is_none());
        let (_id, mut late) = hub.register_client();
        assert!(late.recv().await.is_none());
        assert_eq!(hub.client_count(), 0);

        hub.reopen();
        let (_id, _rx) = hub.register_client();
        assert_eq!(hub.client_count(), 1);
    }

    #[tokio::test]
    async fn test_close_all_ends_streams() {
        let hub = HmrHub::new();
        let (_id, mut rx) = hub.register_client();

        hub.close_all();

        assert_eq!(hub.client_count(), 0);
        assert!(rx.recv().await.is_none());
    }
}
