//! A bound axum listener that can be shut down from outside.

use axum::Router;
use fob_hmr::{CollaboratorError, CollaboratorResult};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub(crate) struct Listener {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

impl Listener {
    /// Bind `host:port` and serve `router` on a background task.
    pub(crate) async fn bind(host: &str, port: u16, router: Router) -> CollaboratorResult<Self> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| CollaboratorError::Bind {
                addr: format!("{}:{}", host, port),
                source,
            })?;
        let addr = listener.local_addr()?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        Ok(Self {
            addr,
            shutdown,
            task,
        })
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub(crate) async fn shutdown(self) -> CollaboratorResult<()> {
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(result) => result.map_err(CollaboratorError::from),
            Err(e) => Err(CollaboratorError::Other(format!("Server task failed: {}", e))),
        }
    }
}
