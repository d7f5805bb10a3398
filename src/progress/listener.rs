//! HTTP transport for the ffmpeg progress report.
//!
//! ffmpeg can push its `-progress` report to a URL instead of a file
//! descriptor. [`ProgressListener`] binds an ephemeral local port and feeds
//! every request body on [`PROGRESS_PATH`] through the same consumer as the
//! pipe transport.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use futures_util::TryStreamExt;
use tokio::net::TcpListener;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use url::Url;

use super::{read_progress, Progress};

/// Path ffmpeg posts the progress report to.
pub const PROGRESS_PATH: &str = "/progress";

/// Address the listener binds to. The port is chosen by the OS.
pub const LISTEN_ADDRESS: &str = "127.0.0.1:0";

type SharedCallback = Arc<Mutex<dyn FnMut(Progress) + Send>>;

/// Errors from the progress listener.
#[derive(thiserror::Error, Debug)]
pub enum ListenerError {
    /// Failed to bind the local port.
    #[error("listen: {0}")]
    Bind(#[source] std::io::Error),
    /// The serving loop failed.
    #[error("serve: {0}")]
    Serve(#[source] std::io::Error),
    /// The bound address could not be turned into a URL.
    #[error("invalid listener url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone)]
struct ListenerState {
    on_progress: SharedCallback,
    stop: CancellationToken,
}

/// Local HTTP endpoint receiving ffmpeg progress reports.
pub struct ProgressListener {
    listener: TcpListener,
    url: Url,
    state: ListenerState,
}

impl std::fmt::Debug for ProgressListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressListener")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl ProgressListener {
    /// Bind an ephemeral local port.
    ///
    /// `on_progress` is called for each completed record. Calls are
    /// serialized even if ffmpeg opens several connections.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Bind` if the port cannot be bound.
    pub async fn bind<F>(on_progress: F) -> Result<Self, ListenerError>
    where
        F: FnMut(Progress) + Send + 'static,
    {
        let listener = TcpListener::bind(LISTEN_ADDRESS)
            .await
            .map_err(ListenerError::Bind)?;
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        let url = Url::parse(&format!("http://{addr}"))?.join(PROGRESS_PATH)?;

        tracing::debug!(url = %url, "Progress listener bound");

        Ok(Self {
            listener,
            url,
            state: ListenerState {
                on_progress: Arc::new(Mutex::new(on_progress)),
                stop: CancellationToken::new(),
            },
        })
    }

    /// URL to pass to ffmpeg's `-progress` flag.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The bound socket address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops the listener after [`ProgressListener::run`] took
    /// ownership of it.
    #[must_use]
    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            stop: self.state.stop.clone(),
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route(PROGRESS_PATH, post(receive_progress))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until stopped through a [`ListenerHandle`].
    ///
    /// Open report uploads are cut off on stop, so this returns without
    /// ffmpeg closing its connection.
    ///
    /// # Errors
    ///
    /// Returns `ListenerError::Serve` if the serving loop fails.
    pub async fn run(self) -> Result<(), ListenerError> {
        let app = self.router();
        let stop = self.state.stop.clone();

        tracing::debug!(url = %self.url, "Serving progress listener");

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                stop.cancelled().await;
                tracing::debug!("Progress listener shutting down");
            })
            .await
            .map_err(ListenerError::Serve)
    }
}

/// Stops a running [`ProgressListener`].
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    stop: CancellationToken,
}

impl ListenerHandle {
    /// Close the listener and abort in-flight report uploads.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

/// POST /progress - consume one streamed progress report.
async fn receive_progress(State(state): State<ListenerState>, body: Body) -> StatusCode {
    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);
    let on_progress = Arc::clone(&state.on_progress);

    let result = tokio::select! {
        result = read_progress(reader, |progress| {
            let mut callback = on_progress.lock().unwrap_or_else(PoisonError::into_inner);
            callback(progress);
        }) => result,
        () = state.stop.cancelled() => Ok(()),
    };

    match result {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read progress report");
            StatusCode::BAD_REQUEST
        }
    }
}
