mod dtype;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use text_retrieval_backend_core::Backend as CoreBackend;
use tokio::sync::{mpsc, oneshot};
use tracing::{instrument, Span};

pub use crate::dtype::DType;
pub use text_retrieval_backend_core::{BackendError, Embedding, ModelType};

#[cfg(feature = "candle")]
use text_retrieval_backend_candle::CandleBackend;

/// Handle to a loaded model.
///
/// The model lives on its own blocking thread and executes one command at a time, in the
/// order commands arrive. Cloning the handle is cheap and every clone feeds the same thread,
/// so concurrent requests never reach the model concurrently.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Channel to communicate with the background thread
    backend_sender: mpsc::Sender<BackendCommand>,
    _backend_thread: Arc<BackendThread>,
    pub model_type: ModelType,
    pub model_id: String,
}

impl Backend {
    pub fn new(
        backend: Box<dyn CoreBackend + Send>,
        model_type: ModelType,
        model_id: String,
    ) -> Self {
        let (backend_sender, backend_receiver) = mpsc::channel(8);

        let _backend_thread = Arc::new(BackendThread::new(backend, backend_receiver));

        Self {
            backend_sender,
            _backend_thread,
            model_type,
            model_id,
        }
    }

    /// Load the weights found in `model_path` and start the backend thread
    #[instrument(skip(model_path))]
    pub fn load(
        model_path: PathBuf,
        dtype: DType,
        model_type: ModelType,
        model_id: String,
    ) -> Result<Self, BackendError> {
        let backend = init_backend(model_path, dtype, model_type)?;
        Ok(Self::new(backend, model_type, model_id))
    }

    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<(), BackendError> {
        let (sender, receiver) = oneshot::channel();
        self.send(BackendCommand::Health(Span::current(), sender))
            .await?;
        receiver.await.map_err(|_| BackendError::Unhealthy)?
    }

    #[instrument(skip_all)]
    pub async fn embed(
        &self,
        texts: Vec<String>,
    ) -> Result<(Vec<Embedding>, Duration), BackendError> {
        let (sender, receiver) = oneshot::channel();
        self.send(BackendCommand::Embed(texts, Span::current(), sender))
            .await?;
        receiver.await.map_err(|_| BackendError::Unhealthy)?
    }

    #[instrument(skip_all)]
    pub async fn predict(
        &self,
        pairs: Vec<(String, String)>,
    ) -> Result<(Vec<f32>, Duration), BackendError> {
        let (sender, receiver) = oneshot::channel();
        self.send(BackendCommand::Predict(pairs, Span::current(), sender))
            .await?;
        receiver.await.map_err(|_| BackendError::Unhealthy)?
    }

    async fn send(&self, command: BackendCommand) -> Result<(), BackendError> {
        // Waits for room in the channel instead of failing when the model is busy
        self.backend_sender.send(command).await.map_err(|_| {
            tracing::error!("backend thread is gone");
            BackendError::Unhealthy
        })
    }
}

#[allow(unused)]
fn init_backend(
    model_path: PathBuf,
    dtype: DType,
    model_type: ModelType,
) -> Result<Box<dyn CoreBackend + Send>, BackendError> {
    if cfg!(feature = "candle") {
        #[cfg(feature = "candle")]
        {
            let backend = CandleBackend::new(&model_path, dtype.to_string(), model_type);
            match backend {
                Ok(b) => return Ok(Box::new(b)),
                Err(err) => {
                    tracing::error!("Could not start Candle backend: {err}");
                    return Err(BackendError::Start(format!(
                        "Could not start a suitable backend: {err}"
                    )));
                }
            }
        }
    }

    Err(BackendError::NoBackend)
}

#[derive(Debug)]
struct BackendThread(Option<JoinHandle<()>>);

impl BackendThread {
    fn new(
        backend: Box<dyn CoreBackend + Send>,
        mut backend_receiver: mpsc::Receiver<BackendCommand>,
    ) -> Self {
        let handle = std::thread::spawn(move || {
            while let Some(cmd) = backend_receiver.blocking_recv() {
                let start = Instant::now();
                match cmd {
                    BackendCommand::Health(span, sender) => {
                        let _span = span.entered();
                        let _ = sender.send(backend.health());
                    }
                    BackendCommand::Embed(texts, span, sender) => {
                        let _span = span.entered();
                        let _ = sender.send(backend.embed(texts).map(|e| (e, start.elapsed())));
                    }
                    BackendCommand::Predict(pairs, span, sender) => {
                        let _span = span.entered();
                        let _ = sender.send(backend.predict(pairs).map(|p| (p, start.elapsed())));
                    }
                };
            }
        });
        Self(Some(handle))
    }
}

impl Drop for BackendThread {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            if handle.join().is_err() {
                tracing::error!("backend thread panicked");
            }
        }
    }
}

#[derive(Debug)]
enum BackendCommand {
    Health(Span, oneshot::Sender<Result<(), BackendError>>),
    Embed(
        Vec<String>,
        Span,
        #[allow(clippy::type_complexity)]
        oneshot::Sender<Result<(Vec<Embedding>, Duration), BackendError>>,
    ),
    Predict(
        Vec<(String, String)>,
        Span,
        #[allow(clippy::type_complexity)]
        oneshot::Sender<Result<(Vec<f32>, Duration), BackendError>>,
    ),
}
