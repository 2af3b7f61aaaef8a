// Modular OCR architecture
//
// Recognition runs in an isolated worker task that can crash or restart
// without taking the rest of the process down. The bridge half lives with
// the pipelines: it assigns correlation ids, keeps a pending-reply registry,
// and matches worker results back to waiting callers. The worker half
// (worker.rs) lazily prepares a recognition engine (tesseract.rs) on the
// first request and answers every request by id.

pub mod tesseract;
pub mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::{Result, TsujiError};

pub use tesseract::TesseractEngine;

/// A recognition engine running behind the worker task
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// One-time setup. A failure answers the request that triggered it and
    /// is retried on the next request.
    async fn prepare(&self) -> Result<()>;

    /// Extract text from an image source (local path or http(s) URL)
    async fn recognize(&self, source: &str) -> Result<String>;
}

/// Messages flowing from the bridge into the worker
#[derive(Debug)]
pub enum WorkerBound {
    OcrRequest { id: u64, source: String },
}

/// Messages flowing from the worker back to the bridge
#[derive(Debug)]
pub enum BridgeBound {
    /// Announced exactly once when the worker loop starts
    OcrReady,
    OcrResult {
        id: u64,
        result: std::result::Result<String, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Worker-side channel ends, held until the one-time spawn
struct Channels {
    worker_rx: mpsc::UnboundedReceiver<WorkerBound>,
    bridge_tx: mpsc::UnboundedSender<BridgeBound>,
    bridge_rx: mpsc::UnboundedReceiver<BridgeBound>,
}

struct InitState {
    state: BridgeState,
    channels: Option<Channels>,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<String>>>>>;

/// Caller-side half of the recognition boundary.
///
/// `recognize` initializes the worker on first use; concurrent callers share
/// a single worker spawn and wait on the same readiness flag.
pub struct OcrBridge {
    engine: Arc<dyn OcrEngine>,
    to_worker: mpsc::UnboundedSender<WorkerBound>,
    pending: PendingMap,
    ready: Arc<AtomicBool>,
    next_id: AtomicU64,
    init: Mutex<InitState>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl OcrBridge {
    pub fn new(engine: Arc<dyn OcrEngine>, config: &OcrConfig) -> Self {
        let (to_worker, worker_rx) = mpsc::unbounded_channel();
        let (bridge_tx, bridge_rx) = mpsc::unbounded_channel();

        Self {
            engine,
            to_worker,
            pending: Arc::new(Mutex::new(HashMap::new())),
            ready: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            init: Mutex::new(InitState {
                state: BridgeState::Uninitialized,
                channels: Some(Channels {
                    worker_rx,
                    bridge_tx,
                    bridge_rx,
                }),
            }),
            poll_interval: Duration::from_millis(config.ready_poll_interval_ms),
            poll_attempts: config.ready_poll_attempts,
        }
    }

    /// Spawn the worker if nobody has yet, then wait for its readiness
    /// announcement. Safe to call from any number of tasks; only the first
    /// caller performs the spawn.
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut init = self.init.lock().await;
            match init.state {
                BridgeState::Ready => return Ok(()),
                BridgeState::Initializing => {}
                BridgeState::Uninitialized => {
                    if let Some(channels) = init.channels.take() {
                        worker::spawn(
                            Arc::clone(&self.engine),
                            channels.worker_rx,
                            channels.bridge_tx,
                        );
                        Self::spawn_pump(
                            channels.bridge_rx,
                            Arc::clone(&self.pending),
                            Arc::clone(&self.ready),
                        );
                    }
                    init.state = BridgeState::Initializing;
                }
            }
        }

        self.wait_until_ready().await
    }

    /// Request recognition of one image. Waits indefinitely for the worker's
    /// answer; there is no per-request timeout.
    pub async fn recognize(&self, source: &str) -> Result<String> {
        self.initialize().await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, reply_tx);

        let request = WorkerBound::OcrRequest {
            id,
            source: source.to_string(),
        };
        if self.to_worker.send(request).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(TsujiError::Ocr("recognition worker is gone".to_string()));
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(TsujiError::Ocr(
                "recognition worker dropped the request".to_string(),
            )),
        }
    }

    async fn wait_until_ready(&self) -> Result<()> {
        for _ in 0..self.poll_attempts {
            if self.ready.load(Ordering::SeqCst) {
                let mut init = self.init.lock().await;
                init.state = BridgeState::Ready;
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(TsujiError::OcrInitTimeout)
    }

    fn spawn_pump(
        mut from_worker: mpsc::UnboundedReceiver<BridgeBound>,
        pending: PendingMap,
        ready: Arc<AtomicBool>,
    ) {
        tokio::spawn(async move {
            while let Some(message) = from_worker.recv().await {
                match message {
                    BridgeBound::OcrReady => {
                        debug!("recognition worker announced ready");
                        ready.store(true, Ordering::SeqCst);
                    }
                    BridgeBound::OcrResult { id, result } => {
                        let reply = pending.lock().await.remove(&id);
                        match reply {
                            Some(slot) => {
                                let _ = slot.send(result.map_err(TsujiError::Ocr));
                            }
                            None => debug!("dropping recognition result with unmatched id {}", id),
                        }
                    }
                }
            }
        });
    }
}
