// Isolated recognition worker.
//
// Announces readiness once on startup, then serves requests forever. Engine
// preparation is lazy and naturally single-flight because this loop is the
// only consumer; individual recognitions run as spawned tasks so a slow
// image does not block the queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BridgeBound, OcrEngine, WorkerBound};

pub fn spawn(
    engine: Arc<dyn OcrEngine>,
    requests: mpsc::UnboundedReceiver<WorkerBound>,
    replies: mpsc::UnboundedSender<BridgeBound>,
) -> JoinHandle<()> {
    tokio::spawn(run(engine, requests, replies))
}

pub async fn run(
    engine: Arc<dyn OcrEngine>,
    mut requests: mpsc::UnboundedReceiver<WorkerBound>,
    replies: mpsc::UnboundedSender<BridgeBound>,
) {
    let _ = replies.send(BridgeBound::OcrReady);

    let mut prepared = false;
    while let Some(WorkerBound::OcrRequest { id, source }) = requests.recv().await {
        if !prepared {
            if let Err(e) = engine.prepare().await {
                warn!("recognition engine unavailable: {}", e);
                let _ = replies.send(BridgeBound::OcrResult {
                    id,
                    result: Err(e.to_string()),
                });
                continue;
            }
            prepared = true;
        }

        let engine = Arc::clone(&engine);
        let replies = replies.clone();
        tokio::spawn(async move {
            debug!("recognizing request {} from {}", id, source);
            let result = engine.recognize(&source).await.map_err(|e| e.to_string());
            let _ = replies.send(BridgeBound::OcrResult { id, result });
        });
    }

    debug!("recognition worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TsujiError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyEngine {
        prepare_calls: AtomicU32,
        failures_left: AtomicU32,
    }

    impl FlakyEngine {
        fn failing_once() -> Self {
            Self {
                prepare_calls: AtomicU32::new(0),
                failures_left: AtomicU32::new(1),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for FlakyEngine {
        async fn prepare(&self) -> Result<()> {
            self.prepare_calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(TsujiError::Ocr("engine missing".to_string()));
            }
            Ok(())
        }

        async fn recognize(&self, source: &str) -> Result<String> {
            Ok(format!("read {}", source))
        }
    }

    #[tokio::test]
    async fn test_ready_announced_then_failed_prepare_retried() {
        let engine = Arc::new(FlakyEngine::failing_once());
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        spawn(Arc::clone(&engine) as Arc<dyn OcrEngine>, request_rx, reply_tx);

        assert!(matches!(
            reply_rx.recv().await.unwrap(),
            BridgeBound::OcrReady
        ));

        // First request hits the failing prepare and gets an error back.
        request_tx
            .send(WorkerBound::OcrRequest {
                id: 1,
                source: "a.png".to_string(),
            })
            .unwrap();
        match reply_rx.recv().await.unwrap() {
            BridgeBound::OcrResult { id, result } => {
                assert_eq!(id, 1);
                assert!(result.is_err());
            }
            other => panic!("unexpected message: {:?}", other),
        }

        // Second request triggers a fresh prepare that now succeeds.
        request_tx
            .send(WorkerBound::OcrRequest {
                id: 2,
                source: "b.png".to_string(),
            })
            .unwrap();
        match reply_rx.recv().await.unwrap() {
            BridgeBound::OcrResult { id, result } => {
                assert_eq!(id, 2);
                assert_eq!(result.unwrap(), "read b.png");
            }
            other => panic!("unexpected message: {:?}", other),
        }

        assert_eq!(engine.prepare_calls.load(Ordering::SeqCst), 2);
    }
}
