use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, TsujiError};
use crate::translate::{Translation, TranslationRequest, Translator};

/// Latched liveness of the messaging session; once invalidated it stays so
/// until an external restart
#[derive(Clone, Default)]
pub struct SessionState {
    invalidated: Arc<AtomicBool>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }
}

struct GatewayJob {
    request: TranslationRequest,
    reply: oneshot::Sender<Result<Translation>>,
}

/// Channel front end the candidate pipelines talk to. The translation
/// service runs in its own task; a dropped reply is a transient failure,
/// a dead service task invalidates the whole session.
#[derive(Clone)]
pub struct TranslatorGateway {
    jobs: mpsc::UnboundedSender<GatewayJob>,
    session: SessionState,
}

impl TranslatorGateway {
    pub fn spawn(service: Arc<dyn Translator>) -> (Self, JoinHandle<()>) {
        let (jobs, mut job_rx) = mpsc::unbounded_channel::<GatewayJob>();
        let session = SessionState::new();

        let task = tokio::spawn(async move {
            while let Some(job) = job_rx.recv().await {
                let service = Arc::clone(&service);
                // Jobs run concurrently; a rescan burst queues many at once
                tokio::spawn(async move {
                    let result = service.translate(&job.request).await;
                    let _ = job.reply.send(result);
                });
            }
            debug!("translation gateway task finished");
        });

        (Self { jobs, session }, task)
    }

    pub fn session(&self) -> SessionState {
        self.session.clone()
    }
}

#[async_trait]
impl Translator for TranslatorGateway {
    async fn translate(&self, request: &TranslationRequest) -> Result<Translation> {
        if self.session.is_invalidated() {
            return Err(TsujiError::ContextInvalidated);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let job = GatewayJob {
            request: request.clone(),
            reply: reply_tx,
        };
        if self.jobs.send(job).is_err() {
            self.session.invalidate();
            warn!("translation gateway is gone, messaging disabled for this session");
            return Err(TsujiError::ContextInvalidated);
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => {
                debug!("translation reply dropped before a response arrived");
                Err(TsujiError::ChannelClosed)
            }
        }
    }
}
