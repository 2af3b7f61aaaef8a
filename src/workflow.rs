use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::document::Document;
use crate::error::Result;
use crate::feed::{self, FeedDocument};
use crate::gateway::TranslatorGateway;
use crate::ocr::{OcrBridge, TesseractEngine};
use crate::pipeline::{ImagePipeline, Ledger, TextPipeline};
use crate::scan::ScanScheduler;
use crate::settings::{self, SettingsStore};
use crate::translate::{TranslationService, Translator};

/// Wires the feed document, translation gateway, OCR bridge, and pipelines
/// together and drives them from file change notifications.
pub struct Workflow {
    document: Arc<FeedDocument>,
    scheduler: Arc<ScanScheduler>,
    settings: SettingsStore,
}

impl Workflow {
    pub async fn new<P: AsRef<Path>>(feed_path: P, settings: SettingsStore) -> Result<Self> {
        let config = settings.snapshot().await;
        let document = Arc::new(FeedDocument::open(feed_path)?);

        let service = Arc::new(TranslationService::new()) as Arc<dyn Translator>;
        let (gateway, _gateway_task) = TranslatorGateway::spawn(service);
        let session = gateway.session();
        let translator = Arc::new(gateway) as Arc<dyn Translator>;

        let engine = Arc::new(TesseractEngine::new(&config.ocr));
        let ocr = Arc::new(OcrBridge::new(engine, &config.ocr));

        let ledger = Arc::new(Ledger::new());
        let doc = Arc::clone(&document) as Arc<dyn Document>;

        let text = Arc::new(TextPipeline::new(
            Arc::clone(&doc),
            Arc::clone(&translator),
            Arc::clone(&ledger),
            settings.clone(),
            Duration::from_millis(config.scan.retry_delay_ms),
        ));
        let image = Arc::new(ImagePipeline::new(
            Arc::clone(&doc),
            translator,
            ocr,
            ledger,
            settings.clone(),
        ));

        let scheduler = Arc::new(ScanScheduler::new(
            doc,
            text,
            image,
            settings.clone(),
            session,
            &config.scan,
        ));

        Ok(Self {
            document,
            scheduler,
            settings,
        })
    }

    /// Watch the feed and settings files and translate until the change
    /// stream ends or an interrupt arrives.
    pub async fn run(&self) -> Result<()> {
        let (_feed_watcher, mut feed_changes) = feed::watch(Arc::clone(&self.document))?;

        // Merge settings edits into the same change stream; a toggle or an
        // engine switch triggers a rescan just like new content does
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let feed_tx = changes_tx.clone();
        tokio::spawn(async move {
            while feed_changes.recv().await.is_some() {
                if feed_tx.send(()).is_err() {
                    break;
                }
            }
        });

        let _settings_watcher = match settings::watch(self.settings.clone()) {
            Ok((watcher, mut settings_changes)) => {
                let settings_tx = changes_tx.clone();
                tokio::spawn(async move {
                    while settings_changes.recv().await.is_some() {
                        if settings_tx.send(()).is_err() {
                            break;
                        }
                    }
                });
                Some(watcher)
            }
            Err(e) => {
                warn!("settings file is not watched: {}", e);
                None
            }
        };
        drop(changes_tx);

        info!("Watching feed file: {}", self.document.path().display());

        tokio::select! {
            _ = Arc::clone(&self.scheduler).run(changes_rx) => {
                info!("Change stream ended, shutting down");
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupt received, shutting down");
            }
        }

        Ok(())
    }
}
