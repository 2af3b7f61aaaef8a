use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::document::Document;
use crate::gateway::SessionState;
use crate::pipeline::{ImagePipeline, TextPipeline};
use crate::settings::SettingsStore;

/// Detail-page locations are the only places image candidates run
static DETAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/status/\d+").expect("detail pattern must compile"));

/// Debounces change notifications into rescans. Notification bursts within
/// the debounce window coalesce into a single rescan; an unconditional
/// startup rescan runs after the initial delay, concurrently with the
/// notification loop.
pub struct ScanScheduler {
    document: Arc<dyn Document>,
    text: Arc<TextPipeline>,
    image: Arc<ImagePipeline>,
    settings: SettingsStore,
    session: SessionState,
    debounce: Duration,
    initial_delay: Duration,
}

impl ScanScheduler {
    pub fn new(
        document: Arc<dyn Document>,
        text: Arc<TextPipeline>,
        image: Arc<ImagePipeline>,
        settings: SettingsStore,
        session: SessionState,
        config: &ScanConfig,
    ) -> Self {
        Self {
            document,
            text,
            image,
            settings,
            session,
            debounce: Duration::from_millis(config.debounce_ms),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }

    /// Drive rescans until the notification stream ends or the session is
    /// invalidated.
    pub async fn run(self: Arc<Self>, mut changes: mpsc::UnboundedReceiver<()>) {
        let startup = {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                tokio::time::sleep(scheduler.initial_delay).await;
                scheduler.rescan().await;
            })
        };

        while changes.recv().await.is_some() {
            // Absorb the rest of the burst until a debounce window passes
            // without a notification
            loop {
                match tokio::time::timeout(self.debounce, changes.recv()).await {
                    Ok(Some(())) => continue,
                    Ok(None) | Err(_) => break,
                }
            }

            if self.session.is_invalidated() {
                info!("session invalidated, stopping observation");
                break;
            }
            self.rescan().await;
        }

        let _ = startup.await;
        debug!("scan scheduler finished");
    }

    /// Enumerate candidates and hand each to its pipeline. Text candidates
    /// run everywhere; image candidates only on detail pages.
    pub async fn rescan(&self) {
        if self.session.is_invalidated() {
            return;
        }
        let settings = self.settings.snapshot().await;
        if !settings.translate.enabled {
            debug!("translation disabled, skipping rescan");
            return;
        }

        let location = self.document.location().await;
        let texts = self.document.text_candidates().await;
        debug!(
            "rescanning {} with {} text candidates",
            location,
            texts.len()
        );
        for candidate in texts {
            let pipeline = Arc::clone(&self.text);
            tokio::spawn(async move { pipeline.process(candidate).await });
        }

        if DETAIL_PATTERN.is_match(&location) {
            for candidate in self.document.image_candidates().await {
                let pipeline = Arc::clone(&self.image);
                tokio::spawn(async move { pipeline.process(candidate).await });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, OcrConfig};
    use crate::document::{ImageCandidate, NodeHandle, TextCandidate};
    use crate::error::Result;
    use crate::ocr::{OcrBridge, OcrEngine};
    use crate::pipeline::Ledger;
    use crate::translate::MockTranslator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScanStub {
        location: String,
        text_scans: AtomicU32,
        image_scans: AtomicU32,
    }

    impl ScanStub {
        fn at(location: &str) -> Arc<Self> {
            Arc::new(Self {
                location: location.to_string(),
                text_scans: AtomicU32::new(0),
                image_scans: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Document for ScanStub {
        async fn location(&self) -> String {
            self.location.clone()
        }

        async fn text_candidates(&self) -> Vec<TextCandidate> {
            self.text_scans.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }

        async fn image_candidates(&self) -> Vec<ImageCandidate> {
            self.image_scans.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }

        async fn text_of(&self, _handle: &NodeHandle) -> Option<String> {
            None
        }

        async fn replace_text(
            &self,
            _handle: &NodeHandle,
            _translated: &str,
            _original: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn enclosing_post(&self, _handle: &NodeHandle) -> Option<NodeHandle> {
            None
        }

        async fn attach_overlay(&self, _post: &NodeHandle, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn attach_overlay_adjacent(&self, _image: &NodeHandle, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    struct NullEngine;

    #[async_trait]
    impl OcrEngine for NullEngine {
        async fn prepare(&self) -> Result<()> {
            Ok(())
        }

        async fn recognize(&self, _source: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn scheduler(
        document: Arc<ScanStub>,
        config: Config,
        session: SessionState,
        scan: &ScanConfig,
    ) -> Arc<ScanScheduler> {
        let settings = SettingsStore::in_memory(config);
        let ledger = Arc::new(Ledger::new());
        let translator: Arc<dyn crate::translate::Translator> = Arc::new(MockTranslator::new());
        let document: Arc<dyn Document> = document;

        let text = Arc::new(TextPipeline::new(
            Arc::clone(&document),
            Arc::clone(&translator),
            Arc::clone(&ledger),
            settings.clone(),
            Duration::from_millis(scan.retry_delay_ms),
        ));
        let bridge = Arc::new(OcrBridge::new(
            Arc::new(NullEngine),
            &OcrConfig::default(),
        ));
        let image = Arc::new(ImagePipeline::new(
            Arc::clone(&document),
            translator,
            bridge,
            ledger,
            settings.clone(),
        ));

        Arc::new(ScanScheduler::new(
            document, text, image, settings, session, scan,
        ))
    }

    fn fast_scan() -> ScanConfig {
        ScanConfig {
            debounce_ms: 300,
            initial_delay_ms: 60_000,
            retry_delay_ms: 2000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_bursts_coalesce_into_one_rescan() {
        let document = ScanStub::at("/home");
        let scheduler = scheduler(
            Arc::clone(&document),
            Config::default(),
            SessionState::new(),
            &fast_scan(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Arc::clone(&scheduler).run(rx));

        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(document.text_scans.load(Ordering::SeqCst), 1);

        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(document.text_scans.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_rescan_runs_without_notifications() {
        let document = ScanStub::at("/home");
        let scan = ScanConfig {
            initial_delay_ms: 1000,
            ..fast_scan()
        };
        let scheduler = scheduler(
            Arc::clone(&document),
            Config::default(),
            SessionState::new(),
            &scan,
        );
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        tokio::spawn(Arc::clone(&scheduler).run(rx));

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(document.text_scans.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(document.text_scans.load(Ordering::SeqCst), 1);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_candidates_only_scan_on_detail_pages() {
        let timeline = ScanStub::at("/home");
        scheduler(
            Arc::clone(&timeline),
            Config::default(),
            SessionState::new(),
            &fast_scan(),
        )
        .rescan()
        .await;
        assert_eq!(timeline.text_scans.load(Ordering::SeqCst), 1);
        assert_eq!(timeline.image_scans.load(Ordering::SeqCst), 0);

        let detail = ScanStub::at("/status/12345");
        scheduler(
            Arc::clone(&detail),
            Config::default(),
            SessionState::new(),
            &fast_scan(),
        )
        .rescan()
        .await;
        assert_eq!(detail.text_scans.load(Ordering::SeqCst), 1);
        assert_eq!(detail.image_scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_translation_skips_rescans() {
        let document = ScanStub::at("/home");
        let mut config = Config::default();
        config.translate.enabled = false;
        scheduler(
            Arc::clone(&document),
            config,
            SessionState::new(),
            &fast_scan(),
        )
        .rescan()
        .await;
        assert_eq!(document.text_scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_session_stops_the_loop() {
        let document = ScanStub::at("/home");
        let session = SessionState::new();
        let scheduler = scheduler(
            Arc::clone(&document),
            Config::default(),
            session.clone(),
            &fast_scan(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Arc::clone(&scheduler).run(rx));

        session.invalidate();
        tx.send(()).unwrap();

        handle.await.unwrap();
        assert_eq!(document.text_scans.load(Ordering::SeqCst), 0);
    }
}
