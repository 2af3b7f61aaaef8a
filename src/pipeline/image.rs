use std::sync::Arc;

use tracing::{debug, info, warn};

use super::Ledger;
use crate::detect;
use crate::document::{Document, ImageCandidate};
use crate::ocr::OcrBridge;
use crate::settings::SettingsStore;
use crate::translate::{TranslationRequest, Translator};

/// Recognizes text inside image candidates and attaches a translated
/// overlay. The overlay anchors to the enclosing post when the document
/// still knows one, and sits adjacent to the image otherwise. Failures
/// release the claim but are not rescheduled; the next rescan picks the
/// candidate up again.
pub struct ImagePipeline {
    document: Arc<dyn Document>,
    translator: Arc<dyn Translator>,
    ocr: Arc<OcrBridge>,
    ledger: Arc<Ledger>,
    settings: SettingsStore,
}

impl ImagePipeline {
    pub fn new(
        document: Arc<dyn Document>,
        translator: Arc<dyn Translator>,
        ocr: Arc<OcrBridge>,
        ledger: Arc<Ledger>,
        settings: SettingsStore,
    ) -> Self {
        Self {
            document,
            translator,
            ocr,
            ledger,
            settings,
        }
    }

    pub async fn process(&self, candidate: ImageCandidate) {
        let settings = self.settings.snapshot().await;
        if !settings.translate.enabled {
            return;
        }

        if !self.ledger.begin(&candidate.handle).await {
            return;
        }

        let recognized = match self.ocr.recognize(&candidate.source).await {
            Ok(text) => text,
            Err(e) => {
                warn!("recognition failed for {}: {}", candidate.handle, e);
                self.ledger.revert(&candidate.handle).await;
                return;
            }
        };

        let recognized = recognized.trim();
        if recognized.is_empty() {
            debug!("no text recognized in {}", candidate.handle);
            self.ledger.skip(&candidate.handle).await;
            return;
        }

        if detect::is_target_language(recognized, &settings.translate.target_lang) {
            debug!(
                "{} already reads as {}",
                candidate.handle, settings.translate.target_lang
            );
            self.ledger.skip(&candidate.handle).await;
            return;
        }

        let request = TranslationRequest {
            text: recognized.to_string(),
            target_lang: settings.translate.target_lang.clone(),
            engine: settings.translate.engine,
            libre_url: settings.translate.libre_url.clone(),
        };

        let translation = match self.translator.translate(&request).await {
            Ok(translation) if !translation.text.is_empty() => translation,
            Ok(_) => {
                debug!("empty translation for image {}", candidate.handle);
                self.ledger.revert(&candidate.handle).await;
                return;
            }
            Err(e) => {
                warn!("translation failed for image {}: {}", candidate.handle, e);
                self.ledger.revert(&candidate.handle).await;
                return;
            }
        };

        let attach = match self.document.enclosing_post(&candidate.handle).await {
            Some(post) => self.document.attach_overlay(&post, &translation.text).await,
            None => {
                self.document
                    .attach_overlay_adjacent(&candidate.handle, &translation.text)
                    .await
            }
        };

        match attach {
            Ok(()) => {
                self.ledger.finish(&candidate.handle, None).await;
                info!(
                    "overlaid image {} via {}",
                    candidate.handle,
                    translation.engine.as_str()
                );
            }
            Err(e) => {
                warn!("failed to attach overlay for {}: {}", candidate.handle, e);
                self.ledger.revert(&candidate.handle).await;
            }
        }
    }
}
