use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::Ledger;
use crate::detect;
use crate::document::{Document, TextCandidate};
use crate::settings::SettingsStore;
use crate::translate::{TranslationRequest, Translator};

/// Translates text candidates in place. Each candidate is claimed through
/// the ledger before any backend call, and a failed attempt is retried
/// after a delay for as long as it keeps failing.
pub struct TextPipeline {
    document: Arc<dyn Document>,
    translator: Arc<dyn Translator>,
    ledger: Arc<Ledger>,
    settings: SettingsStore,
    retry_delay: Duration,
}

impl TextPipeline {
    pub fn new(
        document: Arc<dyn Document>,
        translator: Arc<dyn Translator>,
        ledger: Arc<Ledger>,
        settings: SettingsStore,
        retry_delay: Duration,
    ) -> Self {
        Self {
            document,
            translator,
            ledger,
            settings,
            retry_delay,
        }
    }

    pub async fn process(self: Arc<Self>, candidate: TextCandidate) {
        let settings = self.settings.snapshot().await;
        if !settings.translate.enabled {
            return;
        }

        if !self.ledger.begin(&candidate.handle).await {
            return;
        }

        // Re-read the live text; the enumerated snapshot may be stale
        let Some(text) = self.document.text_of(&candidate.handle).await else {
            self.ledger.revert(&candidate.handle).await;
            return;
        };

        if text.trim().is_empty() {
            self.ledger.skip(&candidate.handle).await;
            return;
        }

        if detect::is_target_language(&text, &settings.translate.target_lang) {
            debug!(
                "{} already reads as {}",
                candidate.handle, settings.translate.target_lang
            );
            self.ledger.skip(&candidate.handle).await;
            return;
        }

        let request = TranslationRequest {
            text: text.clone(),
            target_lang: settings.translate.target_lang.clone(),
            engine: settings.translate.engine,
            libre_url: settings.translate.libre_url.clone(),
        };

        match self.translator.translate(&request).await {
            Ok(translation) if !translation.text.is_empty() => {
                if let Err(e) = self
                    .document
                    .replace_text(&candidate.handle, &translation.text, &text)
                    .await
                {
                    warn!("failed to apply translation to {}: {}", candidate.handle, e);
                    self.ledger.revert(&candidate.handle).await;
                    self.schedule_retry(candidate);
                    return;
                }
                self.ledger.finish(&candidate.handle, Some(text)).await;
                let count = self.settings.increment_translation_count().await;
                info!(
                    "translated {} via {} ({} total)",
                    candidate.handle,
                    translation.engine.as_str(),
                    count
                );
            }
            Ok(_) => {
                debug!("empty translation for {}, retrying later", candidate.handle);
                self.ledger.revert(&candidate.handle).await;
                self.schedule_retry(candidate);
            }
            Err(e) => {
                warn!("translation failed for {}: {}", candidate.handle, e);
                self.ledger.revert(&candidate.handle).await;
                self.schedule_retry(candidate);
            }
        }
    }

    /// Queue another attempt after the retry delay. The retried attempt
    /// re-checks the settings, so disabling translation stops the chain.
    fn schedule_retry(self: Arc<Self>, candidate: TextCandidate) {
        tokio::spawn(async move {
            tokio::time::sleep(self.retry_delay).await;
            self.process(candidate).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::NodeHandle;
    use crate::error::TsujiError;
    use crate::feed::{Feed, FeedDocument};
    use crate::pipeline::CandidateState;
    use crate::translate::{MockTranslator, Translation};
    use assert_fs::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FIXTURE: &str = r#"{
        "path": "/home",
        "posts": [
            {"id": "100", "text": "Hello world"},
            {"id": "101", "text": "こんにちは世界"},
            {"id": "102", "text": "   "}
        ]
    }"#;

    fn fixture_file() -> assert_fs::NamedTempFile {
        let file = assert_fs::NamedTempFile::new("feed.json").unwrap();
        file.write_str(FIXTURE).unwrap();
        file
    }

    fn candidate(handle: &str, text: &str) -> TextCandidate {
        TextCandidate {
            handle: NodeHandle::new(handle),
            text: text.to_string(),
        }
    }

    fn pipeline(
        document: Arc<FeedDocument>,
        translator: MockTranslator,
        settings: SettingsStore,
    ) -> Arc<TextPipeline> {
        Arc::new(TextPipeline::new(
            document,
            Arc::new(translator),
            Arc::new(Ledger::new()),
            settings,
            Duration::from_millis(2000),
        ))
    }

    #[tokio::test]
    async fn test_translates_replaces_and_counts() {
        let file = fixture_file();
        let document = Arc::new(FeedDocument::open(file.path()).unwrap());
        let settings = SettingsStore::in_memory(Config::default());

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .withf(|request| request.text == "Hello world" && request.target_lang == "ja")
            .times(1)
            .returning(|_| {
                Ok(Translation {
                    text: "こんにちは世界".to_string(),
                    engine: crate::translate::Engine::Google,
                })
            });

        let pipeline = pipeline(Arc::clone(&document), translator, settings.clone());
        Arc::clone(&pipeline)
            .process(candidate("100/text", "Hello world"))
            .await;

        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("100/text")).await,
            CandidateState::Translated
        );
        assert_eq!(
            document.text_of(&NodeHandle::new("100/text")).await.unwrap(),
            "こんにちは世界"
        );
        assert_eq!(settings.snapshot().await.translate.translation_count, 1);

        let on_disk: Feed =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(on_disk.posts[0].original_text.as_deref(), Some("Hello world"));
    }

    #[tokio::test]
    async fn test_target_language_and_empty_candidates_are_skipped() {
        let file = fixture_file();
        let document = Arc::new(FeedDocument::open(file.path()).unwrap());
        let settings = SettingsStore::in_memory(Config::default());

        // No expectations: any backend call would panic the test
        let translator = MockTranslator::new();
        let pipeline = pipeline(document, translator, settings);

        Arc::clone(&pipeline)
            .process(candidate("101/text", "こんにちは世界"))
            .await;
        Arc::clone(&pipeline)
            .process(candidate("102/text", "   "))
            .await;

        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("101/text")).await,
            CandidateState::Skip
        );
        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("102/text")).await,
            CandidateState::Skip
        );
    }

    #[tokio::test]
    async fn test_concurrent_processing_claims_once() {
        let file = fixture_file();
        let document = Arc::new(FeedDocument::open(file.path()).unwrap());
        let settings = SettingsStore::in_memory(Config::default());

        let mut translator = MockTranslator::new();
        translator.expect_translate().times(1).returning(|_| {
            Ok(Translation {
                text: "翻訳".to_string(),
                engine: crate::translate::Engine::Google,
            })
        });

        let pipeline = pipeline(document, translator, settings);
        tokio::join!(
            Arc::clone(&pipeline).process(candidate("100/text", "Hello world")),
            Arc::clone(&pipeline).process(candidate("100/text", "Hello world"))
        );

        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("100/text")).await,
            CandidateState::Translated
        );
    }

    #[tokio::test]
    async fn test_disabled_translation_processes_nothing() {
        let file = fixture_file();
        let document = Arc::new(FeedDocument::open(file.path()).unwrap());
        let mut config = Config::default();
        config.translate.enabled = false;
        let settings = SettingsStore::in_memory(config);

        let translator = MockTranslator::new();
        let pipeline = pipeline(document, translator, settings);

        Arc::clone(&pipeline)
            .process(candidate("100/text", "Hello world"))
            .await;
        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("100/text")).await,
            CandidateState::Untranslated
        );
    }

    #[tokio::test]
    async fn test_vanished_candidate_releases_the_claim() {
        let file = fixture_file();
        let document = Arc::new(FeedDocument::open(file.path()).unwrap());
        let settings = SettingsStore::in_memory(Config::default());

        let translator = MockTranslator::new();
        let pipeline = pipeline(document, translator, settings);

        Arc::clone(&pipeline)
            .process(candidate("999/text", "gone"))
            .await;
        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("999/text")).await,
            CandidateState::Untranslated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_retries_after_delay_until_success() {
        let file = fixture_file();
        let document = Arc::new(FeedDocument::open(file.path()).unwrap());
        let settings = SettingsStore::in_memory(Config::default());

        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let mut translator = MockTranslator::new();
        translator.expect_translate().times(2).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TsujiError::Backend("backend down".to_string()))
            } else {
                Ok(Translation {
                    text: "こんにちは世界".to_string(),
                    engine: crate::translate::Engine::Google,
                })
            }
        });

        let pipeline = pipeline(Arc::clone(&document), translator, settings);
        Arc::clone(&pipeline)
            .process(candidate("100/text", "Hello world"))
            .await;
        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("100/text")).await,
            CandidateState::Untranslated
        );

        // Let the scheduled retry fire
        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("100/text")).await,
            CandidateState::Translated
        );
        assert_eq!(
            document.text_of(&NodeHandle::new("100/text")).await.unwrap(),
            "こんにちは世界"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_honors_a_mid_flight_disable() {
        let file = fixture_file();
        let document = Arc::new(FeedDocument::open(file.path()).unwrap());
        let settings = SettingsStore::in_memory(Config::default());

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .times(1)
            .returning(|_| Err(TsujiError::Backend("backend down".to_string())));

        let pipeline = pipeline(document, translator, settings.clone());
        Arc::clone(&pipeline)
            .process(candidate("100/text", "Hello world"))
            .await;

        let mut config = settings.snapshot().await;
        config.translate.enabled = false;
        settings.apply(config).await;

        // The retry fires but finds translation disabled and does nothing
        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(
            pipeline.ledger.state_of(&NodeHandle::new("100/text")).await,
            CandidateState::Untranslated
        );
    }
}
