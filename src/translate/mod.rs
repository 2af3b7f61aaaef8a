// Modular translation architecture
//
// This module provides the engine-mode policy over two backend implementations:
// - Google: public web endpoint, single attempt
// - Libre: LibreTranslate endpoint, bounded sequential retry loop

pub mod google;
pub mod libre;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::EngineMode;
use crate::error::{Result, TsujiError};

pub use google::GoogleBackend;
pub use libre::{DEFAULT_LIBRE_URL, LibreBackend};

/// Attempts against LibreTranslate before the last error surfaces
const LIBRE_MAX_RETRIES: u32 = 3;

/// Which backend produced a translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Google,
    Libre,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Google => "google",
            Engine::Libre => "libre",
        }
    }
}

/// Everything one translation call needs, captured from settings at call time
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub target_lang: String,
    pub engine: EngineMode,
    pub libre_url: String,
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    pub engine: Engine,
}

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate text to the target language per the request's engine mode
    async fn translate(&self, request: &TranslationRequest) -> Result<Translation>;
}

/// A single backend engine behind the mode policy
#[async_trait]
pub trait Backend: Send + Sync {
    fn engine(&self) -> Engine;

    /// One translation attempt; retry and failover live in the policy above
    async fn translate(&self, request: &TranslationRequest) -> Result<String>;
}

/// Engine-mode policy over the two backends
pub struct TranslationService {
    primary: Box<dyn Backend>,
    secondary: Box<dyn Backend>,
}

impl TranslationService {
    pub fn new() -> Self {
        // No request timeout: individual backend calls are not time-bounded
        let client = Client::builder()
            .build()
            .expect("HTTP client creation should not fail");

        Self {
            primary: Box::new(GoogleBackend::new(client.clone())),
            secondary: Box::new(LibreBackend::new(client)),
        }
    }

    pub fn with_backends(primary: Box<dyn Backend>, secondary: Box<dyn Backend>) -> Self {
        Self { primary, secondary }
    }

    async fn attempt(&self, backend: &dyn Backend, request: &TranslationRequest) -> Result<Translation> {
        let text = backend.translate(request).await?;
        Ok(Translation {
            text,
            engine: backend.engine(),
        })
    }

    async fn secondary_with_retries(&self, request: &TranslationRequest) -> Result<Translation> {
        let mut last_error = TsujiError::Backend("no translation attempts were made".to_string());
        for attempt in 1..=LIBRE_MAX_RETRIES {
            match self.attempt(self.secondary.as_ref(), request).await {
                Ok(translation) => return Ok(translation),
                Err(e) => {
                    debug!("libre attempt {}/{} failed: {}", attempt, LIBRE_MAX_RETRIES, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

impl Default for TranslationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for TranslationService {
    async fn translate(&self, request: &TranslationRequest) -> Result<Translation> {
        match request.engine {
            EngineMode::Google => self.attempt(self.primary.as_ref(), request).await,
            EngineMode::Libre => self.secondary_with_retries(request).await,
            EngineMode::GoogleWithFallback => {
                match self.attempt(self.primary.as_ref(), request).await {
                    Ok(translation) => Ok(translation),
                    Err(e) => {
                        warn!("google translate failed, falling back to libre: {}", e);
                        self.secondary_with_retries(request).await
                    }
                }
            }
        }
    }
}
