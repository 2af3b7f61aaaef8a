use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TsujiError};
use super::{Backend, Engine, TranslationRequest};

const GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

// The public web endpoint rejects clients without a browser user agent
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Google web translation endpoint, queried the way the translate widget does
pub struct GoogleBackend {
    client: Client,
}

impl GoogleBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Backend for GoogleBackend {
    fn engine(&self) -> Engine {
        Engine::Google
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        debug!("google translate request for {} chars", request.text.chars().count());

        let response = self
            .client
            .get(GOOGLE_ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", request.target_lang.as_str()),
                ("dt", "t"),
                ("q", request.text.as_str()),
            ])
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TsujiError::Backend(format!(
                "google translate returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        concatenate_segments(&body)
    }
}

/// The body is a nested array; element 0 lists segments whose first field
/// holds the translated piece. Null or malformed segments are skipped.
pub fn concatenate_segments(body: &Value) -> Result<String> {
    let segments = body.get(0).and_then(|v| v.as_array()).ok_or_else(|| {
        TsujiError::Backend("unexpected google translate response shape".to_string())
    })?;

    let mut translated = String::new();
    for segment in segments {
        if let Some(piece) = segment.get(0).and_then(|v| v.as_str()) {
            translated.push_str(piece);
        }
    }

    Ok(translated)
}
