use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TsujiError};
use super::{Backend, Engine, TranslationRequest};

/// Used when the configured endpoint is empty
pub const DEFAULT_LIBRE_URL: &str = "http://localhost:5000/translate";

#[derive(Debug, Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// LibreTranslate-compatible endpoint, self-hosted by default
pub struct LibreBackend {
    client: Client,
}

impl LibreBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Backend for LibreBackend {
    fn engine(&self) -> Engine {
        Engine::Libre
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        let url = if request.libre_url.is_empty() {
            DEFAULT_LIBRE_URL
        } else {
            request.libre_url.as_str()
        };
        debug!("libre translate request to {}", url);

        let response = self
            .client
            .post(url)
            .json(&LibreRequest {
                q: &request.text,
                source: "auto",
                target: &request.target_lang,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TsujiError::Backend(format!(
                "libre translate returned status {}",
                response.status()
            )));
        }

        let body: LibreResponse = response.json().await?;
        if body.translated_text.is_empty() {
            return Err(TsujiError::Backend(
                "libre translate returned an empty translation".to_string(),
            ));
        }

        Ok(body.translated_text)
    }
}
