use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, TsujiError};

// Default values mirroring the persisted settings shape
fn default_enabled() -> bool {
    true
}

fn default_target_lang() -> String {
    "ja".to_string()
}

fn default_ocr_binary() -> String {
    "tesseract".to_string()
}

fn default_ocr_languages() -> String {
    "jpn+eng".to_string()
}

fn default_ready_poll_interval_ms() -> u64 {
    100
}

fn default_ready_poll_attempts() -> u32 {
    300
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Master switch; nothing is scanned or translated while false
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Which backend engine(s) to use and in what order
    #[serde(default)]
    pub engine: EngineMode,
    /// Language translated content should end up in
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    /// LibreTranslate endpoint; empty selects the well-known local address
    #[serde(default)]
    pub libre_url: String,
    /// Successful text translations so far (approximate, last write wins)
    #[serde(default)]
    pub translation_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EngineMode {
    /// Google web endpoint only, single attempt
    #[default]
    #[serde(rename = "google")]
    Google,
    /// LibreTranslate only, up to three attempts
    #[serde(rename = "libre")]
    Libre,
    /// Google first, LibreTranslate retry loop on any failure
    #[serde(rename = "google+libre")]
    GoogleWithFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Path to the tesseract binary
    #[serde(default = "default_ocr_binary")]
    pub binary_path: String,
    /// Recognition languages passed to tesseract (e.g. "jpn+eng")
    #[serde(default = "default_ocr_languages")]
    pub languages: String,
    /// Interval between worker readiness checks
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,
    /// Readiness checks before initialization is declared timed out
    #[serde(default = "default_ready_poll_attempts")]
    pub ready_poll_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Coalescing window for change notifications
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay before the unconditional startup rescan
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Delay before a failed text candidate is retried
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            translate: TranslateConfig::default(),
            ocr: OcrConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: EngineMode::Google,
            target_lang: "ja".to_string(),
            libre_url: String::new(),
            translation_count: 0,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary_path: "tesseract".to_string(),
            languages: "jpn+eng".to_string(),
            ready_poll_interval_ms: 100,
            ready_poll_attempts: 300,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            initial_delay_ms: 1000,
            retry_delay_ms: 2000,
        }
    }
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Google => "google",
            EngineMode::Libre => "libre",
            EngineMode::GoogleWithFallback => "google+libre",
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TsujiError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TsujiError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TsujiError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TsujiError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
