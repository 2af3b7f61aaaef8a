//! Tsuji - Live Feed Translation Daemon
//!
//! This is the main entry point for the tsuji application, which watches a
//! live feed file and translates new posts in place using the Google web
//! endpoint or a LibreTranslate server, with tesseract OCR for image text.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use tsuji::cli::{Args, Commands};
use tsuji::config::EngineMode;
use tsuji::detect;
use tsuji::error::TsujiError;
use tsuji::ocr::{OcrEngine, TesseractEngine};
use tsuji::settings::SettingsStore;
use tsuji::translate::{TranslationRequest, TranslationService, Translator};
use tsuji::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    info!("Starting Tsuji - Live Feed Translation Daemon");

    // Load settings
    let settings = match &args.config {
        Some(config_path) => SettingsStore::load(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
            }
            SettingsStore::load("config.toml")?
        }
    };

    // Execute command
    match args.command {
        Commands::Watch { feed } => {
            let workflow = Workflow::new(&feed, settings).await?;
            workflow.run().await?;
        }
        Commands::Translate {
            text,
            target,
            engine,
        } => {
            let mut config = settings.snapshot().await;
            if let Some(engine) = engine {
                config.translate.engine = parse_engine_mode(&engine)?;
            }
            if let Some(target) = target {
                config.translate.target_lang = target;
            }

            let request = TranslationRequest {
                text,
                target_lang: config.translate.target_lang,
                engine: config.translate.engine,
                libre_url: config.translate.libre_url,
            };
            let translation = TranslationService::new().translate(&request).await?;
            println!("{}", translation.text);
        }
        Commands::Detect { text, target } => {
            let config = settings.snapshot().await;
            let target = target.unwrap_or(config.translate.target_lang);

            if detect::is_target_language(&text, &target) {
                println!("already in target language '{}'", target);
            } else {
                println!("needs translation to '{}'", target);
            }
        }
        Commands::Ocr { image, translate } => {
            let config = settings.snapshot().await;
            let engine = TesseractEngine::new(&config.ocr);
            engine.prepare().await?;

            let recognized = engine.recognize(&image).await?;
            if recognized.is_empty() {
                println!("No text recognized.");
            } else if translate
                && !detect::is_target_language(&recognized, &config.translate.target_lang)
            {
                let request = TranslationRequest {
                    text: recognized,
                    target_lang: config.translate.target_lang,
                    engine: config.translate.engine,
                    libre_url: config.translate.libre_url,
                };
                let translation = TranslationService::new().translate(&request).await?;
                println!("{}", translation.text);
            } else {
                println!("{}", recognized);
            }
        }
    }

    info!("Tsuji finished successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let tsuji_dir = std::env::current_dir()?.join(".tsuji");
    let log_dir = tsuji_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "tsuji.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("tsuji.log").display()
    );

    Ok(())
}

/// Parse engine mode from string
fn parse_engine_mode(mode: &str) -> Result<EngineMode> {
    match mode.to_lowercase().as_str() {
        "google" => Ok(EngineMode::Google),
        "libre" => Ok(EngineMode::Libre),
        "google+libre" => Ok(EngineMode::GoogleWithFallback),
        _ => Err(TsujiError::Config(format!(
            "Invalid engine '{}'. Valid engines: google, libre, google+libre",
            mode
        ))
        .into()),
    }
}
