//! Tsuji - Live Feed Translation Daemon
//!
//! A Rust implementation of a live-document translation workflow: watch a
//! feed file for new posts, translate text in place through the Google web
//! endpoint or a LibreTranslate server, and overlay translations of text
//! recognized inside images via tesseract.

pub mod cli;
pub mod config;
pub mod detect;
pub mod document;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod ocr;
pub mod pipeline;
pub mod scan;
pub mod settings;
pub mod translate;
pub mod workflow;
