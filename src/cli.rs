use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a feed file and translate new content as it appears
    Watch {
        /// Feed file to watch
        #[arg(short, long)]
        feed: PathBuf,
    },

    /// Translate one piece of text and print the result
    Translate {
        /// Text to translate
        text: String,

        /// Target language code
        #[arg(short, long)]
        target: Option<String>,

        /// Engine selection: google, libre, or google+libre
        #[arg(short, long)]
        engine: Option<String>,
    },

    /// Report whether text already reads as the target language
    Detect {
        /// Text to inspect
        text: String,

        /// Target language code
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Recognize text in an image, optionally translating it
    Ocr {
        /// Image path or http(s) URL
        image: String,

        /// Translate the recognized text before printing
        #[arg(short, long)]
        translate: bool,
    },
}
