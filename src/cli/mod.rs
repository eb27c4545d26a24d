use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcriptor",
    about = "Layered Transcript - fetch YouTube transcripts through fallback extraction layers",
    version,
    long_about = concat!(
        "Acquires a video's transcript by trying embedded page state, observed caption ",
        "requests, the rendered transcript panel and the player endpoint in turn. When every ",
        "layer fails, page heuristics decide whether the transcript is genuinely unavailable."
    )
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file to use instead of the default location
    #[arg(short, long, global = true, value_name = "FILE", env = "LAYERED_TRANSCRIPT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the transcript of a video
    Fetch {
        /// Watch URL, short link, or 11-character video id
        #[arg(value_name = "VIDEO")]
        video: String,

        /// Read the watch page from a saved HTML file instead of fetching it
        #[arg(long, value_name = "FILE")]
        page: Option<PathBuf>,

        /// HAR capture of the page's network traffic, used to find caption requests
        #[arg(long, value_name = "FILE")]
        har: Option<PathBuf>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Include timestamps in text output (srt/vtt/xml always include timing)
        #[arg(long)]
        timestamps: bool,

        /// Preferred caption language; repeat to give several in order
        #[arg(short, long, value_name = "LANG")]
        lang: Vec<String>,
    },

    /// List the caption tracks the player endpoint advertises for a video
    Tracks {
        /// Watch URL, short link, or 11-character video id
        #[arg(value_name = "VIDEO")]
        video: String,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List extraction layers in the order they are tried
    Layers,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON transcript result
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
    /// Timed-text XML
    Xml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
            OutputFormat::Xml => write!(f, "xml"),
        }
    }
}
