// Command-line arguments

use clap::{Args, Parser, Subcommand};

use crate::error::StreamError;
use crate::models::StreamKey;

/// Edge Reader telemetry client
#[derive(Debug, Parser)]
#[command(name = "edge-reader")]
#[command(about = "Live equipment telemetry over WebSockets", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the stream URL for a key and exit
    Url(StreamArgs),

    /// Connect and log status, readings and stats until interrupted or closed
    Watch {
        #[command(flatten)]
        stream: StreamArgs,

        /// Keep the long dashboard history instead of the single-chart one
        #[arg(long)]
        dashboard: bool,
    },
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Equipment id (positive integer)
    pub equipment_id: u64,

    /// Comma-separated parameter names; omit for the server's default set
    #[arg(long, value_delimiter = ',')]
    pub keys: Vec<String>,

    /// Sample rate in Hz (defaults to stream.default_hz)
    #[arg(long)]
    pub hz: Option<f64>,
}

impl StreamArgs {
    pub fn stream_key(&self, default_hz: f64) -> Result<StreamKey, StreamError> {
        StreamKey::new(
            self.equipment_id,
            self.keys.iter().cloned(),
            self.hz.unwrap_or(default_hz),
        )
    }
}
