use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "storyreel",
    about = "Story-to-video CLI: turn a text prompt into a short film via AI-generated frames and FFmpeg",
    version,
    after_help = "\x1b[1mExamples:\x1b[0m
  storyreel generate \"a fox crossing a frozen lake\" --duration 10
  storyreel generate \"neon city at night\" --duration 30 --fps 24 --json
  storyreel generate \"storm over the sea\" -d 15 -o ./out
  storyreel doctor                 Check FFmpeg and service availability"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a video from a story prompt
    #[command(alias = "gen")]
    Generate {
        /// The story concept driving every frame
        prompt: String,

        /// Video length in seconds
        #[arg(long, short = 'd')]
        duration: u32,

        /// Frames per second (overrides config)
        #[arg(long)]
        fps: Option<u32>,

        /// Output directory for the finished video (overrides config)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Config file path (default: ./storyreel.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Frames per batch (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Retry attempts per image fetch (overrides config)
        #[arg(long)]
        retries: Option<u32>,

        /// Emit progress as JSON event lines instead of human-readable output
        #[arg(long)]
        json: bool,
    },
    /// Check that FFmpeg and the remote services are reachable
    Doctor,
}
