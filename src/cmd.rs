use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Generate every stream of a configuration file, with one worker per output port. Frames
    /// are cut into 64-byte elements and pushed to a bounded transmit queue.
    Run {
        #[arg(
            short,
            long,
            help = "Stream configuration file (TOML, or JSON with a .json extension)"
        )]
        config: String,
        #[arg(
            short,
            long,
            default_value_t = 500,
            help = "Number of elements the transmit queue of a port can hold"
        )]
        queue_size: usize,
        #[arg(
            short,
            long,
            default_value_t = 5,
            help = "Seconds between two throughput reports"
        )]
        report_period: u64,
    },
    /// Describe the streams of a configuration file and dump their first frames
    Show {
        #[arg(
            short,
            long,
            help = "Stream configuration file (TOML, or JSON with a .json extension)"
        )]
        config: String,
        #[arg(
            short = 'n',
            long,
            default_value_t = 2,
            help = "Number of frames to dump per stream"
        )]
        frames: usize,
    },
}
