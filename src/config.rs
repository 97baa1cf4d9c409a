use clap::Parser;
use std::path::PathBuf;

/// Real-time guitar effects chain with a terminal control surface.
#[derive(Parser, Debug, Clone)]
#[command(name = "rusttuiamp", version, about)]
pub struct Args {
    /// Impulse response (WAV) for the cabinet stage
    #[arg(long)]
    pub ir: Option<PathBuf>,

    /// Neural amp model (.nam) to inspect
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// WAV file to start playing immediately
    #[arg(long)]
    pub play: Option<PathBuf>,

    /// Frames per processing block
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(32..=16384))]
    pub block_size: u32,

    /// Output volume applied after the impulse response (0.0 - 2.0)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, default_value = "rusttuiamp.log")]
    pub log_file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["rusttuiamp"]);
        assert_eq!(args.block_size, 1024);
        assert_eq!(args.volume, 1.0);
        assert!(args.ir.is_none());
        assert_eq!(args.log_file, PathBuf::from("rusttuiamp.log"));
    }

    #[test]
    fn rejects_tiny_blocks() {
        assert!(Args::try_parse_from(["rusttuiamp", "--block-size", "4"]).is_err());
    }

    #[test]
    fn reads_paths() {
        let args = Args::parse_from(["rusttuiamp", "--ir", "cab.wav", "--play", "riff.wav", "--volume", "1.5"]);
        assert_eq!(args.ir, Some(PathBuf::from("cab.wav")));
        assert_eq!(args.play, Some(PathBuf::from("riff.wav")));
        assert_eq!(args.volume, 1.5);
    }
}
