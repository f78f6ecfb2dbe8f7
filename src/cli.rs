use std::path::PathBuf;

use clap::Parser;

use crate::error::ConfigError;

#[derive(Debug, Parser)]
#[command(
    name = "honeyplot",
    version,
    about = "Renders honeypot connection logs onto a Hilbert-curve heat map, one frame per time bin."
)]
pub struct Opt {
    /// Diagnostic verbosity, 0 (quiet) through 9 (trace).
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub debug: u8,

    /// Bin duration, `N` followed by `s`, `m`, or `h`.
    #[arg(short, long, default_value = "1m")]
    pub period: String,

    /// Hilbert curve order (grid side length is `2^order`).
    #[arg(long, default_value_t = 12)]
    pub order: u8,

    /// Output directory for frames and the composited video.
    #[arg(short, long, default_value = "./honeyplot-out")]
    pub output: PathBuf,

    /// Skip the ffmpeg encoding step; leave PPM frames in place.
    #[arg(short = 'V', long = "no-video")]
    pub no_video: bool,

    /// Frames per second for the composited video. Overrides auto-scale.
    #[arg(short, long)]
    pub fps: Option<u32>,

    /// Video codec name, validated against the encoder whitelist.
    #[arg(short, long, default_value = "libx264")]
    pub codec: String,

    /// Path to a CIDR band table; omit to use direct mapping only.
    #[arg(short = 'C', long = "cidr-map")]
    pub cidr_map: Option<PathBuf>,

    /// Target video duration in seconds (10-3600), used by auto-scale.
    #[arg(short = 'D', long, default_value_t = 300)]
    pub duration: u32,

    /// Render a timestamp strip at the bottom of each frame.
    #[arg(short, long)]
    pub timestamp: bool,

    /// Rendered image width in pixels.
    #[arg(long, default_value_t = 3440)]
    pub width: u32,

    /// Rendered image height in pixels.
    #[arg(long, default_value_t = 1440)]
    pub height: u32,

    /// Honeypot connection log files (optionally gzip-compressed).
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

/// Parses `period` into seconds. Accepts `N`, `Ns`, `Nm`, `Nh`.
pub fn parse_period_seconds(period: &str) -> Result<u32, ConfigError> {
    let (digits, unit) = match period.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => (&period[..idx], &period[idx..]),
        None => (period, ""),
    };
    let n: u32 = digits
        .parse()
        .map_err(|_| ConfigError::InvalidPeriod(period.to_string()))?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(ConfigError::InvalidPeriod(period.to_string())),
    };
    if n == 0 {
        return Err(ConfigError::InvalidPeriod(period.to_string()));
    }
    Ok(n * multiplier)
}
