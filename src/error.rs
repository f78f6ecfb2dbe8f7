use thiserror::Error;

use crate::encode::EncodeError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("curve order {0} out of range (must be 4-16)")]
    InvalidOrder(u8),

    #[error("invalid period '{0}': expected N followed by s, m, or h")]
    InvalidPeriod(String),

    #[error("codec '{0}' is not in the allowed list")]
    DisallowedCodec(String),

    #[error("duration {0}s out of range (must be 10-3600)")]
    InvalidDuration(u32),

    #[error("no input files given")]
    NoInputs,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read input file {path}: {source}")]
    ReadInput {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render frame {path}: {source}")]
    RenderFrame {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum HoneyplotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Logged as a warning when the CIDR table fails to load; this is not
/// fatal, the driver falls back to direct mapping.
pub fn warn_cidr_table_unavailable(path: &std::path::Path, source: &std::io::Error) {
    log::warn!(
        "cidr table {} could not be loaded ({source}); falling back to direct mapping",
        path.display()
    );
}
