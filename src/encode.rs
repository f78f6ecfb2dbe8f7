//! Invokes the external video encoder over the emitted frame sequence.
//! Built on `std::process::Command` with an explicit argv — never a shell —
//! grounded on the original encoder invocation's fork/execvp shape.

use std::path::Path;
use std::process::Command;

use thiserror::Error;

pub const ALLOWED_CODECS: &[&str] = &[
    "libx264", "libx265", "libvpx", "libvpx-vp9", "h264", "hevc", "vp8", "vp9",
];

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("codec '{0}' is not in the allowed list {ALLOWED_CODECS:?}")]
    DisallowedCodec(String),
    #[error("failed to launch ffmpeg: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("ffmpeg exited with status {0}")]
    NonZeroExit(std::process::ExitStatus),
}

/// Invokes `ffmpeg` over `<frame_dir>/frame_*.ppm`, writing `output_path`.
/// Returns `Ok(())` only on a zero exit status; the caller deletes frames
/// on success and leaves them in place otherwise.
pub fn invoke_ffmpeg(
    frame_dir: &Path,
    codec: &str,
    fps: u32,
    output_path: &Path,
) -> Result<(), EncodeError> {
    if !ALLOWED_CODECS.contains(&codec) {
        return Err(EncodeError::DisallowedCodec(codec.to_string()));
    }

    let glob = frame_dir.join("frame_*.ppm");
    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-framerate")
        .arg(fps.to_string())
        .arg("-pattern_type")
        .arg("glob")
        .arg("-i")
        .arg(&glob)
        .arg("-c:v")
        .arg(codec)
        .arg("-preset")
        .arg("medium")
        .arg("-crf")
        .arg("23")
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg(output_path)
        .status()
        .map_err(EncodeError::Spawn)?;

    if status.success() {
        Ok(())
    } else {
        Err(EncodeError::NonZeroExit(status))
    }
}
