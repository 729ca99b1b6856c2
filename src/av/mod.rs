//! Adapter around the external ffmpeg transcoder.
//!
//! One invocation per ingested upload produces the asset's playlist and
//! its numbered media segments. Completion is the process exit; a failed
//! run is terminal for that ingestion attempt, with no retry.

pub mod cmd;

pub use cmd::{FfmpegHlsEncoder, HlsEncoder};

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::error;

/// Filename template ffmpeg expands into segment000.ts, segment001.ts, ...
const SEGMENT_TEMPLATE: &str = "segment%03d.ts";

#[derive(Debug)]
pub enum TranscodeError {
    /// The encoder process could not be started (missing binary, ...).
    Spawn(io::Error),
    /// The encoder ran but exited unsuccessfully.
    Failed { code: Option<i32>, stderr: String },
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeError::Spawn(e) => write!(f, "Failed to run ffmpeg: {}", e),
            TranscodeError::Failed { code, stderr } => match code {
                Some(code) => write!(f, "ffmpeg exited with status {}: {}", code, stderr),
                None => write!(f, "ffmpeg terminated by signal: {}", stderr),
            },
        }
    }
}

impl std::error::Error for TranscodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranscodeError::Spawn(e) => Some(e),
            TranscodeError::Failed { .. } => None,
        }
    }
}

/// Transcode `source` into the HLS rendition of `audio_id` inside
/// `output_dir`, returning the playlist path.
///
/// Playlist and segments appear together only on success; callers must
/// not register the asset on any other outcome.
pub async fn transcode_to_hls(
    encoder: &dyn HlsEncoder,
    source: &Path,
    output_dir: &Path,
    audio_id: &str,
) -> Result<PathBuf, TranscodeError> {
    let playlist = output_dir.join(format!("{}.m3u8", audio_id));
    let segments = output_dir.join(SEGMENT_TEMPLATE);

    let output = encoder
        .encode_hls(source, &segments, &playlist)
        .await
        .map_err(TranscodeError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        error!("Error during conversion: {}", stderr.trim());
        return Err(TranscodeError::Failed {
            code: output.status.code(),
            stderr,
        });
    }

    Ok(playlist)
}
