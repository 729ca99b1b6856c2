use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Output;
use tokio::process::Command as TokioCommand;

/// Codec every upload is re-encoded to.
const AUDIO_CODEC: &str = "aac";
/// Fixed target bitrate; no negotiation.
const AUDIO_BITRATE: &str = "128k";
/// Target duration of one media segment, in seconds.
const SEGMENT_SECONDS: &str = "10";

/// Seam around the external encoder process producing the HLS rendition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HlsEncoder: Send + Sync {
    /// Run the encoder once for `source`, writing numbered segments per
    /// `segment_template` and the playlist to `playlist`. Resolves with
    /// the process output exactly once, when the process exits.
    async fn encode_hls(
        &self,
        source: &Path,
        segment_template: &Path,
        playlist: &Path,
    ) -> io::Result<Output>;
}

pub struct FfmpegHlsEncoder;

#[async_trait]
impl HlsEncoder for FfmpegHlsEncoder {
    async fn encode_hls(
        &self,
        source: &Path,
        segment_template: &Path,
        playlist: &Path,
    ) -> io::Result<Output> {
        TokioCommand::new("ffmpeg")
            .arg("-y")
            .arg("-i").arg(source)
            .arg("-vn")
            .arg("-codec:a").arg(AUDIO_CODEC)
            .arg("-b:a").arg(AUDIO_BITRATE)
            .arg("-hls_time").arg(SEGMENT_SECONDS)
            .arg("-hls_playlist_type").arg("vod")
            .arg("-hls_segment_filename").arg(segment_template)
            .arg(playlist)
            .output()
            .await
    }
}
