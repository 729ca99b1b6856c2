//! Upload ingestion pipeline.
//!
//! One upload moves through: staged on disk, asset directory created,
//! transcoded, source deleted and counter registered. A failed transcode
//! is terminal for the attempt; the staged source and any partial output
//! directory are left in place.

use crate::av::{self, HlsEncoder, TranscodeError};
use crate::store::{AssetStore, StatsStore};
use axum::body::Bytes;
use axum::BoxError;
use futures::{Stream, TryStreamExt};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;
use tracing::{info, warn};

#[derive(Debug)]
pub enum IngestError {
    Io(io::Error),
    Transcode(TranscodeError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Io(e) => write!(f, "I/O error: {}", e),
            IngestError::Transcode(e) => write!(f, "Transcoding failed: {}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Io(e) => Some(e),
            IngestError::Transcode(e) => Some(e),
        }
    }
}

impl From<io::Error> for IngestError {
    fn from(err: io::Error) -> Self {
        IngestError::Io(err)
    }
}

impl From<TranscodeError> for IngestError {
    fn from(err: TranscodeError) -> Self {
        IngestError::Transcode(err)
    }
}

/// Derive an asset id from the upload's arrival time.
///
/// Millisecond resolution; two uploads landing in the same millisecond
/// collide. Accepted limitation.
pub fn allocate_asset_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
        .to_string()
}

// Save a `Stream` to a file
pub async fn stream_to_file<S, E>(path: &PathBuf, stream: S) -> io::Result<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;

    Ok(())
}

/// Drive one upload through transcoding to a registered, servable asset.
pub async fn ingest_upload<S, E>(
    assets: &AssetStore,
    stats: &StatsStore,
    encoder: &dyn HlsEncoder,
    audio_id: &str,
    extension: Option<&str>,
    stream: S,
) -> Result<(), IngestError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    // 1. Stage the raw upload next to the asset directories
    let staging = assets.staging_path(audio_id, extension);
    stream_to_file(&staging, stream).await?;

    // 2. Destination directory must exist before the encoder runs
    let output_dir = assets.create_asset_dir(audio_id).await?;

    // 3. Hand off to the encoder and wait for its exit
    av::transcode_to_hls(encoder, &staging, &output_dir, audio_id).await?;

    // 4. The source is only needed until transcoding succeeds
    tokio::fs::remove_file(&staging).await?;

    // 5. Register the asset. A counter that cannot be persisted must not
    //    fail an upload that already transcoded.
    if let Err(err) = stats.record_new_asset(audio_id).await {
        warn!("Failed to persist view counter for {}: {}", audio_id, err);
    }

    info!(
        "Transcoded upload {} into {}",
        audio_id,
        output_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::cmd::MockHlsEncoder;
    use bytes::Bytes;
    use futures::stream;
    use std::fs;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use tempfile::tempdir;

    type E = std::io::Error;

    fn mock_output(stderr: &str, success: bool) -> Output {
        Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                ExitStatus::from_raw(1)
            },
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn upload_stream(data: &'static str) -> impl Stream<Item = Result<Bytes, E>> {
        stream::iter(vec![Ok::<Bytes, E>(Bytes::from(data))])
    }

    #[test]
    fn test_allocate_asset_id_is_filesystem_safe() {
        let id = allocate_asset_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_stream_to_file() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("test_file.txt");

        let test_data = "Hello, world!";
        let mock_stream = stream::iter(vec![Ok::<Bytes, E>(Bytes::from(test_data))]);

        let result = stream_to_file(&file_path, mock_stream).await;

        assert!(result.is_ok());
        let file_contents = fs::read_to_string(file_path).unwrap();
        assert_eq!(file_contents, test_data);
    }

    #[tokio::test]
    async fn test_stream_to_file_error() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("test_file.txt");

        let mock_stream = stream::iter(vec![Err("Test error")]);

        let result = stream_to_file(&file_path, mock_stream).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_successful_ingestion_registers_asset_and_removes_source() {
        let dir = tempdir().unwrap();
        let assets = AssetStore::new(dir.path());
        let stats = StatsStore::open(dir.path().join("data/stats.json"))
            .await
            .unwrap();

        let mut encoder = MockHlsEncoder::new();
        encoder
            .expect_encode_hls()
            .times(1)
            .returning(|_, segment_template, playlist| {
                // Stand in for ffmpeg: drop a playlist and two segments
                // into the output directory.
                let out_dir = segment_template.parent().unwrap();
                fs::write(out_dir.join("segment000.ts"), b"segment zero").unwrap();
                fs::write(out_dir.join("segment001.ts"), b"segment one").unwrap();
                fs::write(playlist, "#EXTM3U\nsegment000.ts\nsegment001.ts\n").unwrap();
                Ok(mock_output("", true))
            });

        let audio_id = "1717171717171";
        ingest_upload(
            &assets,
            &stats,
            &encoder,
            audio_id,
            Some("mp3"),
            upload_stream("fake mp3 bytes"),
        )
        .await
        .unwrap();

        assert!(assets.asset_exists(audio_id).await);
        assert!(assets.segment_exists(audio_id, "segment000.ts").await);
        assert!(
            !assets.staging_path(audio_id, Some("mp3")).exists(),
            "staged source should be deleted after a successful transcode"
        );
        assert_eq!(
            stats.all().await.get(audio_id),
            Some(&crate::store::ViewStats { views: 0 })
        );
    }

    #[tokio::test]
    async fn test_failed_transcode_leaves_source_and_registers_nothing() {
        let dir = tempdir().unwrap();
        let assets = AssetStore::new(dir.path());
        let stats = StatsStore::open(dir.path().join("data/stats.json"))
            .await
            .unwrap();

        let mut encoder = MockHlsEncoder::new();
        encoder
            .expect_encode_hls()
            .times(1)
            .returning(|_, _, _| Ok(mock_output("unsupported codec", false)));

        let audio_id = "1717171717172";
        let result = ingest_upload(
            &assets,
            &stats,
            &encoder,
            audio_id,
            Some("mp3"),
            upload_stream("fake mp3 bytes"),
        )
        .await;

        assert!(matches!(result, Err(IngestError::Transcode(_))));
        assert!(
            assets.staging_path(audio_id, Some("mp3")).exists(),
            "failed ingestions leave the staged source in place"
        );
        assert!(
            stats.all().await.get(audio_id).is_none(),
            "no counter entry may exist for a failed ingestion"
        );
    }
}
