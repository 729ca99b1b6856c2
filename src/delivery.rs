//! Delivery of transcoded assets.
//!
//! Playlists are rewritten on the way out so every segment reference
//! routes back through `/play/<id>/<segment>`; segment files are
//! streamed raw. Players fetch both directly, often from another origin,
//! so these routes sit behind the permissive CORS layer in `web`.

use crate::store::assets;
use crate::web::AppState;
use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{header, StatusCode},
    response::Response,
};
use regex::{Captures, Regex};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Replace every `segmentNNN.ts` reference with an absolute playback
/// path for `audio_id`.
///
/// Pure text substitution: tags, durations and line structure pass
/// through untouched.
pub fn rewrite_playlist(playlist: &str, audio_id: &str) -> String {
    let re = Regex::new(r"segment\d+\.ts").unwrap();
    re.replace_all(playlist, |caps: &Captures| {
        format!("/play/{}/{}", audio_id, &caps[0])
    })
    .into_owned()
}

/// GET /play/:audio_id - the rewritten playlist. Counts as one view.
pub async fn play_playlist(
    State(state): State<AppState>,
    AxumPath(audio_id): AxumPath<String>,
) -> Result<Response, (StatusCode, String)> {
    if !state.assets.asset_exists(&audio_id).await {
        info!("Playlist requested for unknown asset {}", audio_id);
        return Err((StatusCode::NOT_FOUND, "Audio not found.".to_owned()));
    }

    let playlist_path = state.assets.playlist_path(&audio_id);
    let raw = match tokio::fs::read_to_string(&playlist_path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!("Asset {} has no playlist on disk", audio_id);
            return Err((StatusCode::NOT_FOUND, "Playlist not found.".to_owned()));
        }
        Err(err) => {
            error!("Error reading playlist {}: {}", playlist_path.display(), err);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_owned(),
            ));
        }
    };

    // Best effort: a counter that cannot be persisted must not block
    // playback.
    if let Err(err) = state.stats.increment_view(&audio_id).await {
        warn!("Failed to persist view count for {}: {}", audio_id, err);
    }

    let body = rewrite_playlist(&raw, &audio_id);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)
        .body(Body::from(body))
        .unwrap())
}

/// GET /play/:audio_id/:segment - raw segment bytes. Not counted as a
/// view.
pub async fn play_segment(
    State(state): State<AppState>,
    AxumPath((audio_id, segment)): AxumPath<(String, String)>,
) -> Result<Response, (StatusCode, String)> {
    if !state.assets.asset_exists(&audio_id).await {
        info!("Segment requested for unknown asset {}", audio_id);
        return Err((StatusCode::NOT_FOUND, "Audio not found.".to_owned()));
    }

    if !assets::segment_name_is_valid(&segment) {
        warn!(
            "Rejected unsafe segment name {:?} for asset {}",
            segment, audio_id
        );
        return Err((StatusCode::NOT_FOUND, "Segment not found.".to_owned()));
    }

    // Validated above; the join cannot escape the asset directory.
    let segment_path = state.assets.asset_dir(&audio_id).join(&segment);
    let file = match tokio::fs::File::open(&segment_path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!("Asset {} has no segment {}", audio_id, segment);
            return Err((StatusCode::NOT_FOUND, "Segment not found.".to_owned()));
        }
        Err(err) => {
            error!("Error opening segment {}: {}", segment_path.display(), err);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_owned(),
            ));
        }
    };

    let stream = ReaderStream::new(file);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE)
        .body(Body::from_stream(stream))
        .unwrap())
}
