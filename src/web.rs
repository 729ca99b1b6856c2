//! HTTP surface: routes, pages and CORS wiring.
//!
//! App routes (upload UI, player, stats) honor the configured origin
//! allow-list. The /play delivery routes are deliberately wide open:
//! HLS players request playlists and segments directly.

use crate::av::HlsEncoder;
use crate::config::Config;
use crate::delivery;
use crate::ingest::{self, IngestError};
use crate::store::{assets, AssetStore, StatsStore};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::Html,
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

/// Multipart field the upload form submits the audio file under.
const UPLOAD_FIELD: &str = "audioFile";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub assets: AssetStore,
    pub stats: StatsStore,
    pub encoder: Arc<dyn HlsEncoder>,
}

pub fn router(state: AppState) -> Router {
    let app_cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let play_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app_routes = Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_audio))
        .route("/view/:audio_id", get(view_page))
        .route("/stats", get(stats_page))
        .layer(app_cors);

    let play_routes = Router::new()
        .route("/play/:audio_id", get(delivery::play_playlist))
        .route("/play/:audio_id/:segment", get(delivery::play_segment))
        .layer(play_cors);

    Router::new()
        .merge(app_routes)
        .merge(play_routes)
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

// Handler that accepts a multipart form upload and drives it through the
// ingestion pipeline.
async fn upload_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, (StatusCode, String)> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let extension = field.file_name().and_then(file_extension);
        let audio_id = ingest::allocate_asset_id();

        return match ingest::ingest_upload(
            &state.assets,
            &state.stats,
            state.encoder.as_ref(),
            &audio_id,
            extension.as_deref(),
            field,
        )
        .await
        {
            Ok(()) => Ok(Html(format!(
                "File uploaded and converted! Access it at <a href=\"/view/{id}\">/view/{id}</a>",
                id = audio_id
            ))),
            Err(IngestError::Transcode(err)) => {
                error!("Error during conversion: {}", err);
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error during conversion.".to_owned(),
                ))
            }
            Err(err) => {
                error!("Error ingesting upload {}: {}", audio_id, err);
                Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
            }
        };
    }

    Err((StatusCode::BAD_REQUEST, "No file uploaded.".to_owned()))
}

// Extension of the uploaded filename, kept only when it is plain
// alphanumeric (it becomes part of the staging filename).
fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
    <head>
        <title>Upload audio</title>
    </head>
    <body>
        <h1>Upload an audio file</h1>
        <form action="/upload" method="post" enctype="multipart/form-data">
            <div>
                <label>
                    Audio file:
                    <input type="file" name="audioFile" accept="audio/*">
                </label>
            </div>
            <div>
                <input type="submit" value="Upload">
            </div>
        </form>
    </body>
</html>
"#,
    )
}

async fn view_page(
    AxumPath(audio_id): AxumPath<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    if !assets::id_is_valid(&audio_id) {
        return Err((StatusCode::NOT_FOUND, "Audio not found.".to_owned()));
    }

    Ok(Html(format!(
        r#"<!doctype html>
<html>
    <head>
        <title>Now playing</title>
        <script src="https://cdn.jsdelivr.net/npm/hls.js@1"></script>
    </head>
    <body>
        <h1>Now playing {id}</h1>
        <audio id="player" controls></audio>
        <script>
            const player = document.getElementById('player');
            const source = '/play/{id}';
            if (Hls.isSupported()) {{
                const hls = new Hls();
                hls.loadSource(source);
                hls.attachMedia(player);
            }} else if (player.canPlayType('application/vnd.apple.mpegurl')) {{
                player.src = source;
            }}
        </script>
    </body>
</html>
"#,
        id = audio_id
    )))
}

async fn stats_page(State(state): State<AppState>) -> Html<String> {
    let counters = state.stats.all().await;
    let mut entries: Vec<_> = counters.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let rows = entries
        .iter()
        .map(|(id, stats)| {
            format!(
                "<tr><td><a href=\"/view/{id}\">{id}</a></td><td>{views}</td></tr>",
                id = id,
                views = stats.views
            )
        })
        .collect::<String>();

    Html(format!(
        r#"<!doctype html>
<html>
    <head>
        <title>View stats</title>
    </head>
    <body>
        <h1>View counts</h1>
        <table>
            <tr><th>Audio</th><th>Views</th></tr>
            {rows}
        </table>
    </body>
</html>
"#,
        rows = rows
    ))
}
