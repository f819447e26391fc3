//! Resource routes forwarded to the Spotify Web API
//!
//! Each handler makes one upstream call through `Session::with_guarded_call`
//! (at most one token refresh per request, counting the guard's) and trims
//! the reply to what the front end uses. Two failure styles exist: most routes collapse every failure
//! into a 500 with a fixed message, while the `/api/*` routes mirror the
//! upstream status and include its body as `details`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};
use spotify_auth::{GuardOutcome, Session};
use std::future::Future;
use tracing::warn;

use crate::AppState;
use crate::error::RelayError;

const PLAYLIST_PAGE_LIMIT: u32 = 50;
const DEFAULT_TRACKS_LIMIT: u32 = 10;
const DEFAULT_TRACKS_OFFSET: u32 = 5;

/// Why an upstream resource call did not produce a usable JSON body.
#[derive(Debug)]
enum Failure {
    NotAuthorized,
    Transport(String),
    Status(StatusCode, Value),
}

impl Failure {
    /// Every failure becomes a 500 with a fixed message.
    fn collapsed(self, message: &'static str) -> RelayError {
        match self {
            Failure::NotAuthorized => RelayError::NotAuthorized,
            _ => RelayError::Upstream {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message,
                details: None,
            },
        }
    }

    /// Upstream status and body are passed through as `details`.
    fn detailed(self, message: &'static str) -> RelayError {
        match self {
            Failure::NotAuthorized => RelayError::NotAuthorized,
            Failure::Transport(reason) => RelayError::Upstream {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message,
                details: Some(Value::String(reason)),
            },
            Failure::Status(status, body) => RelayError::Upstream {
                status,
                message,
                details: Some(body),
            },
        }
    }
}

/// Outcome the credential guard left on the request, if it ran.
type Guarded = Option<Extension<GuardOutcome>>;

/// Run an authenticated upstream call and decode its JSON body.
async fn upstream_json<F, Fut>(
    session: &Session,
    guarded: Guarded,
    call: F,
) -> Result<Value, Failure>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let response = match guarded {
        Some(Extension(outcome)) => session.with_guarded_call(outcome, call).await,
        None => session.with_authenticated_call(call).await,
    };
    let response = response.map_err(|e| match e {
        spotify_auth::Error::NotAuthorized => Failure::NotAuthorized,
        other => Failure::Transport(other.to_string()),
    })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Failure::Transport(format!("reading upstream body: {e}")))?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };

    if !status.is_success() {
        return Err(Failure::Status(status, body));
    }
    Ok(body)
}

fn items(mut body: Value) -> Value {
    match body.get_mut("items") {
        Some(items) => items.take(),
        None => json!([]),
    }
}

/// GET /
pub async fn welcome() -> &'static str {
    "Welcome to the Spotify API integration!"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistRequest {
    user_id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// POST /playlists: Create a private playlist for a user.
pub async fn create_playlist(
    State(state): State<AppState>,
    guarded: Guarded,
    Json(body): Json<CreatePlaylistRequest>,
) -> Result<Json<Value>, RelayError> {
    let session = &state.session;
    let url = session.config().api_endpoint(&format!(
        "users/{}/playlists",
        urlencoding::encode(&body.user_id)
    ));
    let payload = json!({
        "name": body.name,
        "description": body.description,
        "public": false,
    });
    let client = session.http_client();

    upstream_json(session, guarded, |access| {
        client.post(&url).bearer_auth(access).json(&payload).send()
    })
    .await
    .map(Json)
    .map_err(|failure| {
        warn!(?failure, "error creating playlist");
        failure.collapsed("Failed to create playlist")
    })
}

/// GET /me/playlists: The full upstream page.
pub async fn my_playlists(
    State(state): State<AppState>,
    guarded: Guarded,
) -> Result<Json<Value>, RelayError> {
    let session = &state.session;
    let url = session.config().api_endpoint("me/playlists");
    let client = session.http_client();

    upstream_json(session, guarded, |access| client.get(&url).bearer_auth(access).send())
        .await
        .map(Json)
        .map_err(|failure| {
            warn!(?failure, "error getting playlists");
            failure.collapsed("Error getting your playlist")
        })
}

/// GET /api/user-playlists: First page of playlists, items only.
pub async fn user_playlists(
    State(state): State<AppState>,
    guarded: Guarded,
) -> Result<Json<Value>, RelayError> {
    let session = &state.session;
    let url = session.config().api_endpoint("me/playlists");
    let client = session.http_client();

    upstream_json(session, guarded, |access| {
        client
            .get(&url)
            .bearer_auth(access)
            .query(&[("limit", PLAYLIST_PAGE_LIMIT), ("offset", 0)])
            .send()
    })
    .await
    .map(|body| Json(items(body)))
    .map_err(|failure| {
        warn!(?failure, "error fetching playlists");
        failure.detailed("An error occurred while fetching playlists.")
    })
}

#[derive(Debug, Deserialize)]
pub struct PlaylistTracksQuery {
    playlist_id: String,
    limit: Option<u32>,
    offset: Option<u32>,
}

/// GET /api/user-playlists-tracks?playlist_id=..: One page of a playlist's tracks.
pub async fn playlist_tracks(
    State(state): State<AppState>,
    guarded: Guarded,
    Query(query): Query<PlaylistTracksQuery>,
) -> Result<Json<Value>, RelayError> {
    let session = &state.session;
    let url = session.config().api_endpoint(&format!(
        "playlists/{}/tracks",
        urlencoding::encode(&query.playlist_id)
    ));
    let page = [
        ("limit", query.limit.unwrap_or(DEFAULT_TRACKS_LIMIT)),
        ("offset", query.offset.unwrap_or(DEFAULT_TRACKS_OFFSET)),
    ];
    let client = session.http_client();

    upstream_json(session, guarded, |access| {
        client.get(&url).bearer_auth(access).query(&page).send()
    })
    .await
    .map(Json)
    .map_err(|failure| {
        warn!(?failure, "error fetching playlist tracks");
        failure.detailed("An error occurred while fetching the tracks in the playlist")
    })
}

#[derive(Debug, Deserialize)]
pub struct AddTracksRequest {
    uris: Vec<String>,
}

/// POST /playlists/{playlist_id}/tracks: Append track URIs.
pub async fn add_tracks(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    guarded: Guarded,
    Json(body): Json<AddTracksRequest>,
) -> Result<Json<Value>, RelayError> {
    let session = &state.session;
    let url = session.config().api_endpoint(&format!(
        "playlists/{}/tracks",
        urlencoding::encode(&playlist_id)
    ));
    let payload = json!({ "uris": body.uris });
    let client = session.http_client();

    upstream_json(session, guarded, |access| {
        client.post(&url).bearer_auth(access).json(&payload).send()
    })
    .await
    .map(Json)
    .map_err(|failure| {
        warn!(?failure, "error adding tracks to playlist");
        failure.collapsed("Failed to add tracks to playlist")
    })
}

/// GET /liked-songs: Saved tracks, items only.
pub async fn liked_songs(
    State(state): State<AppState>,
    guarded: Guarded,
) -> Result<Json<Value>, RelayError> {
    let session = &state.session;
    let url = session.config().api_endpoint("me/tracks");
    let client = session.http_client();

    upstream_json(session, guarded, |access| client.get(&url).bearer_auth(access).send())
        .await
        .map(|body| Json(items(body)))
        .map_err(|failure| {
            warn!(?failure, "error fetching liked songs");
            failure.collapsed("Failed to fetch liked songs")
        })
}
