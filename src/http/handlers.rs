//! API endpoint handlers.
//!
//! Every handler runs the same pipeline, in this order:
//! 1. validate parameters (400, no backend contact, no quota spent)
//! 2. take a rate-limit token for the client (429)
//! 3. run the backend operation through the retry wrapper (503 / 500)

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::health::{self, HealthReport};
use crate::http::params::{self, FormResult, PositionForm, SearchParams, SeekForm, UriForm, VolumeForm};
use crate::http::request::ClientIp;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::mpd::reply;
use crate::mpd::{MpdError, Record};
use crate::security::Endpoint;

#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

const SUCCESS: Success = Success { success: true };

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: Record,
    pub current_song: Record,
}

#[derive(Debug, Serialize)]
pub struct SeekResponse {
    pub success: bool,
    pub position: f64,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    pub success: bool,
    pub volume: u8,
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
    pub success: bool,
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct AddPlayResponse {
    pub success: bool,
    pub uri: String,
    pub position: u32,
}

#[derive(Debug, Serialize)]
pub struct RandomResponse {
    pub success: bool,
    pub random: bool,
}

#[derive(Debug, Serialize)]
pub struct RepeatResponse {
    pub success: bool,
    pub repeat: bool,
}

pub async fn status(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<StatusResponse>> {
    state.limit(Endpoint::Status, client)?;

    let (status, current_song) = state
        .mpd
        .execute("status", |mpd| {
            Box::pin(async move {
                let status = mpd.status().await?;
                let current_song = mpd.current_song().await?;
                Ok((status, current_song))
            })
        })
        .await?;

    Ok(Json(StatusResponse {
        status,
        current_song,
    }))
}

pub async fn play(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Success>> {
    state.limit(Endpoint::Play, client)?;
    state
        .mpd
        .execute("play", |mpd| Box::pin(mpd.play(None)))
        .await?;
    Ok(Json(SUCCESS))
}

pub async fn pause(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Success>> {
    state.limit(Endpoint::Pause, client)?;
    state.mpd.execute("pause", |mpd| Box::pin(mpd.pause())).await?;
    Ok(Json(SUCCESS))
}

pub async fn stop(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Success>> {
    state.limit(Endpoint::Stop, client)?;
    state.mpd.execute("stop", |mpd| Box::pin(mpd.stop())).await?;
    Ok(Json(SUCCESS))
}

pub async fn next(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Success>> {
    state.limit(Endpoint::Next, client)?;
    state.mpd.execute("next", |mpd| Box::pin(mpd.next())).await?;
    Ok(Json(SUCCESS))
}

pub async fn previous(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Success>> {
    state.limit(Endpoint::Previous, client)?;
    state
        .mpd
        .execute("previous", |mpd| Box::pin(mpd.previous()))
        .await?;
    Ok(Json(SUCCESS))
}

/// Seek within the song given by `id`, or within the current song.
pub async fn seek(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    form: FormResult<SeekForm>,
) -> ApiResult<Json<SeekResponse>> {
    let form = params::form_or_default(form);
    let position = params::seek_position(form.position.as_deref())?;
    let song_id = params::song_id(form.id.as_deref());

    state.limit(Endpoint::Seek, client)?;
    state
        .mpd
        .execute("seek", move |mpd| {
            Box::pin(async move {
                match song_id {
                    Some(id) => mpd.seek_id(id, position).await,
                    None => mpd.seek_current(position).await,
                }
            })
        })
        .await?;

    Ok(Json(SeekResponse {
        success: true,
        position,
    }))
}

pub async fn set_volume(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    form: FormResult<VolumeForm>,
) -> ApiResult<Json<VolumeResponse>> {
    let form = params::form_or_default(form);
    let volume = params::volume(form.volume.as_deref())?;

    state.limit(Endpoint::Volume, client)?;
    state
        .mpd
        .execute("setvol", move |mpd| Box::pin(mpd.set_volume(volume)))
        .await?;

    Ok(Json(VolumeResponse {
        success: true,
        volume,
    }))
}

pub async fn playlist(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Vec<Record>>> {
    state.limit(Endpoint::Playlist, client)?;
    let tracks = state
        .mpd
        .execute("playlistinfo", |mpd| Box::pin(mpd.playlist_info()))
        .await?;
    Ok(Json(tracks))
}

pub async fn playlist_add(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    form: FormResult<UriForm>,
) -> ApiResult<Json<AddResponse>> {
    let form = params::form_or_default(form);
    let uri = params::uri(form.uri.as_deref())?;

    state.limit(Endpoint::PlaylistAdd, client)?;
    let target = uri.clone();
    state
        .mpd
        .execute("add", move |mpd| {
            Box::pin(async move { mpd.add(&target).await })
        })
        .await?;

    Ok(Json(AddResponse { success: true, uri }))
}

/// Append a track and start playing it.
///
/// The new track's position is derived from the playlist length before and
/// after the add, all on one connection. If the playlist did not grow, the
/// add is reported as failed and nothing is played.
pub async fn playlist_addplay(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    form: FormResult<UriForm>,
) -> ApiResult<Json<AddPlayResponse>> {
    let form = params::form_or_default(form);
    let uri = params::uri(form.uri.as_deref())?;

    state.limit(Endpoint::PlaylistAddPlay, client)?;
    let target = uri.clone();
    let position = state
        .mpd
        .execute("addplay", move |mpd| {
            Box::pin(async move {
                let before = mpd.playlist_info().await?.len();
                mpd.add(&target).await?;
                let after = mpd.playlist_info().await?.len();

                if after <= before {
                    tracing::warn!(uri = %target, before, after, "Playlist did not grow after add");
                    return Ok(None);
                }

                let position = u32::try_from(after - 1)
                    .map_err(|_| MpdError::Protocol(format!("playlist length {after} out of range")))?;
                mpd.play(Some(position)).await?;
                Ok(Some(position))
            })
        })
        .await?
        .ok_or_else(|| ApiError::Backend("Failed to add track".into()))?;

    Ok(Json(AddPlayResponse {
        success: true,
        uri,
        position,
    }))
}

pub async fn playlist_remove(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    form: FormResult<PositionForm>,
) -> ApiResult<Json<Success>> {
    let form = params::form_or_default(form);
    let position = params::playlist_position(form.position.as_deref())?;

    state.limit(Endpoint::PlaylistRemove, client)?;
    state
        .mpd
        .execute("delete", move |mpd| Box::pin(mpd.delete(position)))
        .await?;
    Ok(Json(SUCCESS))
}

pub async fn playlist_play(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    form: FormResult<PositionForm>,
) -> ApiResult<Json<Success>> {
    let form = params::form_or_default(form);
    let position = params::playlist_position(form.position.as_deref())?;

    state.limit(Endpoint::PlaylistPlay, client)?;
    state
        .mpd
        .execute("play", move |mpd| Box::pin(mpd.play(Some(position))))
        .await?;
    Ok(Json(SUCCESS))
}

pub async fn playlist_clear(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Success>> {
    state.limit(Endpoint::PlaylistClear, client)?;
    state.mpd.execute("clear", |mpd| Box::pin(mpd.clear())).await?;
    Ok(Json(SUCCESS))
}

/// Search all tags. An empty query matches nothing and skips the backend.
pub async fn search(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    Query(query): Query<SearchParams>,
) -> ApiResult<Json<Vec<Record>>> {
    let query = params::search_query(query.query.as_deref())?;

    state.limit(Endpoint::Search, client)?;
    let Some(query) = query else {
        return Ok(Json(Vec::new()));
    };

    let results = state
        .mpd
        .execute("search", move |mpd| {
            Box::pin(async move { mpd.search_any(&query).await })
        })
        .await?;
    Ok(Json(results))
}

pub async fn playlists(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<Vec<Record>>> {
    state.limit(Endpoint::Playlists, client)?;
    let lists = state
        .mpd
        .execute("listplaylists", |mpd| Box::pin(mpd.list_playlists()))
        .await?;
    Ok(Json(lists))
}

/// Flip shuffle mode.
///
/// Read and write happen on one connection but are not atomic: two
/// concurrent toggles can both read the same state and leave it unchanged.
pub async fn toggle_random(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<RandomResponse>> {
    state.limit(Endpoint::Random, client)?;
    let random = state
        .mpd
        .execute("random", |mpd| {
            Box::pin(async move {
                let enabled = !reply::flag(&mpd.status().await?, "random");
                mpd.set_random(enabled).await?;
                Ok(enabled)
            })
        })
        .await?;

    Ok(Json(RandomResponse {
        success: true,
        random,
    }))
}

/// Flip repeat mode. Same caveat as [`toggle_random`].
pub async fn toggle_repeat(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<Json<RepeatResponse>> {
    state.limit(Endpoint::Repeat, client)?;
    let repeat = state
        .mpd
        .execute("repeat", |mpd| {
            Box::pin(async move {
                let enabled = !reply::flag(&mpd.status().await?, "repeat");
                mpd.set_repeat(enabled).await?;
                Ok(enabled)
            })
        })
        .await?;

    Ok(Json(RepeatResponse {
        success: true,
        repeat,
    }))
}

/// Backend liveness. A single attempt; retries would hide flapping.
pub async fn health(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
) -> ApiResult<(StatusCode, Json<HealthReport>)> {
    state.limit(Endpoint::Health, client)?;

    let report = health::probe(&state.connections).await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(report)))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
