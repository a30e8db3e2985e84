//! HTTP implementations of the backend notifier and the track catalog.
//!
//! Both share the composition root's [`Client`] for connection pooling and
//! send JSON bodies. Transient failures are retried through
//! [`with_retry`](super::retry::with_retry).

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Serialize;

use super::retry::with_retry;
use super::traits::{PlaybackNotifier, PlaylistNotifier, TrackCatalog};
use super::{
    CatalogError, CatalogResult, Initiator, NotifierError, NotifierResult, PlaylistOperation,
    PlaylistUpdateAck, PlaylistUpdateRejection,
};
use crate::protocol_constants::{
    BACKEND_JOIN_PATH, BACKEND_PAUSE_PATH, BACKEND_PING_PATH, BACKEND_PLAYLIST_CREATION_ACK_PATH,
    BACKEND_PLAY_PATH, BACKEND_ROOM_CREATION_ACK_PATH, CATALOG_RESOLVE_PATH,
};
use crate::rooms::listening::ListeningRoomExposedState;
use crate::rooms::playlist::PlaylistExposedState;
use crate::track::{Track, TrackId};

/// Joins `path` to `base` and optionally appends one escaped path segment.
fn build_url(base: &str, path: &str, segment: Option<&str>) -> Result<Url, String> {
    let mut url =
        Url::parse(&format!("{}{}", base.trim_end_matches('/'), path)).map_err(|e| e.to_string())?;
    if let Some(segment) = segment {
        url.path_segments_mut()
            .map_err(|()| format!("{} cannot be a base URL", base))?
            .push(segment);
    }
    Ok(url)
}

/// Converts a non-success response into its status and body.
async fn error_status(response: Response) -> Result<Response, (u16, String)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err((status.as_u16(), body))
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Notifier
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JoinAckBody<'a> {
    state: &'a ListeningRoomExposedState,
    #[serde(rename = "joiningUserID")]
    joining_user_id: &'a str,
}

/// Notifies the rendering backend over HTTP.
pub struct HttpBackendNotifier {
    client: Client,
    base_url: String,
}

impl HttpBackendNotifier {
    /// Creates a notifier targeting `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str, segment: Option<&str>) -> NotifierResult<Url> {
        build_url(&self.base_url, path, segment).map_err(NotifierError::InvalidUrl)
    }

    async fn try_get(&self, url: &Url) -> NotifierResult<()> {
        let response = self.client.get(url.clone()).send().await?;
        error_status(response)
            .await
            .map(|_| ())
            .map_err(|(status, body)| NotifierError::HttpStatus(status, body))
    }

    async fn try_post<B: Serialize + ?Sized + Sync>(&self, url: &Url, body: &B) -> NotifierResult<()> {
        let response = self.client.post(url.clone()).json(body).send().await?;
        error_status(response)
            .await
            .map(|_| ())
            .map_err(|(status, body)| NotifierError::HttpStatus(status, body))
    }

    async fn get(&self, action: &str, url: Url) -> NotifierResult<()> {
        log::debug!("[Backend] {} -> GET {}", action, url);
        with_retry(action, || self.try_get(&url)).await
    }

    async fn post<B: Serialize + ?Sized + Sync>(
        &self,
        action: &str,
        url: Url,
        body: &B,
    ) -> NotifierResult<()> {
        log::debug!("[Backend] {} -> POST {}", action, url);
        with_retry(action, || self.try_post(&url, body)).await
    }
}

#[async_trait]
impl PlaybackNotifier for HttpBackendNotifier {
    async fn ping(&self) -> NotifierResult<()> {
        let url = self.url(BACKEND_PING_PATH, None)?;
        // Probes are not retried: the caller wants the current answer.
        self.try_get(&url).await
    }

    async fn play(&self, room_id: &str) -> NotifierResult<()> {
        let url = self.url(BACKEND_PLAY_PATH, Some(room_id))?;
        self.get("Play", url).await
    }

    async fn pause(&self, room_id: &str) -> NotifierResult<()> {
        let url = self.url(BACKEND_PAUSE_PATH, Some(room_id))?;
        self.get("Pause", url).await
    }

    async fn acknowledge_room_creation(
        &self,
        state: &ListeningRoomExposedState,
    ) -> NotifierResult<()> {
        let url = self.url(BACKEND_ROOM_CREATION_ACK_PATH, None)?;
        self.post("RoomCreationAck", url, state).await
    }

    async fn acknowledge_join(
        &self,
        state: &ListeningRoomExposedState,
        joining_user_id: &str,
    ) -> NotifierResult<()> {
        let url = self.url(BACKEND_JOIN_PATH, None)?;
        let body = JoinAckBody {
            state,
            joining_user_id,
        };
        self.post("JoinAck", url, &body).await
    }
}

#[async_trait]
impl PlaylistNotifier for HttpBackendNotifier {
    async fn acknowledge_playlist_creation(
        &self,
        state: &PlaylistExposedState,
    ) -> NotifierResult<()> {
        let url = self.url(BACKEND_PLAYLIST_CREATION_ACK_PATH, None)?;
        self.post("PlaylistCreationAck", url, state).await
    }

    async fn acknowledge_update(
        &self,
        operation: PlaylistOperation,
        ack: &PlaylistUpdateAck,
    ) -> NotifierResult<()> {
        let url = self.url(operation.ack_path(), None)?;
        self.post("PlaylistUpdateAck", url, ack).await
    }

    async fn reject_update(
        &self,
        operation: PlaylistOperation,
        rejection: &PlaylistUpdateRejection,
    ) -> NotifierResult<()> {
        let url = self.url(operation.reject_path(), None)?;
        self.post("PlaylistUpdateReject", url, rejection).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Track Catalog
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ResolveRequestBody<'a> {
    #[serde(rename = "trackIDs")]
    track_ids: &'a [TrackId],
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    initiator: Option<&'a Initiator>,
}

/// Checks that the n-th track describes the n-th requested ID.
fn ensure_aligned(ids: &[TrackId], tracks: &[Track]) -> CatalogResult<()> {
    let aligned = ids.len() == tracks.len() && ids.iter().zip(tracks).all(|(id, t)| *id == t.id);
    if aligned {
        Ok(())
    } else {
        Err(CatalogError::Misaligned {
            expected: ids.len(),
            actual: tracks.len(),
        })
    }
}

/// Resolves track metadata from the catalog service over HTTP.
pub struct HttpTrackCatalog {
    client: Client,
    base_url: String,
}

impl HttpTrackCatalog {
    /// Creates a catalog client targeting `base_url`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn try_resolve(
        &self,
        url: &Url,
        body: &ResolveRequestBody<'_>,
    ) -> CatalogResult<Vec<Track>> {
        let response = self.client.post(url.clone()).json(body).send().await?;
        let response = error_status(response)
            .await
            .map_err(|(status, body)| CatalogError::HttpStatus(status, body))?;
        Ok(response.json::<Vec<Track>>().await?)
    }

    async fn fetch(&self, ids: &[TrackId], initiator: Option<&Initiator>) -> CatalogResult<Vec<Track>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = build_url(&self.base_url, CATALOG_RESOLVE_PATH, None)
            .map_err(CatalogError::InvalidUrl)?;
        let body = ResolveRequestBody {
            track_ids: ids,
            initiator,
        };
        let tracks = with_retry("ResolveTracks", || self.try_resolve(&url, &body)).await?;
        ensure_aligned(ids, &tracks)?;
        Ok(tracks)
    }
}

#[async_trait]
impl TrackCatalog for HttpTrackCatalog {
    async fn resolve(&self, ids: &[TrackId]) -> CatalogResult<Vec<Track>> {
        self.fetch(ids, None).await
    }

    async fn resolve_for(
        &self,
        ids: &[TrackId],
        initiator: &Initiator,
    ) -> CatalogResult<Vec<Track>> {
        self.fetch(ids, Some(initiator)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track {
            id: id.into(),
            title: "title".into(),
            artist_name: "artist".into(),
            duration_ms: 1000,
        }
    }

    #[test]
    fn build_url_escapes_room_segment() {
        let url = build_url("http://backend:3333/", BACKEND_PAUSE_PATH, Some("a b/c")).unwrap();
        assert_eq!(url.as_str(), "http://backend:3333/temporal/pause/a%20b%2Fc");
    }

    #[test]
    fn build_url_rejects_garbage_base() {
        assert!(build_url("not a url", BACKEND_PING_PATH, None).is_err());
    }

    #[test]
    fn aligned_response_is_accepted() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(ensure_aligned(&ids, &[track("a"), track("b")]).is_ok());
    }

    #[test]
    fn reordered_response_is_misaligned() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let err = ensure_aligned(&ids, &[track("b"), track("a")]).unwrap_err();
        assert!(matches!(err, CatalogError::Misaligned { expected: 2, actual: 2 }));
    }

    #[test]
    fn resolve_body_includes_initiator_when_present() {
        let ids = vec!["a".to_string()];
        let initiator = Initiator::new("user", "device");
        let body = ResolveRequestBody {
            track_ids: &ids,
            initiator: Some(&initiator),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["trackIDs"][0], "a");
        assert_eq!(json["userID"], "user");

        let anonymous = ResolveRequestBody {
            track_ids: &ids,
            initiator: None,
        };
        let json = serde_json::to_value(&anonymous).unwrap();
        assert!(json.get("userID").is_none());
    }
}
