//! JSON endpoints over a [`ControlPlane`] and a [`PlayerRegistry`].

use crate::{
    api::{
        control::{ControlPlane, PlayerRegistry, Track},
        router::{route, Route},
    },
    errors::ApiError,
    Handled, Handler, Method, Request, Response, StatusCode,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const MASTER_GROUP: &str = "[Master]";

/// REST API handler.
///
/// Holds shared handles to the control plane and the player registry; every
/// request reads or writes through them and answers with one JSON record.
///
/// # Examples
/// ```
/// use control_rest::{memory::{MemoryControls, MemoryPlayers}, Api};
/// use std::sync::Arc;
///
/// let controls = Arc::new(MemoryControls::new());
/// controls.register("[Channel1]", "volume", 1.0);
///
/// let api = Api::new(controls, Arc::new(MemoryPlayers::new()));
/// let resp = api.respond("GET", "/api/control/Channel1/volume", b"");
/// assert!(resp.to_bytes().starts_with(b"HTTP/1.1 200 OK\r\n"));
/// ```
pub struct Api<C, P> {
    controls: Arc<C>,
    players: Arc<P>,
}

impl<C: ControlPlane, P: PlayerRegistry> Api<C, P> {
    pub fn new(controls: Arc<C>, players: Arc<P>) -> Self {
        Api { controls, players }
    }

    #[inline(always)]
    pub fn controls(&self) -> &Arc<C> {
        &self.controls
    }

    #[inline(always)]
    pub fn players(&self) -> &Arc<P> {
        &self.players
    }

    /// Builds the response for `request` without touching the network.
    pub fn dispatch(&self, request: &Request, response: &mut Response) -> Handled {
        let route = match route(request.method(), request.path()) {
            Ok(route) => route,
            Err(err) => return response.error(&err),
        };

        let result = match route {
            Route::Preflight => return response.status(StatusCode::NoContent).empty(),
            Route::Status => Ok(response.json(&self.status_report())),
            Route::Player { group } => self
                .player_status(&group)
                .map(|status| response.json(&status)),
            Route::GetControl { group, item } => self
                .control_value(group, item)
                .map(|value| response.json(&value)),
            Route::SetControl { group, item } => self
                .update_control(group, item, request.body())
                .map(|update| response.json(&update)),
        };

        result.unwrap_or_else(|err| response.error(&err))
    }

    /// Builds a request from its parts and dispatches it.
    ///
    /// `path` is taken as the request target as is, spaces included. An
    /// unknown `method` behaves like one sent over the wire.
    pub fn respond(&self, method: &str, path: &str, body: &[u8]) -> Response {
        let request = Request::from_parts(Method::from_bytes(method.as_bytes()), path, body);

        let mut response = Response::new();
        self.dispatch(&request, &mut response);
        response
    }
}

impl<C: ControlPlane, P: PlayerRegistry> Handler for Api<C, P> {
    async fn handle(&self, request: &Request, response: &mut Response) -> Handled {
        log::debug!(
            "{} {}",
            request.method().map_or("-", |m| m.as_str()),
            request.path()
        );

        self.dispatch(request, response)
    }
}

// Endpoints
impl<C: ControlPlane, P: PlayerRegistry> Api<C, P> {
    fn status_report(&self) -> StatusReport {
        let players = self
            .players
            .loaded_tracks()
            .into_iter()
            .map(|(group, track)| {
                let mut status = self.read_player(&group, Some(track.as_ref()));
                status.group = Some(group);
                status
            })
            .collect();

        let master = |item| self.controls.value(MASTER_GROUP, item);

        StatusReport {
            players,
            master: MasterStatus {
                volume: master("volume"),
                balance: master("balance"),
                head_volume: master("headVolume"),
                head_mix: master("headMix"),
            },
        }
    }

    fn player_status(&self, group: &str) -> Result<PlayerStatus, ApiError> {
        let track = self.players.track_for(group);
        let status = self.read_player(group, track.as_deref());

        if status.is_empty() {
            return Err(ApiError::PlayerNotFound {
                group: group.to_owned(),
            });
        }
        Ok(status)
    }

    fn control_value(&self, group: String, item: String) -> Result<ControlValue, ApiError> {
        match self.controls.value(&group, &item) {
            Some(value) => Ok(ControlValue { group, item, value }),
            None => Err(ApiError::ControlNotFound { group, item }),
        }
    }

    fn update_control(
        &self,
        group: String,
        item: String,
        body: &[u8],
    ) -> Result<ControlUpdate, ApiError> {
        let value = requested_value(body)?;

        if !self.controls.exists(&group, &item) {
            return Err(ApiError::ControlNotFound { group, item });
        }

        self.controls.set(&group, &item, value);
        let value = self.controls.get(&group, &item);

        Ok(ControlUpdate {
            success: true,
            group,
            item,
            value,
        })
    }

    fn read_player(&self, group: &str, track: Option<&dyn Track>) -> PlayerStatus {
        let control = |item| self.controls.value(group, item);

        PlayerStatus {
            group: None,
            track: track.map(TrackMetadata::from_track),
            play: control("play"),
            play_indicator: control("play_indicator"),
            playposition: control("playposition"),
            duration: control("duration"),
            volume: control("volume"),
            pregain: control("pregain"),
            bpm: control("bpm"),
            rate: control("rate"),
            tempo_ratio: control("tempo_ratio"),
            keylock: control("keylock"),
            repeat: control("repeat"),
            loop_enabled: control("loop_enabled"),
            track_loaded: control("track_loaded"),
        }
    }
}

/// Extracts the numeric `value` of a control write body.
fn requested_value(body: &[u8]) -> Result<f64, ApiError> {
    let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(body) else {
        return Err(ApiError::InvalidJson);
    };

    match object.get("value") {
        None => Err(ApiError::MissingValue),
        Some(value) => value.as_f64().ok_or(ApiError::InvalidValue),
    }
}

//

/// `GET /api/control/{group}/{item}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlValue {
    pub group: String,
    pub item: String,
    pub value: f64,
}

/// `POST /api/control/{group}/{item}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlUpdate {
    pub success: bool,
    pub group: String,
    pub item: String,
    /// Value read back after the write.
    pub value: f64,
}

/// Playback state of one player. Missing controls serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    /// Only set inside a [`StatusReport`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub track: Option<TrackMetadata>,
    pub play: Option<f64>,
    pub play_indicator: Option<f64>,
    pub playposition: Option<f64>,
    pub duration: Option<f64>,
    pub volume: Option<f64>,
    pub pregain: Option<f64>,
    pub bpm: Option<f64>,
    pub rate: Option<f64>,
    pub tempo_ratio: Option<f64>,
    pub keylock: Option<f64>,
    pub repeat: Option<f64>,
    pub loop_enabled: Option<f64>,
    pub track_loaded: Option<f64>,
}

impl PlayerStatus {
    /// `true` when there is no track and none of the controls exist.
    pub fn is_empty(&self) -> bool {
        self.track.is_none()
            && [
                self.play,
                self.play_indicator,
                self.playposition,
                self.duration,
                self.volume,
                self.pregain,
                self.bpm,
                self.rate,
                self.tempo_ratio,
                self.keylock,
                self.repeat,
                self.loop_enabled,
                self.track_loaded,
            ]
            .iter()
            .all(Option::is_none)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterStatus {
    pub volume: Option<f64>,
    pub balance: Option<f64>,
    #[serde(rename = "headVolume")]
    pub head_volume: Option<f64>,
    #[serde(rename = "headMix")]
    pub head_mix: Option<f64>,
}

/// `GET /api/status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub players: Vec<PlayerStatus>,
    pub master: MasterStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub album_artist: String,
    pub genre: String,
    pub composer: String,
    pub year: String,
    pub comment: String,
    pub duration: f64,
    pub bpm: f64,
    pub key: String,
    pub location: String,
    pub file_type: String,
}

impl TrackMetadata {
    pub fn from_track(track: &dyn Track) -> Self {
        TrackMetadata {
            artist: track.artist().to_owned(),
            title: track.title().to_owned(),
            album: track.album().to_owned(),
            album_artist: track.album_artist().to_owned(),
            genre: track.genre().to_owned(),
            composer: track.composer().to_owned(),
            year: track.year().to_owned(),
            comment: track.comment().to_owned(),
            duration: track.duration(),
            bpm: track.bpm(),
            key: track.key_text().to_owned(),
            location: track.location().to_owned(),
            file_type: track.file_type().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryControls, MemoryPlayers, TrackInfo};

    fn api() -> Api<MemoryControls, MemoryPlayers> {
        let controls = Arc::new(MemoryControls::new());
        controls.register_range("[Channel1]", "volume", 1.0, 0.0, 1.0);
        controls.register("[Channel1]", "play", 0.0);
        controls.register("[Channel2]", "play", 1.0);
        controls.register("[Master]", "volume", 0.8);
        controls.register("[Master]", "headMix", 0.0);

        let players = Arc::new(MemoryPlayers::new());
        players.load(
            "[Channel1]",
            TrackInfo::new("Artist", "Title").with_duration(215.5).with_bpm(124.0),
        );

        Api::new(controls, players)
    }

    fn json(resp: &Response) -> Value {
        serde_json::from_slice(resp.body_bytes()).unwrap()
    }

    #[test]
    fn write_body_validation() {
        #[rustfmt::skip]
        let cases: [(&[u8], Result<f64, ApiError>); 11] = [
            (br#"{"value": 0.5}"#,            Ok(0.5)),
            (br#"{"value": 1}"#,              Ok(1.0)),
            (br#"{"value": -3, "x": true}"#,  Ok(-3.0)),
            (br#" {"value":2.5e-1} "#,        Ok(0.25)),

            (b"not-json",                     Err(ApiError::InvalidJson)),
            (b"",                             Err(ApiError::InvalidJson)),
            (b"[1, 2]",                       Err(ApiError::InvalidJson)),
            (b"0.5",                          Err(ApiError::InvalidJson)),
            (b"{}",                           Err(ApiError::MissingValue)),
            (br#"{"value": "0.5"}"#,          Err(ApiError::InvalidValue)),
            (br#"{"value": null}"#,           Err(ApiError::InvalidValue)),
        ];

        for (body, expected) in cases {
            assert_eq!(requested_value(body), expected, "{:?}", String::from_utf8_lossy(body));
        }
    }

    #[test]
    fn get_control() {
        let api = api();

        let resp = api.respond("GET", "/api/control/Channel1/volume", b"");
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(
            json(&resp),
            serde_json::json!({"group": "[Channel1]", "item": "volume", "value": 1.0})
        );

        let resp = api.respond("GET", "/api/control/[Channel9]/volume", b"");
        assert_eq!(resp.status_code(), StatusCode::NotFound);
        assert_eq!(
            json(&resp),
            serde_json::json!({"error": "Control not found", "group": "[Channel9]", "item": "volume"})
        );
    }

    #[test]
    fn set_control_reads_back() {
        let api = api();

        let resp = api.respond("POST", "/api/control/[Channel1]/volume", br#"{"value": 0.5}"#);
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(
            json(&resp),
            serde_json::json!({"success": true, "group": "[Channel1]", "item": "volume", "value": 0.5})
        );

        // Clamped by the control plane
        let resp = api.respond("POST", "/api/control/Channel1/volume", br#"{"value": 7}"#);
        assert_eq!(json(&resp)["value"], 1.0);
        assert_eq!(api.controls().get("[Channel1]", "volume"), 1.0);
    }

    #[test]
    fn path_with_spaces() {
        let api = api();
        api.controls().register("[My Deck]", "play", 1.0);

        let resp = api.respond("GET", "/api/control/My Deck/play", b"");
        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(
            json(&resp),
            serde_json::json!({"group": "[My Deck]", "item": "play", "value": 1.0})
        );

        let resp = api.respond("BREW", "/api/control/My Deck/play", b"");
        assert_eq!(resp.status_code(), StatusCode::MethodNotAllowed);
    }

    #[test]
    fn set_control_errors() {
        let api = api();

        #[rustfmt::skip]
        let cases: [(&str, &[u8], StatusCode, &str); 5] = [
            ("/api/control/Channel1/volume", b"not-json",          StatusCode::BadRequest, "Invalid JSON body. Expected {\"value\": <number>}"),
            ("/api/control/Channel1/volume", b"{}",                StatusCode::BadRequest, "Missing 'value' field in request body"),
            ("/api/control/Channel1/volume", br#"{"value":"x"}"#,  StatusCode::BadRequest, "'value' field must be a number"),
            ("/api/control/Channel1/nope",   br#"{"value":1}"#,    StatusCode::NotFound,   "Control not found"),
            // Body is validated before the control is looked up
            ("/api/control/Channel1/nope",   b"{}",                StatusCode::BadRequest, "Missing 'value' field in request body"),
        ];

        for (path, body, status, error) in cases {
            let resp = api.respond("POST", path, body);

            assert_eq!(resp.status_code(), status, "{path}");
            assert_eq!(json(&resp)["error"], error, "{path}");
        }
        assert_eq!(api.controls().get("[Channel1]", "volume"), 1.0);
    }

    #[test]
    fn player_status() {
        let api = api();

        let resp = api.respond("GET", "/api/player/Channel1", b"");
        assert_eq!(resp.status_code(), StatusCode::Ok);

        let body = json(&resp);
        assert!(body.get("group").is_none());
        assert_eq!(body["track"]["artist"], "Artist");
        assert_eq!(body["track"]["duration"], 215.5);
        assert_eq!(body["track"]["key"], "");
        assert_eq!(body["volume"], 1.0);
        assert_eq!(body["play"], 0.0);
        assert!(body["rate"].is_null());
        assert_eq!(body.as_object().unwrap().len(), 14);
    }

    #[test]
    fn player_without_track() {
        let api = api();

        let body = json(&api.respond("GET", "/api/player/Channel2", b""));
        assert!(body["track"].is_null());
        assert_eq!(body["play"], 1.0);
    }

    #[test]
    fn unknown_player() {
        let resp = api().respond("GET", "/api/player/nonexistent-group", b"");

        assert_eq!(resp.status_code(), StatusCode::NotFound);
        assert_eq!(
            json(&resp),
            serde_json::json!({"error": "Player not found", "group": "[nonexistent-group]"})
        );
    }

    #[test]
    fn status_report() {
        let api = api();
        api.players().load("[Sampler1]", TrackInfo::new("B", "Second"));

        let body = json(&api.respond("GET", "/api/status", b""));

        let players = body["players"].as_array().unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0]["group"], "[Channel1]");
        assert_eq!(players[1]["group"], "[Sampler1]");
        assert_eq!(players[1]["track"]["title"], "Second");

        assert_eq!(
            body["master"],
            serde_json::json!({"volume": 0.8, "balance": null, "headVolume": null, "headMix": 0.0})
        );
    }

    #[test]
    fn preflight_and_routing_errors() {
        let api = api();

        #[rustfmt::skip]
        let cases = [
            ("OPTIONS", "/api/control/a/b", StatusCode::NoContent),
            ("OPTIONS", "/elsewhere",       StatusCode::NoContent),
            ("GET",     "/status",          StatusCode::NotFound),
            ("GET",     "/api",             StatusCode::BadRequest),
            ("DELETE",  "/api/control/Channel1/volume", StatusCode::MethodNotAllowed),
            ("GET",     "/api/unknown",     StatusCode::NotFound),
        ];

        for (method, path, status) in cases {
            let resp = api.respond(method, path, b"");
            assert_eq!(resp.status_code(), status, "{method} {path}");
        }

        assert!(api.respond("OPTIONS", "/", b"").body_bytes().is_empty());
    }

    #[test]
    fn empty_player_status() {
        let api = api();
        let status = api.read_player("[Nothing]", None);

        assert!(status.is_empty());
        assert!(!api.read_player("[Channel2]", None).is_empty());
    }
}
