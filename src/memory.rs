//! In-process control plane and player registry.
//!
//! Used by the bundled binary and by tests. Applications embedding the API
//! implement [`ControlPlane`] and [`PlayerRegistry`] over their own state.

use crate::api::control::{ControlPlane, PlayerRegistry, Track};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

#[derive(Debug, Clone, Copy)]
struct Control {
    value: f64,
    range: Option<(f64, f64)>,
}

impl Control {
    #[inline]
    fn bounded(&self, value: f64) -> f64 {
        match self.range {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        }
    }
}

/// Thread-safe map of `group -> item -> value`.
///
/// Controls must be registered before they can be read or written. A control
/// registered with a range clamps every write into `[min, max]`.
///
/// # Examples
/// ```
/// use control_rest::{memory::MemoryControls, ControlPlane};
///
/// let controls = MemoryControls::new();
/// controls.register_range("[Channel1]", "volume", 1.0, 0.0, 1.0);
///
/// controls.set("[Channel1]", "volume", 3.0);
/// assert_eq!(controls.value("[Channel1]", "volume"), Some(1.0));
/// assert_eq!(controls.value("[Channel1]", "rate"), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryControls {
    groups: RwLock<HashMap<String, HashMap<String, Control>>>,
}

impl MemoryControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an unbounded control, replacing any previous one.
    pub fn register(&self, group: &str, item: &str, value: f64) {
        self.insert(group, item, Control { value, range: None });
    }

    /// Registers a control that clamps writes into `[min, max]`.
    ///
    /// A range with `min > max` (or a `NaN` bound) registers an unbounded
    /// control.
    pub fn register_range(&self, group: &str, item: &str, value: f64, min: f64, max: f64) {
        let control = Control {
            value,
            range: (min <= max).then_some((min, max)),
        };
        self.insert(group, item, Control {
            value: control.bounded(value),
            ..control
        });
    }

    /// Removes a control, returning `true` if it existed.
    pub fn unregister(&self, group: &str, item: &str) -> bool {
        let mut groups = self.groups.write();

        let Some(items) = groups.get_mut(group) else {
            return false;
        };
        let removed = items.remove(item).is_some();
        if items.is_empty() {
            groups.remove(group);
        }
        removed
    }

    /// Number of registered controls.
    pub fn len(&self) -> usize {
        self.groups.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    fn insert(&self, group: &str, item: &str, control: Control) {
        self.groups
            .write()
            .entry(group.to_owned())
            .or_default()
            .insert(item.to_owned(), control);
    }

    #[inline]
    fn lookup(&self, group: &str, item: &str) -> Option<Control> {
        self.groups
            .read()
            .get(group)
            .and_then(|items| items.get(item))
            .copied()
    }
}

impl ControlPlane for MemoryControls {
    fn exists(&self, group: &str, item: &str) -> bool {
        self.lookup(group, item).is_some()
    }

    /// Unknown controls read as `0.0`.
    fn get(&self, group: &str, item: &str) -> f64 {
        self.lookup(group, item).map_or(0.0, |c| c.value)
    }

    /// Writes to unknown controls are ignored.
    fn set(&self, group: &str, item: &str, value: f64) {
        let mut groups = self.groups.write();

        if let Some(control) = groups.get_mut(group).and_then(|items| items.get_mut(item)) {
            control.value = control.bounded(value);
        }
    }

    fn value(&self, group: &str, item: &str) -> Option<f64> {
        self.lookup(group, item).map(|c| c.value)
    }
}

//

/// Track metadata held in memory.
///
/// ```
/// use control_rest::{memory::TrackInfo, Track};
///
/// let track = TrackInfo::new("Artist", "Title").with_bpm(128.0).with_key("8A");
/// assert_eq!(track.key_text(), "8A");
/// assert_eq!(track.album(), "");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackInfo {
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

impl TrackInfo {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        TrackInfo {
            artist: artist.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the file location and derives the file type from its extension.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self.file_type = self
            .location
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        self
    }
}

impl Track for TrackInfo {
    fn artist(&self) -> &str {
        &self.artist
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn album(&self) -> &str {
        &self.album
    }
    fn album_artist(&self) -> &str {
        &self.album_artist
    }
    fn genre(&self) -> &str {
        &self.genre
    }
    fn composer(&self) -> &str {
        &self.composer
    }
    fn year(&self) -> &str {
        &self.year
    }
    fn comment(&self) -> &str {
        &self.comment
    }
    fn duration(&self) -> f64 {
        self.duration
    }
    fn bpm(&self) -> f64 {
        self.bpm
    }
    fn key_text(&self) -> &str {
        &self.key
    }
    fn location(&self) -> &str {
        &self.location
    }
    fn file_type(&self) -> &str {
        &self.file_type
    }
}

/// Players keyed by group, each holding at most one track.
#[derive(Debug, Default)]
pub struct MemoryPlayers {
    tracks: RwLock<BTreeMap<String, Arc<TrackInfo>>>,
}

impl MemoryPlayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `track` into `group`, returning the track it replaced.
    pub fn load(&self, group: &str, track: TrackInfo) -> Option<Arc<TrackInfo>> {
        self.tracks.write().insert(group.to_owned(), Arc::new(track))
    }

    /// Unloads the track of `group`.
    pub fn eject(&self, group: &str) -> Option<Arc<TrackInfo>> {
        self.tracks.write().remove(group)
    }
}

impl PlayerRegistry for MemoryPlayers {
    fn loaded_tracks(&self) -> BTreeMap<String, Arc<dyn Track>> {
        self.tracks
            .read()
            .iter()
            .map(|(group, track)| (group.clone(), track.clone() as Arc<dyn Track>))
            .collect()
    }

    fn track_for(&self, group: &str) -> Option<Arc<dyn Track>> {
        self.tracks
            .read()
            .get(group)
            .map(|track| track.clone() as Arc<dyn Track>)
    }
}

//

/// Decks registered by [`seed_demo`].
pub const DEMO_DECKS: [&str; 4] = ["[Channel1]", "[Channel2]", "[Channel3]", "[Channel4]"];

/// Registers the usual deck and master controls and loads a track into the
/// first two decks.
pub fn seed_demo(controls: &MemoryControls, players: &MemoryPlayers) {
    #[rustfmt::skip]
    let deck: [(&str, f64, Option<(f64, f64)>); 13] = [
        ("play",           0.0,   Some((0.0, 1.0))),
        ("play_indicator", 0.0,   Some((0.0, 1.0))),
        ("playposition",   0.0,   Some((0.0, 1.0))),
        ("duration",       0.0,   None),
        ("volume",         1.0,   Some((0.0, 1.0))),
        ("pregain",        1.0,   Some((0.0, 4.0))),
        ("bpm",            0.0,   None),
        ("rate",           0.0,   Some((-1.0, 1.0))),
        ("tempo_ratio",    1.0,   None),
        ("keylock",        0.0,   Some((0.0, 1.0))),
        ("repeat",         0.0,   Some((0.0, 1.0))),
        ("loop_enabled",   0.0,   Some((0.0, 1.0))),
        ("track_loaded",   0.0,   Some((0.0, 1.0))),
    ];

    #[rustfmt::skip]
    let master: [(&str, f64, f64, f64); 4] = [
        ("volume",     1.0, 0.0,  5.0),
        ("balance",    0.0, -1.0, 1.0),
        ("headVolume", 1.0, 0.0,  5.0),
        ("headMix",    0.0, -1.0, 1.0),
    ];

    for group in DEMO_DECKS {
        for (item, value, range) in deck {
            match range {
                Some((min, max)) => controls.register_range(group, item, value, min, max),
                None => controls.register(group, item, value),
            }
        }
    }
    for (item, value, min, max) in master {
        controls.register_range("[Master]", item, value, min, max);
    }

    let tracks = [
        TrackInfo::new("Demo Artist", "First Light")
            .with_album("Demo Sessions")
            .with_duration(245.0)
            .with_bpm(124.0)
            .with_key("8A")
            .with_location("/music/demo/first_light.flac"),
        TrackInfo::new("Demo Artist", "Night Drive")
            .with_album("Demo Sessions")
            .with_duration(312.5)
            .with_bpm(128.0)
            .with_key("11B")
            .with_location("/music/demo/night_drive.mp3"),
    ];

    for (group, track) in DEMO_DECKS.into_iter().zip(tracks) {
        controls.set(group, "duration", track.duration);
        controls.set(group, "bpm", track.bpm);
        controls.set(group, "track_loaded", 1.0);
        players.load(group, track);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_clamp() {
        let controls = MemoryControls::new();
        controls.register_range("[Channel1]", "volume", 0.5, 0.0, 1.0);
        controls.register("[Channel1]", "bpm", 120.0);

        #[rustfmt::skip]
        let cases = [
            ("volume", 0.25,  0.25),
            ("volume", 2.0,   1.0),
            ("volume", -1.0,  0.0),
            ("bpm",    999.0, 999.0),
            ("bpm",    -5.0,  -5.0),
        ];

        for (item, set, expected) in cases {
            controls.set("[Channel1]", item, set);
            assert_eq!(controls.get("[Channel1]", item), expected, "{item} <- {set}");
        }
    }

    #[test]
    fn initial_value_is_clamped() {
        let controls = MemoryControls::new();
        controls.register_range("[Master]", "balance", 3.0, -1.0, 1.0);

        assert_eq!(controls.value("[Master]", "balance"), Some(1.0));
    }

    #[test]
    fn invalid_range_is_unbounded() {
        let controls = MemoryControls::new();
        controls.register_range("[X]", "reversed", 0.0, 1.0, -1.0);
        controls.register_range("[X]", "nan", 0.0, f64::NAN, 1.0);

        controls.set("[X]", "reversed", 10.0);
        controls.set("[X]", "nan", 10.0);

        assert_eq!(controls.get("[X]", "reversed"), 10.0);
        assert_eq!(controls.get("[X]", "nan"), 10.0);
    }

    #[test]
    fn unknown_controls() {
        let controls = MemoryControls::new();
        controls.set("[Channel1]", "volume", 1.0);

        assert!(!controls.exists("[Channel1]", "volume"));
        assert_eq!(controls.get("[Channel1]", "volume"), 0.0);
        assert_eq!(controls.value("[Channel1]", "volume"), None);
        assert!(controls.is_empty());
    }

    #[test]
    fn unregister() {
        let controls = MemoryControls::new();
        controls.register("[A]", "x", 1.0);
        controls.register("[A]", "y", 2.0);
        assert_eq!(controls.len(), 2);

        assert!(controls.unregister("[A]", "x"));
        assert!(!controls.unregister("[A]", "x"));
        assert!(!controls.unregister("[B]", "x"));
        assert_eq!(controls.len(), 1);

        assert!(controls.unregister("[A]", "y"));
        assert!(controls.is_empty());
    }

    #[test]
    fn players_are_ordered_by_group() {
        let players = MemoryPlayers::new();
        players.load("[Sampler1]", TrackInfo::new("c", "3"));
        players.load("[Channel2]", TrackInfo::new("b", "2"));
        players.load("[Channel1]", TrackInfo::new("a", "1"));

        let groups: Vec<_> = players.loaded_tracks().into_keys().collect();
        assert_eq!(groups, ["[Channel1]", "[Channel2]", "[Sampler1]"]);

        assert!(players.eject("[Channel2]").is_some());
        assert!(players.track_for("[Channel2]").is_none());
        assert_eq!(players.track_for("[Channel1]").unwrap().title(), "1");
    }

    #[test]
    fn load_replaces_track() {
        let players = MemoryPlayers::new();

        assert!(players.load("[Channel1]", TrackInfo::new("a", "old")).is_none());
        let old = players.load("[Channel1]", TrackInfo::new("a", "new")).unwrap();

        assert_eq!(old.title, "old");
        assert_eq!(players.track_for("[Channel1]").unwrap().title(), "new");
    }

    #[test]
    fn file_type_from_location() {
        #[rustfmt::skip]
        let cases = [
            ("/music/a.MP3",        "mp3"),
            ("/music/b.tar.flac",   "flac"),
            ("/music/no_extension", ""),
        ];

        for (location, expected) in cases {
            assert_eq!(TrackInfo::default().with_location(location).file_type(), expected);
        }
    }

    #[test]
    fn demo_state() {
        let controls = MemoryControls::new();
        let players = MemoryPlayers::new();
        seed_demo(&controls, &players);

        assert_eq!(controls.len(), DEMO_DECKS.len() * 13 + 4);
        assert_eq!(players.loaded_tracks().len(), 2);
        assert_eq!(controls.value("[Channel1]", "track_loaded"), Some(1.0));
        assert_eq!(controls.value("[Channel2]", "bpm"), Some(128.0));
        assert_eq!(controls.value("[Channel3]", "track_loaded"), Some(0.0));
        assert_eq!(controls.value("[Master]", "headMix"), Some(0.0));
    }
}
