//! Interfaces to the live application state served by the API.
//!
//! The server never owns control values, players or tracks. The host
//! application implements these traits and hands them to [`Api`](crate::Api).

use std::{collections::BTreeMap, sync::Arc};

/// Keyed registry of numeric values addressed by `(group, item)`,
/// e.g. `("[Channel1]", "volume")`.
pub trait ControlPlane: Send + Sync + 'static {
    /// Returns `true` if the control exists.
    fn exists(&self, group: &str, item: &str) -> bool;

    /// Current value of an existing control.
    fn get(&self, group: &str, item: &str) -> f64;

    /// Requests a new value. The control plane may clamp or ignore it, so
    /// callers read the control again to observe the effective value.
    fn set(&self, group: &str, item: &str, value: f64);

    /// Current value, or `None` if the control does not exist.
    fn value(&self, group: &str, item: &str) -> Option<f64> {
        self.exists(group, item).then(|| self.get(group, item))
    }
}

/// Registry of players and the tracks loaded into them.
pub trait PlayerRegistry: Send + Sync + 'static {
    /// Every player group that currently has a track, ordered by group.
    fn loaded_tracks(&self) -> BTreeMap<String, Arc<dyn Track>>;

    /// Track loaded into `group`, if any.
    fn track_for(&self, group: &str) -> Option<Arc<dyn Track>>;
}

/// Read-only metadata of a loaded track.
pub trait Track: Send + Sync {
    fn artist(&self) -> &str;
    fn title(&self) -> &str;
    fn album(&self) -> &str;
    fn album_artist(&self) -> &str;
    fn genre(&self) -> &str;
    fn composer(&self) -> &str;
    fn year(&self) -> &str;
    fn comment(&self) -> &str;
    /// Duration in seconds.
    fn duration(&self) -> f64;
    fn bpm(&self) -> f64;
    /// Musical key in its display notation.
    fn key_text(&self) -> &str;
    fn location(&self) -> &str;
    fn file_type(&self) -> &str;
}
