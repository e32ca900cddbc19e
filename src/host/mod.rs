//! The seam between the controller and the compositor that owns the overlay.
//!
//! Everything the controller needs from the host fits in a handful of
//! name-keyed operations: look up a source, read or write a filter, restart
//! a media source. Lookups return `Option` rather than `Result` — a missing
//! source is an expected steady state (the user hasn't configured one yet),
//! not a failure.

pub mod mock;

pub use mock::MockHost;

/// What kind of thing a named source is. Only media-like kinds may be
/// restarted for sound cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Browser,
    Text,
    Media,
    Playlist,
    Other,
}

impl SourceKind {
    /// Whether `media_restart` is meaningful for this kind.
    pub fn is_playable(self) -> bool {
        matches!(self, SourceKind::Media | SourceKind::Playlist)
    }
}

/// The two filter types the controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Crop,
    Color,
}

/// Typed filter settings. Fields left as `None` are untouched on update,
/// mirroring the host's partial-update semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterSettings {
    /// Pixels cropped from the right edge.
    pub right: Option<i64>,
    /// Opacity percent, 0–100.
    pub opacity: Option<f64>,
}

impl FilterSettings {
    pub fn right(px: i64) -> Self {
        Self {
            right: Some(px),
            ..Self::default()
        }
    }

    pub fn opacity(percent: f64) -> Self {
        Self {
            opacity: Some(percent),
            ..Self::default()
        }
    }

    /// Overlay `other`'s set fields onto self.
    pub fn merge(&mut self, other: FilterSettings) {
        if other.right.is_some() {
            self.right = other.right;
        }
        if other.opacity.is_some() {
            self.opacity = other.opacity;
        }
    }
}

/// Narrow surface over the compositor's source/filter object model.
///
/// Implementations must be cheap and non-blocking: the animation loops call
/// `update_filter` at ~60 Hz while holding the controller's state lock.
pub trait Host: Send + Sync {
    /// Kind of the named source, or `None` if it does not resolve.
    fn source_kind(&self, name: &str) -> Option<SourceKind>;

    /// Intrinsic width of the named source in pixels, or `None` if it does
    /// not resolve.
    fn source_width(&self, name: &str) -> Option<u32>;

    /// All source names known to the host, for configuration listings.
    fn source_names(&self) -> Vec<String>;

    /// Current settings of a named filter on a source, or `None` if either
    /// the source or the filter is missing.
    fn filter_settings(&self, source: &str, filter: &str) -> Option<FilterSettings>;

    /// Add a filter to a source. No-op if the source is missing or a filter
    /// with that name already exists.
    fn create_filter(&self, source: &str, filter: &str, kind: FilterKind, settings: FilterSettings);

    /// Merge `settings` into a named filter. No-op if source or filter is
    /// missing.
    fn update_filter(&self, source: &str, filter: &str, settings: FilterSettings);

    /// Remove a named filter. No-op if source or filter is missing.
    fn remove_filter(&self, source: &str, filter: &str);

    /// Restart a playable media source from the beginning. No-op for
    /// missing sources; callers gate on `SourceKind::is_playable` first.
    fn media_restart(&self, name: &str);
}
