//! In-memory host used by the simulator binary and the test suite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{FilterKind, FilterSettings, Host, SourceKind};

/// One recorded host mutation, in call order. The log is what lets tests
/// assert that animation ticks land serialized and in sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    CreateFilter {
        source: String,
        filter: String,
    },
    UpdateFilter {
        source: String,
        filter: String,
        settings: FilterSettings,
    },
    RemoveFilter {
        source: String,
        filter: String,
    },
    MediaRestart {
        source: String,
    },
}

#[derive(Debug, Clone)]
struct MockFilter {
    name: String,
    kind: FilterKind,
    settings: FilterSettings,
}

#[derive(Debug, Clone)]
struct MockSource {
    kind: SourceKind,
    width: u32,
    filters: Vec<MockFilter>,
}

impl MockSource {
    /// The width the compositor reports: intrinsic width minus whatever
    /// the crop filters currently hide.
    fn reported_width(&self) -> u32 {
        let cropped: i64 = self
            .filters
            .iter()
            .filter(|f| f.kind == FilterKind::Crop)
            .filter_map(|f| f.settings.right)
            .sum();
        (self.width as i64 - cropped.max(0)).max(0) as u32
    }
}

#[derive(Debug, Default)]
struct MockInner {
    sources: BTreeMap<String, MockSource>,
    log: Vec<HostCall>,
}

/// A mock compositor: a flat map of named sources, each with an ordered
/// filter list, plus a call log of every mutation.
///
/// # Example
///
/// ```
/// use overbar::host::{FilterKind, FilterSettings, Host, MockHost, SourceKind};
///
/// let host = MockHost::new();
/// host.add_source("bar", SourceKind::Image, 500);
/// host.create_filter("bar", "crop", FilterKind::Crop, FilterSettings::right(500));
/// assert_eq!(host.filter_settings("bar", "crop").unwrap().right, Some(500));
/// ```
#[derive(Debug, Default)]
pub struct MockHost {
    inner: Mutex<MockInner>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Replaces any existing source of the same name.
    pub fn add_source(&self, name: &str, kind: SourceKind, width: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.sources.insert(
            name.to_string(),
            MockSource {
                kind,
                width,
                filters: Vec::new(),
            },
        );
    }

    /// Drain and return the call log.
    pub fn take_log(&self) -> Vec<HostCall> {
        std::mem::take(&mut self.inner.lock().unwrap().log)
    }

    /// Number of recorded calls without draining.
    pub fn log_len(&self) -> usize {
        self.inner.lock().unwrap().log.len()
    }

    /// Names of the filters on a source, in attachment order.
    pub fn filter_names(&self, source: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .sources
            .get(source)
            .map(|s| s.filters.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }
}

impl Host for MockHost {
    fn source_kind(&self, name: &str) -> Option<SourceKind> {
        self.inner.lock().unwrap().sources.get(name).map(|s| s.kind)
    }

    fn source_width(&self, name: &str) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .sources
            .get(name)
            .map(|s| s.reported_width())
    }

    fn source_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().sources.keys().cloned().collect()
    }

    fn filter_settings(&self, source: &str, filter: &str) -> Option<FilterSettings> {
        let inner = self.inner.lock().unwrap();
        inner
            .sources
            .get(source)?
            .filters
            .iter()
            .find(|f| f.name == filter)
            .map(|f| f.settings)
    }

    fn create_filter(&self, source: &str, filter: &str, kind: FilterKind, settings: FilterSettings) {
        let mut inner = self.inner.lock().unwrap();
        let Some(src) = inner.sources.get_mut(source) else {
            return;
        };
        if src.filters.iter().any(|f| f.name == filter) {
            return;
        }
        src.filters.push(MockFilter {
            name: filter.to_string(),
            kind,
            settings,
        });
        inner.log.push(HostCall::CreateFilter {
            source: source.to_string(),
            filter: filter.to_string(),
        });
    }

    fn update_filter(&self, source: &str, filter: &str, settings: FilterSettings) {
        let mut inner = self.inner.lock().unwrap();
        let Some(src) = inner.sources.get_mut(source) else {
            return;
        };
        let Some(f) = src.filters.iter_mut().find(|f| f.name == filter) else {
            return;
        };
        f.settings.merge(settings);
        inner.log.push(HostCall::UpdateFilter {
            source: source.to_string(),
            filter: filter.to_string(),
            settings,
        });
    }

    fn remove_filter(&self, source: &str, filter: &str) {
        let mut inner = self.inner.lock().unwrap();
        let Some(src) = inner.sources.get_mut(source) else {
            return;
        };
        let before = src.filters.len();
        src.filters.retain(|f| f.name != filter);
        if src.filters.len() != before {
            inner.log.push(HostCall::RemoveFilter {
                source: source.to_string(),
                filter: filter.to_string(),
            });
        }
    }

    fn media_restart(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.sources.contains_key(name) {
            return;
        }
        inner.log.push(HostCall::MediaRestart {
            source: name.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_source_fails_soft() {
        let host = MockHost::new();
        assert_eq!(host.source_width("nope"), None);
        host.update_filter("nope", "crop", FilterSettings::right(10));
        host.media_restart("nope");
        assert_eq!(host.log_len(), 0);
    }

    #[test]
    fn update_merges_partial_settings() {
        let host = MockHost::new();
        host.add_source("bar", SourceKind::Image, 500);
        host.create_filter("bar", "crop", FilterKind::Crop, FilterSettings::right(500));
        host.update_filter("bar", "crop", FilterSettings::opacity(50.0));
        let s = host.filter_settings("bar", "crop").unwrap();
        assert_eq!(s.right, Some(500));
        assert_eq!(s.opacity, Some(50.0));
    }

    #[test]
    fn duplicate_create_is_ignored() {
        let host = MockHost::new();
        host.add_source("bar", SourceKind::Image, 500);
        host.create_filter("bar", "crop", FilterKind::Crop, FilterSettings::right(1));
        host.create_filter("bar", "crop", FilterKind::Crop, FilterSettings::right(2));
        assert_eq!(host.filter_settings("bar", "crop").unwrap().right, Some(1));
        assert_eq!(host.filter_names("bar").len(), 1);
    }
}
