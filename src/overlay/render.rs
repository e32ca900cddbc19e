//! Translates (progress, opacity) into host filter updates.

use std::sync::Arc;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::host::{FilterKind, FilterSettings, Host};

/// Crop filter on the overlay source; its `right` field hides the bar's
/// unfilled fraction.
pub const FILTER_CROP: &str = "crop";
/// Opacity filter on the overlay source.
pub const FILTER_OPACITY: &str = "color_correction";
/// Opacity filter on the optional container source, created on demand.
pub const FILTER_CONTAINER: &str = "container_opacity";

#[derive(Debug, Default)]
struct RenderTargets {
    source: String,
    container: String,
    /// Cached full width of the overlay source (base width + any existing
    /// crop-right offset). 0 when the source does not resolve.
    width: u32,
}

/// The render half of the controller: owns the host handle, the configured
/// source names, and the cached width. Stateless with respect to progress —
/// opacity and crop are always derived from the arguments to `apply`.
pub struct RenderAdapter {
    host: Arc<dyn Host>,
    targets: Mutex<RenderTargets>,
}

impl RenderAdapter {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            targets: Mutex::new(RenderTargets::default()),
        }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Point the adapter at a new overlay/container pair and recompute the
    /// cached width.
    pub fn set_sources(&self, source: &str, container: &str) {
        {
            let mut t = self.targets.lock().unwrap();
            t.source = source.to_string();
            t.container = container.to_string();
        }
        self.measure_width();
    }

    pub fn source_name(&self) -> String {
        self.targets.lock().unwrap().source.clone()
    }

    /// Whether the configured overlay source currently resolves on the host.
    pub fn source_resolved(&self) -> bool {
        let name = self.source_name();
        !name.is_empty() && self.host.source_kind(&name).is_some()
    }

    pub fn cached_width(&self) -> u32 {
        self.targets.lock().unwrap().width
    }

    /// Recompute the full overlay width: intrinsic width plus whatever the
    /// crop filter is currently hiding. Returns 0 if the source does not
    /// resolve (fail-soft, no error).
    pub fn measure_width(&self) -> u32 {
        let mut t = self.targets.lock().unwrap();
        if t.source.is_empty() {
            t.width = 0;
            return 0;
        }
        let Some(base) = self.host.source_width(&t.source) else {
            t.width = 0;
            return 0;
        };
        // Unloaded browser/image sources report width 1.
        let base = if base == 1 { 0 } else { base };

        let crop_right = self
            .host
            .filter_settings(&t.source, FILTER_CROP)
            .and_then(|s| s.right)
            .unwrap_or(0)
            .max(0) as u32;

        t.width = base + crop_right;
        debug!(source = %t.source, width = t.width, "measured overlay width");
        t.width
    }

    /// Idempotently (re)create the crop and opacity filters on the overlay
    /// source. Existing filters are removed first to avoid duplicates. The
    /// crop starts at full width, i.e. the bar starts hidden.
    pub fn ensure_filters(&self) {
        let width = self.measure_width();
        let t = self.targets.lock().unwrap();
        if t.source.is_empty() || self.host.source_kind(&t.source).is_none() {
            warn!(source = %t.source, "overlay source not found; filters not installed");
            return;
        }

        self.host.remove_filter(&t.source, FILTER_CROP);
        self.host.remove_filter(&t.source, FILTER_OPACITY);
        self.host.create_filter(
            &t.source,
            FILTER_CROP,
            FilterKind::Crop,
            FilterSettings::right(width as i64),
        );
        self.host.create_filter(
            &t.source,
            FILTER_OPACITY,
            FilterKind::Color,
            FilterSettings::opacity(100.0),
        );
    }

    /// Render one frame: crop the overlay to `progress` (0..1 of the cached
    /// width) at `opacity` percent, and mirror the opacity onto the
    /// container source. Missing filters skip their half of the update; a
    /// zero cached width makes the whole call a no-op.
    pub fn apply(&self, progress: f64, opacity: f64) {
        let t = self.targets.lock().unwrap();
        if t.source.is_empty() || self.host.source_kind(&t.source).is_none() {
            return;
        }
        if t.width == 0 {
            return;
        }

        let progress = progress.clamp(0.0, 1.0);
        let opacity = opacity.clamp(0.0, 100.0);
        let crop_right =
            (((1.0 - progress) * t.width as f64).round() as i64).clamp(0, t.width as i64);

        if self.host.filter_settings(&t.source, FILTER_CROP).is_some() {
            self.host
                .update_filter(&t.source, FILTER_CROP, FilterSettings::right(crop_right));
        }
        if self
            .host
            .filter_settings(&t.source, FILTER_OPACITY)
            .is_some()
        {
            self.host.update_filter(
                &t.source,
                FILTER_OPACITY,
                FilterSettings::opacity(opacity),
            );
        }

        self.apply_container(&t.container, opacity);
    }

    /// The container is never cropped but shares the bar's opacity. Its
    /// filter is created on first use.
    fn apply_container(&self, container: &str, opacity: f64) {
        if container.is_empty() || self.host.source_kind(container).is_none() {
            return;
        }
        if self.host.filter_settings(container, FILTER_CONTAINER).is_none() {
            self.host.create_filter(
                container,
                FILTER_CONTAINER,
                FilterKind::Color,
                FilterSettings::default(),
            );
        }
        self.host
            .update_filter(container, FILTER_CONTAINER, FilterSettings::opacity(opacity));
    }

    /// Drop the cached width so a later `apply` is inert until the adapter
    /// is reconfigured.
    pub fn clear(&self) {
        let mut t = self.targets.lock().unwrap();
        t.width = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MockHost, SourceKind};

    fn adapter_with(width: u32) -> (Arc<MockHost>, RenderAdapter) {
        let host = Arc::new(MockHost::new());
        host.add_source("bar", SourceKind::Image, width);
        let adapter = RenderAdapter::new(host.clone());
        adapter.set_sources("bar", "");
        adapter.ensure_filters();
        (host, adapter)
    }

    #[test]
    fn apply_round_trips_through_filters() {
        let (host, adapter) = adapter_with(500);
        adapter.apply(0.3, 80.0);
        let crop = host.filter_settings("bar", FILTER_CROP).unwrap();
        let color = host.filter_settings("bar", FILTER_OPACITY).unwrap();
        assert_eq!(crop.right, Some(350));
        assert_eq!(color.opacity, Some(80.0));
    }

    #[test]
    fn apply_clamps_out_of_range_inputs() {
        let (host, adapter) = adapter_with(500);
        adapter.apply(1.7, 130.0);
        assert_eq!(
            host.filter_settings("bar", FILTER_CROP).unwrap().right,
            Some(0)
        );
        assert_eq!(
            host.filter_settings("bar", FILTER_OPACITY).unwrap().opacity,
            Some(100.0)
        );

        adapter.apply(-0.5, -10.0);
        assert_eq!(
            host.filter_settings("bar", FILTER_CROP).unwrap().right,
            Some(500)
        );
        assert_eq!(
            host.filter_settings("bar", FILTER_OPACITY).unwrap().opacity,
            Some(0.0)
        );
    }

    #[test]
    fn zero_width_is_a_complete_no_op() {
        let host = Arc::new(MockHost::new());
        host.add_source("bar", SourceKind::Image, 0);
        let adapter = RenderAdapter::new(host.clone());
        adapter.set_sources("bar", "");
        host.take_log();
        adapter.apply(0.5, 100.0);
        assert_eq!(host.log_len(), 0);
    }

    #[test]
    fn unloaded_source_width_one_reads_as_zero() {
        let host = Arc::new(MockHost::new());
        host.add_source("bar", SourceKind::Browser, 1);
        let adapter = RenderAdapter::new(host.clone());
        adapter.set_sources("bar", "");
        assert_eq!(adapter.cached_width(), 0);
    }

    #[test]
    fn width_reconstructed_from_cropped_report() {
        // A 500px source already cropped by 200 reports 300; the adapter
        // adds the crop offset back to recover the full width.
        let host = Arc::new(MockHost::new());
        host.add_source("bar", SourceKind::Image, 500);
        host.create_filter("bar", FILTER_CROP, FilterKind::Crop, FilterSettings::right(200));
        let adapter = RenderAdapter::new(host.clone());
        adapter.set_sources("bar", "");
        assert_eq!(adapter.cached_width(), 500);
    }

    #[test]
    fn missing_filter_skips_that_half() {
        let (host, adapter) = adapter_with(500);
        host.remove_filter("bar", FILTER_OPACITY);
        host.take_log();
        adapter.apply(0.5, 40.0);
        let log = host.take_log();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            crate::host::mock::HostCall::UpdateFilter { filter, .. } if filter == FILTER_CROP
        ));
    }

    #[test]
    fn container_filter_created_on_demand_and_never_cropped() {
        let host = Arc::new(MockHost::new());
        host.add_source("bar", SourceKind::Image, 500);
        host.add_source("frame", SourceKind::Image, 600);
        let adapter = RenderAdapter::new(host.clone());
        adapter.set_sources("bar", "frame");
        adapter.ensure_filters();
        adapter.apply(0.5, 60.0);
        let s = host.filter_settings("frame", FILTER_CONTAINER).unwrap();
        assert_eq!(s.opacity, Some(60.0));
        assert_eq!(s.right, None);
    }

    #[test]
    fn ensure_filters_recreates_without_duplicates() {
        let (host, adapter) = adapter_with(500);
        adapter.ensure_filters();
        adapter.ensure_filters();
        assert_eq!(host.filter_names("bar").len(), 2);
    }
}
