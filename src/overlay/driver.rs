//! The animation state machine.
//!
//! Each animation (resize, reset, fade-out, sustain) runs as its own tokio
//! task, but only one may be logically active: the slot holds the running
//! task together with its cancel flag and a generation number. Every
//! transition locks the slot, cancels the previous loop (cooperatively,
//! with a bounded join), and installs its replacement. A loop that reaches
//! its natural end transitions to fade-out by presenting its own
//! generation, so it neither joins itself nor clobbers a successor that
//! already took the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::host::Host;
use crate::overlay::dispatch::CueSources;
use crate::overlay::render::RenderAdapter;
use crate::overlay::state::{lerp, OverlayState};

/// Sampling interval for all animation loops (~60 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// How long a transition waits for the previous loop to exit. A loop stuck
/// past this keeps running detached until its next cancel check; the old
/// tick that may land after the new loop starts is an accepted race.
pub const JOIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Which loop currently drives the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimKind {
    Resize,
    Reset,
    FadeOut,
    Sustain,
}

/// Durations and bounds for the state machine, fixed at construction.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Number of discrete progress notches.
    pub max_levels: u32,
    /// Seconds for a one-level resize animation.
    pub resize_duration: f64,
    /// Seconds for the opacity fade-out.
    pub fade_duration: f64,
    /// Animation loop sampling interval.
    pub tick: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            max_levels: 10,
            resize_duration: 1.0,
            fade_duration: 3.0,
            tick: TICK_INTERVAL,
        }
    }
}

/// Everything `configure` re-reads: source names and cue sources.
#[derive(Debug, Clone, Default)]
pub struct OverlaySettings {
    pub source: String,
    pub container: String,
    pub cues: CueSources,
}

struct RunningAnim {
    gen: u64,
    kind: AnimKind,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct AnimSlot {
    gen_counter: u64,
    active: Option<RunningAnim>,
}

impl AnimSlot {
    fn bump_gen(&mut self) -> u64 {
        self.gen_counter += 1;
        self.gen_counter
    }
}

/// The overlay controller: shared state, the active-animation slot, and
/// the render adapter, tied together under one exclusive-access discipline.
///
/// The state mutex guards `OverlayState` and every render call; it is only
/// ever held across a single tick, never across an await. The slot mutex
/// serializes transitions (cancel, bounded join, spawn).
pub struct OverlayController {
    pub(crate) timing: Timing,
    pub(crate) state: Mutex<OverlayState>,
    pub(crate) cues: Mutex<CueSources>,
    slot: tokio::sync::Mutex<AnimSlot>,
    render: RenderAdapter,
}

impl OverlayController {
    pub fn new(host: Arc<dyn Host>, timing: Timing) -> Arc<Self> {
        Arc::new(Self {
            timing,
            state: Mutex::new(OverlayState::default()),
            cues: Mutex::new(CueSources::default()),
            slot: tokio::sync::Mutex::new(AnimSlot::default()),
            render: RenderAdapter::new(host),
        })
    }

    pub fn render(&self) -> &RenderAdapter {
        &self.render
    }

    pub fn max_levels(&self) -> u32 {
        self.timing.max_levels
    }

    /// Clone of the current logical state.
    pub fn snapshot(&self) -> OverlayState {
        self.state.lock().unwrap().clone()
    }

    /// Kind of the animation currently holding the slot, if any is still
    /// running. Best-effort (used by the simulator's status line).
    pub fn active_kind(&self) -> Option<AnimKind> {
        let slot = self.slot.try_lock().ok()?;
        slot.active
            .as_ref()
            .filter(|a| !a.task.is_finished())
            .map(|a| a.kind)
    }

    /// Re-read source names and cues, reinstall filters, and render the
    /// bar hidden. Not synchronized against in-flight animations.
    pub fn configure(&self, settings: &OverlaySettings) {
        *self.cues.lock().unwrap() = settings.cues.clone();
        self.render.set_sources(&settings.source, &settings.container);
        self.render.ensure_filters();
        self.render.apply(0.0, 0.0);
        info!(
            source = %settings.source,
            width = self.render.cached_width(),
            "overlay configured"
        );
    }

    /// Idempotent teardown: clears visibility flags, cancels any loop with
    /// a bounded join, drops the cached width. Safe to call even if
    /// `configure` never ran.
    pub async fn shutdown(&self) {
        {
            let mut st = self.state.lock().unwrap();
            st.sustained = false;
            st.fading = false;
        }
        let mut slot = self.slot.lock().await;
        Self::cancel_active(&mut slot, None).await;
        self.render.clear();
        debug!("overlay controller shut down");
    }

    /// Clear the sustained flag; the sustain loop notices on its next tick
    /// and hands off to fade-out.
    pub fn release_sustain(&self) {
        self.state.lock().unwrap().sustained = false;
    }

    // ── Transitions ───────────────────────────────────────────────────

    /// Animate `value` linearly from its current reading to `target` over
    /// `duration_secs`, then snap exactly to `target`. Cancels whatever was
    /// running. Hands off to fade-out on completion unless sustained.
    pub async fn animate(self: Arc<Self>, target: u32, duration_secs: f64) {
        let target = target.min(self.timing.max_levels);
        let mut slot = self.slot.lock().await;
        Self::cancel_active(&mut slot, None).await;
        self.state.lock().unwrap().fading = false;

        let gen = slot.bump_gen();
        let cancel = Arc::new(AtomicBool::new(false));
        let me = self.clone();
        let flag = cancel.clone();
        let task =
            tokio::spawn(async move { me.run_resize(gen, flag, target, duration_secs).await });
        slot.active = Some(RunningAnim {
            gen,
            kind: AnimKind::Resize,
            cancel,
            task,
        });
        debug!(target, duration_secs, "resize animation started");
    }

    /// Decay `value` to 0 over a duration proportional to the commanded
    /// level, and zero the target up front. The factor of two slows the
    /// reset to half resize speed per level.
    pub async fn reset_to_zero(self: Arc<Self>) {
        let mut slot = self.slot.lock().await;
        Self::cancel_active(&mut slot, None).await;

        let duration = {
            let mut st = self.state.lock().unwrap();
            st.fading = false;
            let d = self.timing.resize_duration * (st.target as f64 / self.timing.max_levels as f64)
                * 2.0;
            let value = st.value;
            st.set(value, 0, self.timing.max_levels);
            d
        };

        let gen = slot.bump_gen();
        let cancel = Arc::new(AtomicBool::new(false));
        let me = self.clone();
        let flag = cancel.clone();
        let task = tokio::spawn(async move { me.run_resize(gen, flag, 0, duration).await });
        slot.active = Some(RunningAnim {
            gen,
            kind: AnimKind::Reset,
            cancel,
            task,
        });
        debug!(duration, "reset animation started");
    }

    /// Pin the bar visible at full opacity until `release_sustain`.
    pub async fn sustain(self: Arc<Self>) {
        let mut slot = self.slot.lock().await;
        Self::cancel_active(&mut slot, None).await;
        {
            let mut st = self.state.lock().unwrap();
            st.fading = false;
            st.sustained = true;
            self.render
                .apply(st.value / self.timing.max_levels as f64, 100.0);
        }

        let gen = slot.bump_gen();
        let cancel = Arc::new(AtomicBool::new(false));
        let me = self.clone();
        let flag = cancel.clone();
        let task = tokio::spawn(async move { me.run_sustain(gen, flag).await });
        slot.active = Some(RunningAnim {
            gen,
            kind: AnimKind::Sustain,
            cancel,
            task,
        });
        debug!("sustain started");
    }

    /// Decay opacity 100→0 over the fade duration, holding `value` fixed.
    /// No-op while a fade is already running.
    pub async fn fade_out(self: Arc<Self>) {
        self.fade_out_from(None).await;
    }

    /// `own_gen` is the generation of a finishing loop transitioning to
    /// fade-out: it must not join itself, and it must back off if another
    /// transition already took the slot.
    async fn fade_out_from(self: Arc<Self>, own_gen: Option<u64>) {
        let mut slot = self.slot.lock().await;
        if self.state.lock().unwrap().fading {
            return;
        }
        if !Self::cancel_active(&mut slot, own_gen).await {
            return;
        }
        self.state.lock().unwrap().fading = true;

        let gen = slot.bump_gen();
        let cancel = Arc::new(AtomicBool::new(false));
        let me = self.clone();
        let flag = cancel.clone();
        let task = tokio::spawn(async move { me.run_fade(flag).await });
        slot.active = Some(RunningAnim {
            gen,
            kind: AnimKind::FadeOut,
            cancel,
            task,
        });
        debug!("fade-out started");
    }

    /// Cancel and join the slot's occupant. Returns false when `own_gen`
    /// was presented but the slot was revoked or taken by a different loop
    /// — the caller was replaced and must not start anything.
    async fn cancel_active(slot: &mut AnimSlot, own_gen: Option<u64>) -> bool {
        let Some(prev) = slot.active.take() else {
            // An empty slot means shutdown revoked any self-handoff.
            return own_gen.is_none();
        };
        if Some(prev.gen) == own_gen {
            // The finishing loop is handing off to itself; nothing to join.
            return true;
        }
        if own_gen.is_some() {
            slot.active = Some(prev);
            return false;
        }
        prev.cancel.store(true, Ordering::Relaxed);
        if !prev.task.is_finished() && time::timeout(JOIN_TIMEOUT, prev.task).await.is_err() {
            warn!("animation loop did not stop within join timeout");
        }
        true
    }

    /// Wait for the running animation (and anything it chains into) to
    /// finish. Intended for shutdown sequencing and tests.
    pub async fn settle(&self) {
        loop {
            let done = {
                let slot = self.slot.lock().await;
                match &slot.active {
                    None => true,
                    Some(a) => a.task.is_finished(),
                }
            };
            if done {
                return;
            }
            time::sleep(self.timing.tick).await;
        }
    }

    // ── Loop bodies ───────────────────────────────────────────────────

    async fn run_resize(
        self: Arc<Self>,
        gen: u64,
        cancel: Arc<AtomicBool>,
        target: u32,
        duration_secs: f64,
    ) {
        let max = self.timing.max_levels as f64;
        let from = self.state.lock().unwrap().value;
        let begin = time::Instant::now();

        if duration_secs > 0.0 {
            loop {
                time::sleep(self.timing.tick).await;
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let t = begin.elapsed().as_secs_f64() / duration_secs;
                if t >= 1.0 {
                    break;
                }
                let mut st = self.state.lock().unwrap();
                st.value = lerp(from, target as f64, t);
                self.render.apply(st.value / max, 100.0);
            }
        }

        if cancel.load(Ordering::Relaxed) {
            return;
        }
        // Snap exactly to the commanded level.
        let sustained = {
            let mut st = self.state.lock().unwrap();
            st.value = target as f64;
            self.render.apply(st.value / max, 100.0);
            st.sustained
        };
        if !sustained {
            self.fade_out_from(Some(gen)).await;
        }
    }

    async fn run_fade(self: Arc<Self>, cancel: Arc<AtomicBool>) {
        let max = self.timing.max_levels as f64;
        let fade = self.timing.fade_duration;
        let begin = time::Instant::now();

        if fade > 0.0 {
            loop {
                time::sleep(self.timing.tick).await;
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                let t = begin.elapsed().as_secs_f64() / fade;
                let mut st = self.state.lock().unwrap();
                if !st.fading {
                    break;
                }
                if t >= 1.0 {
                    self.render.apply(st.value / max, 0.0);
                    break;
                }
                self.render.apply(st.value / max, 100.0 * (1.0 - t));
            }
        } else {
            let st = self.state.lock().unwrap();
            self.render.apply(st.value / max, 0.0);
        }

        // Cleared on every exit path, natural or cancelled.
        self.state.lock().unwrap().fading = false;
    }

    async fn run_sustain(self: Arc<Self>, gen: u64, cancel: Arc<AtomicBool>) {
        let max = self.timing.max_levels as f64;
        loop {
            time::sleep(self.timing.tick).await;
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            let st = self.state.lock().unwrap();
            if !st.sustained {
                break;
            }
            self.render.apply(st.value / max, 100.0);
        }
        self.fade_out_from(Some(gen)).await;
    }

    #[cfg(test)]
    pub(crate) async fn active_gen(&self) -> Option<u64> {
        self.slot.lock().await.active.as_ref().map(|a| a.gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FilterSettings, Host, MockHost, SourceKind};
    use crate::overlay::render::{FILTER_CROP, FILTER_OPACITY};

    fn fixture() -> (Arc<MockHost>, Arc<OverlayController>) {
        let host = Arc::new(MockHost::new());
        host.add_source("bar", SourceKind::Image, 500);
        let controller = OverlayController::new(
            host.clone(),
            Timing {
                max_levels: 10,
                resize_duration: 0.2,
                fade_duration: 0.3,
                tick: Duration::from_millis(16),
            },
        );
        controller.configure(&OverlaySettings {
            source: "bar".into(),
            ..Default::default()
        });
        host.take_log();
        (host, controller)
    }

    fn crop_right(host: &MockHost) -> i64 {
        host.filter_settings("bar", FILTER_CROP)
            .and_then(|s| s.right)
            .unwrap()
    }

    fn opacity(host: &MockHost) -> f64 {
        host.filter_settings("bar", FILTER_OPACITY)
            .and_then(|s| s.opacity)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn animate_snaps_exactly_to_target() {
        let (host, ctrl) = fixture();
        ctrl.clone().animate(3, 0.2).await;
        ctrl.settle().await;
        assert_eq!(ctrl.snapshot().value, 3.0);
        // 0.3 of a 500px bar visible
        assert_eq!(crop_right(&host), 350);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_collapses_to_single_application() {
        let (host, ctrl) = fixture();
        ctrl.clone().animate(5, 0.0).await;
        ctrl.settle().await;
        assert_eq!(ctrl.snapshot().value, 5.0);
        assert_eq!(crop_right(&host), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_animation_fades_out_when_not_sustained() {
        let (host, ctrl) = fixture();
        ctrl.clone().animate(4, 0.1).await;
        ctrl.settle().await;
        let st = ctrl.snapshot();
        assert_eq!(st.value, 4.0);
        assert!(!st.fading);
        assert_eq!(opacity(&host), 0.0);
        // Fade touches opacity only; crop holds the 4/10 position.
        assert_eq!(crop_right(&host), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn fade_out_while_fading_is_a_no_op() {
        let (_host, ctrl) = fixture();
        ctrl.clone().fade_out().await;
        assert!(ctrl.snapshot().fading);
        let gen = ctrl.active_gen().await;
        ctrl.clone().fade_out().await;
        assert_eq!(ctrl.active_gen().await, gen);
        ctrl.settle().await;
        assert!(!ctrl.snapshot().fading);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_mid_animation_decays_partial_value_to_zero() {
        let (host, ctrl) = fixture();
        ctrl.state.lock().unwrap().target = 8;
        ctrl.clone().animate(8, 10.0).await;
        time::sleep(Duration::from_millis(200)).await;
        let partial = ctrl.snapshot().value;
        assert!(partial > 0.0 && partial < 8.0);

        ctrl.clone().reset_to_zero().await;
        ctrl.settle().await;
        let st = ctrl.snapshot();
        assert_eq!(st.value, 0.0);
        assert_eq!(st.target, 0);
        assert_eq!(crop_right(&host), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn no_zombie_loop_keeps_applying_after_settle() {
        let (host, ctrl) = fixture();
        ctrl.clone().animate(6, 0.1).await;
        ctrl.clone().reset_to_zero().await;
        ctrl.settle().await;
        host.take_log();
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(host.log_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sustain_pins_opacity_until_released() {
        let (host, ctrl) = fixture();
        ctrl.clone().animate(5, 0.0).await;
        ctrl.settle().await;
        ctrl.clone().sustain().await;

        // Well past the fade duration, still fully opaque.
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(opacity(&host), 100.0);
        assert!(ctrl.snapshot().sustained);

        ctrl.release_sustain();
        ctrl.settle().await;
        assert_eq!(opacity(&host), 0.0);
        assert_eq!(crop_right(&host), 250);
        assert!(!ctrl.snapshot().fading);
    }

    #[tokio::test(start_paused = true)]
    async fn sustain_clears_fading_flag() {
        let (_host, ctrl) = fixture();
        ctrl.clone().fade_out().await;
        assert!(ctrl.snapshot().fading);
        ctrl.clone().sustain().await;
        let st = ctrl.snapshot();
        assert!(st.sustained);
        assert!(!st.fading);
        ctrl.release_sustain();
        ctrl.settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn crop_updates_within_one_animation_are_ordered() {
        let (host, ctrl) = fixture();
        ctrl.clone().animate(10, 0.2).await;
        ctrl.settle().await;
        let crops: Vec<i64> = host
            .take_log()
            .into_iter()
            .filter_map(|c| match c {
                crate::host::mock::HostCall::UpdateFilter {
                    filter,
                    settings: FilterSettings { right: Some(r), .. },
                    ..
                } if filter == FILTER_CROP => Some(r),
                _ => None,
            })
            .collect();
        assert!(!crops.is_empty());
        // Bar grows monotonically, so crop-right only ever shrinks.
        assert!(crops.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*crops.last().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent_and_safe_without_configure() {
        let host = Arc::new(MockHost::new());
        let ctrl = OverlayController::new(host, Timing::default());
        ctrl.shutdown().await;
        ctrl.shutdown().await;
        assert_eq!(ctrl.snapshot(), crate::overlay::OverlayState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_inflight_animation() {
        let (_host, ctrl) = fixture();
        ctrl.clone().animate(8, 10.0).await;
        ctrl.shutdown().await;
        ctrl.settle().await;
        let st = ctrl.snapshot();
        assert!(!st.sustained);
        assert!(!st.fading);
        assert!(st.value < 8.0);
    }
}
